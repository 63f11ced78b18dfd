// ERC-4626 liquidity buffers: the Vault wraps/unwraps at the wrapper's preview rate.
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::codec::u256_dec;
use crate::error::PoolError;
use crate::math;

/// The Vault refuses to wrap or unwrap less than this many raw units.
pub const MINIMUM_WRAP_AMOUNT: U256 = U256([10_000, 0, 0, 0]);

/// Totals of the ERC-4626 wrapper behind one pool token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc4626Buffer {
    #[serde(with = "u256_dec")]
    pub total_assets: U256,
    #[serde(with = "u256_dec")]
    pub total_supply: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    Down,
    Up,
}

impl Erc4626Buffer {
    pub fn new(total_assets: U256, total_supply: U256) -> Self {
        Self {
            total_assets,
            total_supply,
        }
    }

    // OpenZeppelin ERC4626 with a zero decimals offset: one virtual share and one virtual asset.
    fn convert_to_shares(&self, assets: U256, rounding: Rounding) -> Result<U256, PoolError> {
        let supply = math::checked_add(self.total_supply, U256::one())?;
        let total = math::checked_add(self.total_assets, U256::one())?;
        Ok(match rounding {
            Rounding::Down => math::mul_div_down(assets, supply, total)?,
            Rounding::Up => math::mul_div_up(assets, supply, total)?,
        })
    }

    fn convert_to_assets(&self, shares: U256, rounding: Rounding) -> Result<U256, PoolError> {
        let supply = math::checked_add(self.total_supply, U256::one())?;
        let total = math::checked_add(self.total_assets, U256::one())?;
        Ok(match rounding {
            Rounding::Down => math::mul_div_down(shares, total, supply)?,
            Rounding::Up => math::mul_div_up(shares, total, supply)?,
        })
    }

    fn ensure_wrap_amount(amount: U256) -> Result<(), PoolError> {
        if amount < MINIMUM_WRAP_AMOUNT {
            return Err(PoolError::InvalidAmount(format!(
                "buffer operation of {} is below the minimum of {}",
                amount, MINIMUM_WRAP_AMOUNT
            )));
        }
        Ok(())
    }

    /// `previewDeposit`: shares received for exactly `assets`.
    pub fn wrap_exact_in(&self, assets: U256) -> Result<U256, PoolError> {
        Self::ensure_wrap_amount(assets)?;
        self.convert_to_shares(assets, Rounding::Down)
    }

    /// `previewRedeem`: assets received for exactly `shares`.
    pub fn unwrap_exact_in(&self, shares: U256) -> Result<U256, PoolError> {
        Self::ensure_wrap_amount(shares)?;
        self.convert_to_assets(shares, Rounding::Down)
    }

    /// `previewMint`: assets needed to receive exactly `shares`.
    pub fn wrap_exact_out(&self, shares: U256) -> Result<U256, PoolError> {
        Self::ensure_wrap_amount(shares)?;
        self.convert_to_assets(shares, Rounding::Up)
    }

    /// `previewWithdraw`: shares burned to receive exactly `assets`.
    pub fn unwrap_exact_out(&self, assets: U256) -> Result<U256, PoolError> {
        Self::ensure_wrap_amount(assets)?;
        self.convert_to_shares(assets, Rounding::Up)
    }

    /// Records a wrap of `assets` into `shares`.
    pub fn deposit(&mut self, assets: U256, shares: U256) {
        self.total_assets = self.total_assets.saturating_add(assets);
        self.total_supply = self.total_supply.saturating_add(shares);
    }

    /// Records an unwrap of `shares` into `assets`.
    pub fn withdraw(&mut self, assets: U256, shares: U256) {
        self.total_assets = self.total_assets.saturating_sub(assets);
        self.total_supply = self.total_supply.saturating_sub(shares);
    }
}
