use ethers::types::{Address, U256};
use log::warn;

use super::buffer::Erc4626Buffer;
use super::types::{BalancerV3Extra, BalancerV3StaticExtra};
use super::{static_extra, weighted_math};
use crate::codec;
use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::math::{self, fixed_point};
use crate::simulator::{
    all_others, PoolInfo, PoolSimulator, SwapKind, SwapRequest, SwapResult, TokenAmount,
};

/// The Vault rejects swaps whose scaled given or calculated amount is nonzero but below this.
const MINIMUM_TRADE_AMOUNT: U256 = U256([1_000_000, 0, 0, 0]);

const SWAP_GAS: u64 = 80_000;
const BUFFER_GAS: u64 = 50_000;

/// Raw amounts of the pool-level swap, in registered (possibly wrapped) tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolSwap {
    amount_in_raw: U256,
    amount_out_raw: U256,
    total_swap_fee_raw: U256,
    aggregate_swap_fee_raw: U256,
}

/// `(assets, shares)` moved through a buffer.
type BufferLeg = (U256, U256);

#[derive(Debug, Clone, Copy)]
struct Quote {
    index_in: usize,
    index_out: usize,
    amount_in: U256,
    amount_out: U256,
    pool: PoolSwap,
    wrap: Option<BufferLeg>,
    unwrap: Option<BufferLeg>,
}

impl Quote {
    fn gas(&self) -> u64 {
        let buffers = self.wrap.is_some() as u64 + self.unwrap.is_some() as u64;
        SWAP_GAS + BUFFER_GAS * buffers
    }
}

#[derive(Debug, Clone)]
pub struct BalancerV3Simulator {
    info: PoolInfo,
    extra: BalancerV3Extra,
    statics: BalancerV3StaticExtra,
}

impl BalancerV3Simulator {
    pub fn new(entity: &PoolEntity) -> Result<Self, PoolError> {
        let info = PoolInfo::from_entity(entity, None)?;
        let mut extra: BalancerV3Extra = codec::decode(&entity.extra)?;
        let statics = static_extra(entity)?;
        let n = info.tokens.len();

        for (name, len) in [
            ("normalized_weights", extra.normalized_weights.len()),
            ("balances_live_scaled18", extra.balances_live_scaled18.len()),
            ("decimal_scaling_factors", extra.decimal_scaling_factors.len()),
            ("token_rates", extra.token_rates.len()),
        ] {
            if len != n {
                return Err(PoolError::InvalidPool(format!(
                    "{}: {} has {} entries for {} tokens",
                    entity.address, name, len, n
                )));
            }
        }
        if extra.buffers.is_empty() {
            extra.buffers = vec![None; n];
        }
        if extra.buffers.len() != n || statics.buffer_tokens.len() > n {
            return Err(PoolError::InvalidPool(format!(
                "{}: buffer layout does not match {} tokens",
                entity.address, n
            )));
        }
        for i in 0..n {
            if statics.buffer_token(i).is_some() && extra.buffers[i].is_none() {
                return Err(PoolError::InvalidPool(format!(
                    "{}: token #{} is buffered but has no buffer state",
                    entity.address, i
                )));
            }
        }

        Ok(Self {
            info,
            extra,
            statics,
        })
    }

    fn buffer(&self, index: usize) -> Option<&Erc4626Buffer> {
        self.statics
            .buffer_token(index)
            .and_then(|_| self.extra.buffers[index].as_ref())
    }

    /// The token the pool itself trades at `index`.
    fn pool_token(&self, index: usize) -> Address {
        self.statics
            .buffer_token(index)
            .unwrap_or(self.info.tokens[index])
    }

    fn ensure_swappable(&self) -> Result<(), PoolError> {
        if self.extra.is_vault_paused || self.extra.is_pool_paused {
            return Err(PoolError::PoolPaused);
        }
        if self.extra.hooks_config.affects_swaps() {
            return Err(PoolError::HookNotSupported(
                self.statics
                    .hook_type
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(())
    }

    fn ensure_valid_trade_amount(amount_scaled18: U256) -> Result<(), PoolError> {
        if !amount_scaled18.is_zero() && amount_scaled18 < MINIMUM_TRADE_AMOUNT {
            return Err(PoolError::InvalidAmount(format!(
                "scaled amount {} is below the minimum trade amount",
                amount_scaled18
            )));
        }
        Ok(())
    }

    fn scaling(&self, index: usize) -> (U256, U256) {
        (
            self.extra.decimal_scaling_factors[index],
            self.extra.token_rates[index],
        )
    }

    /// Converts the scaled swap fee to raw input units and splits off the protocol's share.
    fn charge_fees(&self, total_fee_scaled18: U256, index_in: usize) -> Result<(U256, U256), PoolError> {
        if total_fee_scaled18.is_zero() {
            return Ok((U256::zero(), U256::zero()));
        }
        let (factor, rate) = self.scaling(index_in);
        let total = fixed_point::to_raw_undo_rate_round_down(total_fee_scaled18, factor, rate)?;
        let aggregate = if self.extra.is_pool_in_recovery_mode {
            U256::zero()
        } else {
            fixed_point::mul_down(total, self.extra.aggregate_swap_fee_percentage)?
        };
        Ok((total, aggregate))
    }

    fn pool_swap_exact_in(
        &self,
        index_in: usize,
        index_out: usize,
        amount_in_raw: U256,
    ) -> Result<PoolSwap, PoolError> {
        let extra = &self.extra;
        let (factor_in, rate_in) = self.scaling(index_in);
        let (factor_out, rate_out) = self.scaling(index_out);

        let mut amount_given =
            fixed_point::to_scaled18_apply_rate_round_down(amount_in_raw, factor_in, rate_in)?;
        Self::ensure_valid_trade_amount(amount_given)?;

        let total_fee =
            fixed_point::mul_up(amount_given, extra.static_swap_fee_percentage)?;
        amount_given = math::checked_sub(amount_given, total_fee)?;

        let amount_out = weighted_math::compute_out_given_exact_in(
            extra.balances_live_scaled18[index_in],
            extra.normalized_weights[index_in],
            extra.balances_live_scaled18[index_out],
            extra.normalized_weights[index_out],
            amount_given,
        )?;
        Self::ensure_valid_trade_amount(amount_out)?;

        // the rate is rounded up so the raw output rounds down
        let amount_out_raw = fixed_point::to_raw_undo_rate_round_down(
            amount_out,
            factor_out,
            fixed_point::compute_rate_round_up(rate_out)?,
        )?;
        let (total_swap_fee_raw, aggregate_swap_fee_raw) = self.charge_fees(total_fee, index_in)?;

        Ok(PoolSwap {
            amount_in_raw,
            amount_out_raw,
            total_swap_fee_raw,
            aggregate_swap_fee_raw,
        })
    }

    fn pool_swap_exact_out(
        &self,
        index_in: usize,
        index_out: usize,
        amount_out_raw: U256,
    ) -> Result<PoolSwap, PoolError> {
        let extra = &self.extra;
        let (factor_in, rate_in) = self.scaling(index_in);
        let (factor_out, rate_out) = self.scaling(index_out);

        let amount_given = fixed_point::to_scaled18_apply_rate_round_up(
            amount_out_raw,
            factor_out,
            fixed_point::compute_rate_round_up(rate_out)?,
        )?;
        Self::ensure_valid_trade_amount(amount_given)?;

        let amount_in = weighted_math::compute_in_given_exact_out(
            extra.balances_live_scaled18[index_in],
            extra.normalized_weights[index_in],
            extra.balances_live_scaled18[index_out],
            extra.normalized_weights[index_out],
            amount_given,
        )?;
        Self::ensure_valid_trade_amount(amount_in)?;

        // the fee is charged on top so that the net input matches the invariant
        let fee_percentage = extra.static_swap_fee_percentage;
        let total_fee = fixed_point::mul_div_up(
            amount_in,
            fee_percentage,
            fixed_point::complement(fee_percentage),
        )?;
        let amount_in = math::checked_add(amount_in, total_fee)?;

        let amount_in_raw = fixed_point::to_raw_undo_rate_round_up(amount_in, factor_in, rate_in)?;
        let (total_swap_fee_raw, aggregate_swap_fee_raw) = self.charge_fees(total_fee, index_in)?;

        Ok(PoolSwap {
            amount_in_raw,
            amount_out_raw,
            total_swap_fee_raw,
            aggregate_swap_fee_raw,
        })
    }

    fn quote(&self, request: &SwapRequest) -> Result<Quote, PoolError> {
        self.ensure_swappable()?;
        let (index_in, index_out) = self.info.resolve_pair(request)?;
        let amount = request.amount_u256()?;
        if amount.is_zero() {
            return Err(PoolError::InvalidAmount("zero swap amount".to_string()));
        }

        match request.kind {
            SwapKind::ExactInput => {
                let wrap = match self.buffer(index_in) {
                    Some(buffer) => Some((amount, buffer.wrap_exact_in(amount)?)),
                    None => None,
                };
                let pool_in = wrap.map_or(amount, |(_, shares)| shares);
                let pool = self.pool_swap_exact_in(index_in, index_out, pool_in)?;
                let unwrap = match self.buffer(index_out) {
                    Some(buffer) => Some((
                        buffer.unwrap_exact_in(pool.amount_out_raw)?,
                        pool.amount_out_raw,
                    )),
                    None => None,
                };
                Ok(Quote {
                    index_in,
                    index_out,
                    amount_in: amount,
                    amount_out: unwrap.map_or(pool.amount_out_raw, |(assets, _)| assets),
                    pool,
                    wrap,
                    unwrap,
                })
            }
            SwapKind::ExactOutput => {
                let unwrap = match self.buffer(index_out) {
                    Some(buffer) => Some((amount, buffer.unwrap_exact_out(amount)?)),
                    None => None,
                };
                let pool_out = unwrap.map_or(amount, |(_, shares)| shares);
                let pool = self.pool_swap_exact_out(index_in, index_out, pool_out)?;
                let wrap = match self.buffer(index_in) {
                    Some(buffer) => Some((
                        buffer.wrap_exact_out(pool.amount_in_raw)?,
                        pool.amount_in_raw,
                    )),
                    None => None,
                };
                Ok(Quote {
                    index_in,
                    index_out,
                    amount_in: wrap.map_or(pool.amount_in_raw, |(assets, _)| assets),
                    amount_out: amount,
                    pool,
                    wrap,
                    unwrap,
                })
            }
        }
    }

    fn result(&self, quote: &Quote, kind: SwapKind) -> SwapResult {
        let amount = match kind {
            SwapKind::ExactInput => TokenAmount {
                token: self.info.tokens[quote.index_out],
                amount: quote.amount_out,
            },
            SwapKind::ExactOutput => TokenAmount {
                token: self.info.tokens[quote.index_in],
                amount: quote.amount_in,
            },
        };
        SwapResult {
            amount,
            // charged by the pool, so denominated in the token the pool receives
            fee: TokenAmount {
                token: self.pool_token(quote.index_in),
                amount: quote.pool.total_swap_fee_raw,
            },
            gas: quote.gas(),
        }
    }

    fn refresh_live_balance(&mut self, index: usize) -> Result<(), PoolError> {
        let (factor, rate) = self.scaling(index);
        self.extra.balances_live_scaled18[index] =
            fixed_point::to_scaled18_apply_rate_round_down(self.info.reserves[index], factor, rate)?;
        Ok(())
    }
}

impl PoolSimulator for BalancerV3Simulator {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        request.ensure_kind(SwapKind::ExactInput)?;
        let quote = self.quote(request)?;
        Ok(self.result(&quote, SwapKind::ExactInput))
    }

    fn calc_amount_in(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        request.ensure_kind(SwapKind::ExactOutput)?;
        let quote = self.quote(request)?;
        Ok(self.result(&quote, SwapKind::ExactOutput))
    }

    /// Applies the Vault's accounting: the pool keeps the input minus the protocol's share of
    /// the fee and pays out the output; live balances are rescaled from the new raw balances.
    fn update_balance(&mut self, request: &SwapRequest, _result: &SwapResult) {
        let quote = match self.quote(request) {
            Ok(quote) => quote,
            Err(e) => {
                warn!("{:?}: balance update skipped, swap no longer valid: {}", self.info.address, e);
                return;
            }
        };
        let (index_in, index_out) = (quote.index_in, quote.index_out);
        let pool = quote.pool;

        let reserves = &mut self.info.reserves;
        reserves[index_in] = reserves[index_in]
            .saturating_add(pool.amount_in_raw)
            .saturating_sub(pool.aggregate_swap_fee_raw);
        reserves[index_out] = reserves[index_out].saturating_sub(pool.amount_out_raw);

        for index in [index_in, index_out] {
            if let Err(e) = self.refresh_live_balance(index) {
                warn!("{:?}: live balance #{} not rescaled: {}", self.info.address, index, e);
            }
        }

        if let (Some((assets, shares)), Some(buffer)) = (quote.wrap, self.extra.buffers[index_in].as_mut()) {
            buffer.deposit(assets, shares);
        }
        if let (Some((assets, shares)), Some(buffer)) = (quote.unwrap, self.extra.buffers[index_out].as_mut()) {
            buffer.withdraw(assets, shares);
        }
    }

    fn can_swap_from(&self, token: Address) -> Vec<Address> {
        all_others(&self.info, token)
    }

    fn can_swap_to(&self, token: Address) -> Vec<Address> {
        all_others(&self.info, token)
    }
}
