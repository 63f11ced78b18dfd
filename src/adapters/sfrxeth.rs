// Frax frxETHMinter.submitAndDeposit: WETH/ETH in, sfrxETH out. One-directional.
use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{self, is_false, PoolExtraCodec};
use crate::contracts::{erc4626, frax};
use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::math;
use crate::multicall::{Call, Multicall};
use crate::registry::{simulator_factory, tracker_factory, Registry, RegistryError, TrackerContext};
use crate::simulator::{
    pair_inputs, pair_outputs, PoolInfo, PoolSimulator, SwapKind, SwapRequest, SwapResult,
    TokenAmount,
};
use crate::tracker::{instrumented, PoolTracker, TrackParams};
use crate::transport::StateOverrides;

pub const POOL_TYPE: &str = "frax-sfrxeth";

const SUBMIT_AND_DEPOSIT_GAS: u64 = 85_000;

/// `total_assets` and `total_supply` of sfrxETH travel as the entity reserves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfrxethExtra {
    #[serde(default, skip_serializing_if = "is_false")]
    pub submit_paused: bool,
}

impl PoolExtraCodec for SfrxethExtra {
    const TYPE_TAG: &'static str = POOL_TYPE;
    const VERSION: u32 = 1;
}

/// The pool address is the minter and token 1 is sfrxETH, so the tracker needs no settings.
pub struct SfrxethTracker {
    multicall: Multicall,
}

impl SfrxethTracker {
    pub fn new(multicall: Multicall) -> Self {
        Self { multicall }
    }

    pub fn from_context(context: &TrackerContext) -> Result<Self, PoolError> {
        Ok(Self::new(context.multicall.clone()))
    }

    async fn fetch(
        &self,
        pool: &PoolEntity,
        params: &TrackParams,
        overrides: Option<StateOverrides>,
    ) -> Result<PoolEntity, PoolError> {
        let minter = pool.parsed_address()?;
        let sfrxeth = pool
            .tokens
            .get(1)
            .ok_or_else(|| PoolError::InvalidPool(format!("{}: missing sfrxETH token", pool.address)))?
            .parsed_address()?;

        let mut request = self.multicall.new_request();
        request
            .add_call(Call::new(minter, &frax::SUBMIT_PAUSED, &[])?)
            .add_call(Call::new(sfrxeth, &erc4626::TOTAL_ASSETS, &[])?)
            .add_call(Call::new(sfrxeth, &erc4626::TOTAL_SUPPLY, &[])?)
            .set_context(params.block, overrides);
        let response = request.aggregate().await?;

        let extra = SfrxethExtra {
            submit_paused: response.output(0)?.bool(0)?,
        };
        let total_assets = response.output(1)?.uint(0)?;
        let total_supply = response.output(2)?.uint(0)?;
        pool.with_snapshot(
            vec![total_assets, total_supply],
            codec::encode(&extra)?,
            response.block_number,
        )
    }
}

#[async_trait]
impl PoolTracker for SfrxethTracker {
    fn pool_type(&self) -> &'static str {
        POOL_TYPE
    }

    async fn get_new_pool_state(
        &self,
        pool: &PoolEntity,
        params: TrackParams,
    ) -> Result<PoolEntity, PoolError> {
        let cancel = params.cancel.clone();
        instrumented(POOL_TYPE, pool, cancel, self.fetch(pool, &params, None)).await
    }

    async fn get_new_pool_state_with_overrides(
        &self,
        pool: &PoolEntity,
        params: TrackParams,
        overrides: StateOverrides,
    ) -> Result<PoolEntity, PoolError> {
        let cancel = params.cancel.clone();
        instrumented(POOL_TYPE, pool, cancel, self.fetch(pool, &params, Some(overrides))).await
    }
}

#[derive(Debug, Clone)]
pub struct SfrxethSimulator {
    info: PoolInfo,
    extra: SfrxethExtra,
}

impl SfrxethSimulator {
    pub fn new(entity: &PoolEntity) -> Result<Self, PoolError> {
        Ok(Self {
            info: PoolInfo::from_entity(entity, Some(2))?,
            extra: codec::decode(&entity.extra)?,
        })
    }

    fn total_assets(&self) -> U256 {
        self.info.reserves[0]
    }

    fn total_supply(&self) -> U256 {
        self.info.reserves[1]
    }

    /// sfrxETH `previewDeposit` (solmate ERC4626, no virtual shares).
    pub fn preview_deposit(&self, assets: U256) -> Result<U256, PoolError> {
        let supply = self.total_supply();
        if supply.is_zero() {
            return Ok(assets);
        }
        Ok(math::mul_div_down(assets, supply, self.total_assets())?)
    }
}

impl PoolSimulator for SfrxethSimulator {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        if self.extra.submit_paused {
            return Err(PoolError::PoolPaused);
        }
        request.ensure_kind(SwapKind::ExactInput)?;
        let (token_in, token_out) = self.info.resolve_pair(request)?;
        if token_in != 0 {
            return Err(PoolError::InvalidToken(format!(
                "{:?} cannot be redeemed through the minter",
                self.info.tokens[token_in]
            )));
        }
        let shares = self.preview_deposit(request.amount_u256()?)?;

        Ok(SwapResult {
            amount: TokenAmount {
                token: self.info.tokens[token_out],
                amount: shares,
            },
            fee: TokenAmount {
                token: self.info.tokens[token_in],
                amount: U256::zero(),
            },
            gas: SUBMIT_AND_DEPOSIT_GAS,
        })
    }

    /// A deposit grows the vault on both sides.
    fn update_balance(&mut self, request: &SwapRequest, result: &SwapResult) {
        let Ok(assets) = request.amount_u256() else {
            return;
        };
        let reserves = &mut self.info.reserves;
        reserves[0] = reserves[0].saturating_add(assets);
        reserves[1] = reserves[1].saturating_add(result.amount.amount);
    }

    fn can_swap_from(&self, token: Address) -> Vec<Address> {
        pair_outputs(&self.info, token, false)
    }

    fn can_swap_to(&self, token: Address) -> Vec<Address> {
        pair_inputs(&self.info, token, false)
    }
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        POOL_TYPE,
        tracker_factory(SfrxethTracker::from_context),
        simulator_factory(SfrxethSimulator::new),
    )
}
