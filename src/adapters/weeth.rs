// ether.fi weETH: eETH <-> weETH at the liquidity pool's share price.
use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{self, u256_dec, PoolExtraCodec};
use crate::contracts::etherfi;
use crate::entity::{parse_address, PoolEntity};
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

pub const POOL_TYPE: &str = "etherfi-weeth";

/// Wrapping does not consume liquidity; reserves only need to be large enough for routing.
const DEFAULT_RESERVE: U256 = U256([0x38c1_5b0a_0000_0000, 0x314d_c644_8d93, 0, 0]); // 1e33

const WRAP_GAS: u64 = 60_000;
const UNWRAP_GAS: u64 = 45_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeethExtra {
    #[serde(with = "u256_dec")]
    pub total_pooled_ether: U256,
    #[serde(with = "u256_dec")]
    pub total_shares: U256,
}

impl PoolExtraCodec for WeethExtra {
    const TYPE_TAG: &'static str = POOL_TYPE;
    const VERSION: u32 = 1;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeethConfig {
    pub liquidity_pool: String,
    pub eeth: String,
}

impl Default for WeethConfig {
    fn default() -> Self {
        Self {
            liquidity_pool: etherfi::LIQUIDITY_POOL.to_string(),
            eeth: etherfi::EETH.to_string(),
        }
    }
}

pub struct WeethTracker {
    multicall: Multicall,
    liquidity_pool: Address,
    eeth: Address,
}

impl WeethTracker {
    pub fn new(multicall: Multicall, config: WeethConfig) -> Result<Self, PoolError> {
        Ok(Self {
            multicall,
            liquidity_pool: parse_address(&config.liquidity_pool)?,
            eeth: parse_address(&config.eeth)?,
        })
    }

    pub fn from_context(context: &TrackerContext) -> Result<Self, PoolError> {
        Self::new(context.multicall.clone(), context.config()?)
    }

    async fn fetch(
        &self,
        pool: &PoolEntity,
        params: &TrackParams,
        overrides: Option<StateOverrides>,
    ) -> Result<PoolEntity, PoolError> {
        // the share price is only meaningful when both totals come from the same block
        let mut request = self.multicall.new_request();
        request
            .add_call(Call::new(
                self.liquidity_pool,
                &etherfi::GET_TOTAL_POOLED_ETHER,
                &[],
            )?)
            .add_call(Call::new(self.eeth, &etherfi::TOTAL_SHARES, &[])?)
            .set_context(params.block, overrides);
        let response = request.aggregate().await?;

        let extra = WeethExtra {
            total_pooled_ether: response.output(0)?.uint(0)?,
            total_shares: response.output(1)?.uint(0)?,
        };
        pool.with_snapshot(
            vec![DEFAULT_RESERVE; pool.tokens.len()],
            codec::encode(&extra)?,
            response.block_number,
        )
    }
}

#[async_trait]
impl PoolTracker for WeethTracker {
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

/// Token 0 is eETH, token 1 is weETH.
#[derive(Debug, Clone)]
pub struct WeethSimulator {
    info: PoolInfo,
    extra: WeethExtra,
}

impl WeethSimulator {
    pub fn new(entity: &PoolEntity) -> Result<Self, PoolError> {
        Ok(Self {
            info: PoolInfo::from_entity(entity, Some(2))?,
            extra: codec::decode(&entity.extra)?,
        })
    }

    /// `LiquidityPool.sharesForAmount`
    pub fn shares_for_amount(&self, amount: U256) -> Result<U256, PoolError> {
        if self.extra.total_pooled_ether.is_zero() {
            return Ok(U256::zero());
        }
        Ok(math::mul_div_down(
            amount,
            self.extra.total_shares,
            self.extra.total_pooled_ether,
        )?)
    }

    /// `LiquidityPool.amountForShare`
    pub fn amount_for_share(&self, shares: U256) -> Result<U256, PoolError> {
        if self.extra.total_shares.is_zero() {
            return Ok(U256::zero());
        }
        Ok(math::mul_div_down(
            shares,
            self.extra.total_pooled_ether,
            self.extra.total_shares,
        )?)
    }
}

impl PoolSimulator for WeethSimulator {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        request.ensure_kind(SwapKind::ExactInput)?;
        let (token_in, token_out) = self.info.resolve_pair(request)?;
        let amount_in = request.amount_u256()?;

        let (amount_out, gas) = if token_in == 0 {
            (self.shares_for_amount(amount_in)?, WRAP_GAS)
        } else {
            (self.amount_for_share(amount_in)?, UNWRAP_GAS)
        };

        Ok(SwapResult {
            amount: TokenAmount {
                token: self.info.tokens[token_out],
                amount: amount_out,
            },
            fee: TokenAmount {
                token: self.info.tokens[token_in],
                amount: U256::zero(),
            },
            gas,
        })
    }

    fn can_swap_from(&self, token: Address) -> Vec<Address> {
        pair_outputs(&self.info, token, true)
    }

    fn can_swap_to(&self, token: Address) -> Vec<Address> {
        pair_inputs(&self.info, token, true)
    }
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        POOL_TYPE,
        tracker_factory(WeethTracker::from_context),
        simulator_factory(WeethSimulator::new),
    )
}
