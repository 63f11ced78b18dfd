// Usual USD0++ bond: USD0 mints USD0++ 1:1 while the bond window is open.
use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{self, is_false, u256_dec, PoolExtraCodec};
use crate::contracts::usd0pp;
use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::multicall::{Call, Multicall};
use crate::registry::{simulator_factory, tracker_factory, Registry, RegistryError, TrackerContext};
use crate::simulator::{
    pair_inputs, pair_outputs, PoolInfo, PoolSimulator, SwapKind, SwapRequest, SwapResult,
    TokenAmount,
};
use crate::tracker::{instrumented, PoolTracker, TrackParams};
use crate::transport::StateOverrides;

pub const POOL_TYPE: &str = "usd0pp";

const DEFAULT_RESERVE: U256 = U256([0x1bce_cced_a100_0000, 0xd3c2, 0, 0]); // 1e24
const MINT_GAS: u64 = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usd0ppExtra {
    #[serde(default, skip_serializing_if = "is_false")]
    pub paused: bool,
    #[serde(with = "u256_dec")]
    pub start_time: U256,
    #[serde(with = "u256_dec")]
    pub end_time: U256,
}

impl PoolExtraCodec for Usd0ppExtra {
    const TYPE_TAG: &'static str = POOL_TYPE;
    const VERSION: u32 = 1;
}

pub struct Usd0ppTracker {
    multicall: Multicall,
}

impl Usd0ppTracker {
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
        let bond = pool.parsed_address()?;
        let mut request = self.multicall.new_request();
        request
            .add_call(Call::new(bond, &usd0pp::PAUSED, &[])?)
            .add_call(Call::new(bond, &usd0pp::GET_START_TIME, &[])?)
            .add_call(Call::new(bond, &usd0pp::GET_END_TIME, &[])?)
            .set_context(params.block, overrides);
        let response = request.aggregate().await?;

        let extra = Usd0ppExtra {
            paused: response.output(0)?.bool(0)?,
            start_time: response.output(1)?.uint(0)?,
            end_time: response.output(2)?.uint(0)?,
        };
        pool.with_snapshot(
            vec![DEFAULT_RESERVE; pool.tokens.len()],
            codec::encode(&extra)?,
            response.block_number,
        )
    }
}

#[async_trait]
impl PoolTracker for Usd0ppTracker {
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

/// Token 0 is USD0, token 1 is USD0++.
#[derive(Debug, Clone)]
pub struct Usd0ppSimulator {
    info: PoolInfo,
    extra: Usd0ppExtra,
    // fixed evaluation time; wall clock when unset
    now: Option<u64>,
}

impl Usd0ppSimulator {
    pub fn new(entity: &PoolEntity) -> Result<Self, PoolError> {
        Ok(Self {
            info: PoolInfo::from_entity(entity, Some(2))?,
            extra: codec::decode(&entity.extra)?,
            now: None,
        })
    }

    /// Evaluates the bond window at `unix_seconds` instead of the current time.
    pub fn at_time(mut self, unix_seconds: u64) -> Self {
        self.now = Some(unix_seconds);
        self
    }

    fn now(&self) -> U256 {
        let now = self
            .now
            .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);
        U256::from(now)
    }
}

impl PoolSimulator for Usd0ppSimulator {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        if self.extra.paused {
            return Err(PoolError::PoolPaused);
        }
        let now = self.now();
        if now < self.extra.start_time {
            return Err(PoolError::BondNotStarted);
        }
        if now >= self.extra.end_time {
            return Err(PoolError::BondEnded);
        }
        request.ensure_kind(SwapKind::ExactInput)?;
        let (token_in, token_out) = self.info.resolve_pair(request)?;
        if token_in != 0 {
            return Err(PoolError::InvalidToken(format!(
                "{:?} cannot be unwrapped before maturity",
                self.info.tokens[token_in]
            )));
        }
        let amount = request.amount_u256()?;
        if amount.is_zero() {
            return Err(PoolError::InvalidAmount("zero USD0 amount".to_string()));
        }

        Ok(SwapResult {
            amount: TokenAmount {
                token: self.info.tokens[token_out],
                amount,
            },
            fee: TokenAmount {
                token: self.info.tokens[token_in],
                amount: U256::zero(),
            },
            gas: MINT_GAS,
        })
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
        tracker_factory(Usd0ppTracker::from_context),
        simulator_factory(Usd0ppSimulator::new),
    )
}
