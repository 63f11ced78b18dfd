// Generic rate-based pools: token1 converts into token0 at `rate / rate_unit`, read from a single
// getter (optionally gated by a pause flag). Covers wrapped/staked tokens whose contract exposes
// an exchange rate but no reserves.
use async_trait::async_trait;
use ethers::abi::Function;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{self, is_false, u256_dec, PoolExtraCodec};
use crate::contracts;
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

pub const POOL_TYPE: &str = "generic-simple-rate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleRateExtra {
    #[serde(with = "u256_dec")]
    pub rate: U256,
    #[serde(with = "u256_dec")]
    pub rate_unit: U256,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_rate_inversed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_bidirectional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub paused: bool,
    pub default_gas: u64,
}

impl PoolExtraCodec for SimpleRateExtra {
    const TYPE_TAG: &'static str = POOL_TYPE;
    const VERSION: u32 = 1;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimpleRateConfig {
    /// Getter returning the rate, e.g. `getRate` or `convertToAssets`-style views without args.
    pub rate_method: String,
    /// Contract exposing the rate; the pool address when unset.
    pub rate_target: Option<Address>,
    pub paused_method: Option<String>,
    #[serde(with = "u256_dec")]
    pub rate_unit: U256,
    pub is_rate_inversed: bool,
    pub is_bidirectional: bool,
    pub default_gas: u64,
}

impl Default for SimpleRateConfig {
    fn default() -> Self {
        Self {
            rate_method: "getRate".to_string(),
            rate_target: None,
            paused_method: None,
            rate_unit: U256::exp10(18),
            is_rate_inversed: false,
            is_bidirectional: false,
            default_gas: 60_000,
        }
    }
}

pub struct SimpleRateTracker {
    multicall: Multicall,
    config: SimpleRateConfig,
    rate_fn: Function,
    paused_fn: Option<Function>,
}

impl SimpleRateTracker {
    pub fn new(multicall: Multicall, config: SimpleRateConfig) -> Self {
        let rate_fn = contracts::uint_getter(&config.rate_method);
        let paused_fn = config.paused_method.as_deref().map(contracts::bool_getter);
        Self {
            multicall,
            config,
            rate_fn,
            paused_fn,
        }
    }

    pub fn from_context(context: &TrackerContext) -> Result<Self, PoolError> {
        Ok(Self::new(context.multicall.clone(), context.config()?))
    }

    async fn fetch(
        &self,
        pool: &PoolEntity,
        params: &TrackParams,
        overrides: Option<StateOverrides>,
    ) -> Result<PoolEntity, PoolError> {
        let target = match self.config.rate_target {
            Some(target) => target,
            None => pool.parsed_address()?,
        };

        let mut request = self.multicall.new_request();
        request.add_call(Call::new(target, &self.rate_fn, &[])?);
        if let Some(paused_fn) = &self.paused_fn {
            request.add_call(Call::new(target, paused_fn, &[])?);
        }
        request.set_context(params.block, overrides);
        let response = request.aggregate().await?;

        let paused = match self.paused_fn {
            Some(_) => response.output(1)?.bool(0)?,
            None => false,
        };
        let extra = SimpleRateExtra {
            rate: response.output(0)?.uint(0)?,
            rate_unit: self.config.rate_unit,
            is_rate_inversed: self.config.is_rate_inversed,
            is_bidirectional: self.config.is_bidirectional,
            paused,
            default_gas: self.config.default_gas,
        };

        // reserves are not part of the rate math; keep whatever the store holds
        pool.with_snapshot(
            pool.reserves.clone(),
            codec::encode(&extra)?,
            response.block_number,
        )
    }
}

#[async_trait]
impl PoolTracker for SimpleRateTracker {
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
pub struct SimpleRateSimulator {
    info: PoolInfo,
    extra: SimpleRateExtra,
}

impl SimpleRateSimulator {
    pub fn new(entity: &PoolEntity) -> Result<Self, PoolError> {
        let info = PoolInfo::from_entity(entity, Some(2))?;
        let extra = codec::decode(&entity.extra)?;
        Ok(Self { info, extra })
    }

    pub fn extra(&self) -> &SimpleRateExtra {
        &self.extra
    }

    /// Selling token0 divides by the rate unless the rate is quoted inverted.
    fn amount_out(&self, token_in: usize, amount_in: U256) -> Result<U256, PoolError> {
        let extra = &self.extra;
        let out = if extra.is_rate_inversed != (token_in == 0) {
            math::checked_div(math::checked_mul(amount_in, extra.rate_unit)?, extra.rate)?
        } else {
            math::checked_mul(math::checked_div(amount_in, extra.rate_unit)?, extra.rate)?
        };
        Ok(out)
    }
}

impl PoolSimulator for SimpleRateSimulator {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        if self.extra.paused {
            return Err(PoolError::PoolPaused);
        }
        request.ensure_kind(SwapKind::ExactInput)?;
        let (token_in, token_out) = self.info.resolve_pair(request)?;
        if token_in != 0 && !self.extra.is_bidirectional {
            return Err(PoolError::InvalidToken(format!(
                "{:?} can only be bought from this pool",
                self.info.tokens[token_in]
            )));
        }
        let amount_in = request.amount_u256()?;
        let amount_out = self.amount_out(token_in, amount_in)?;

        Ok(SwapResult {
            amount: TokenAmount {
                token: self.info.tokens[token_out],
                amount: amount_out,
            },
            fee: TokenAmount {
                token: self.info.tokens[token_in],
                amount: U256::zero(),
            },
            gas: self.extra.default_gas,
        })
    }

    fn can_swap_from(&self, token: Address) -> Vec<Address> {
        pair_outputs(&self.info, token, self.extra.is_bidirectional)
    }

    fn can_swap_to(&self, token: Address) -> Vec<Address> {
        pair_inputs(&self.info, token, self.extra.is_bidirectional)
    }
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        POOL_TYPE,
        tracker_factory(SimpleRateTracker::from_context),
        simulator_factory(SimpleRateSimulator::new),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PoolToken;
    use ethers::types::U512;

    fn entity(extra: &SimpleRateExtra) -> PoolEntity {
        let mut entity = PoolEntity::new(
            format!("{:?}", Address::repeat_byte(0xaa)),
            "generic-simple-rate",
            POOL_TYPE,
            vec![
                PoolToken::new(format!("{:?}", Address::repeat_byte(1)), 6),
                PoolToken::new(format!("{:?}", Address::repeat_byte(2)), 6),
            ],
            vec![U256::exp10(12), U256::exp10(12)],
        )
        .unwrap();
        entity.extra = codec::encode(extra).unwrap();
        entity
    }

    fn extra() -> SimpleRateExtra {
        SimpleRateExtra {
            rate: U256::from(1_050_000u64),
            rate_unit: U256::from(1_000_000u64),
            is_rate_inversed: false,
            is_bidirectional: true,
            paused: false,
            default_gas: 60_000,
        }
    }

    #[test]
    fn test_selling_token0_divides_by_rate() {
        let sim = SimpleRateSimulator::new(&entity(&extra())).unwrap();
        let result = sim
            .calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, 1_000_000u64))
            .unwrap();
        assert_eq!(result.amount.amount, U256::from(952_380u64));
        assert_eq!(result.amount.token, Address::repeat_byte(2));
        assert_eq!(result.fee.amount, U256::zero());
        assert_eq!(result.fee.token, Address::repeat_byte(1));
        assert_eq!(result.gas, 60_000);
    }

    #[test]
    fn test_inverted_rate_flips_direction() {
        let mut inverted = extra();
        inverted.is_rate_inversed = true;
        let sim = SimpleRateSimulator::new(&entity(&inverted)).unwrap();
        // divide first, then multiply
        let out = sim
            .calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, 2_500_000u64))
            .unwrap();
        assert_eq!(out.amount.amount, U256::from(2_100_000u64));
    }

    #[test]
    fn test_paused_pool_rejects_everything() {
        let mut paused = extra();
        paused.paused = true;
        let sim = SimpleRateSimulator::new(&entity(&paused)).unwrap();
        for (token_in, token_out, amount) in [(0usize, 1usize, 1u64), (1, 0, 1_000_000), (0, 1, 0)] {
            let result = sim.calc_amount_out(&SwapRequest::exact_in(token_in, token_out, amount));
            assert!(matches!(result, Err(PoolError::PoolPaused)));
        }
        // even an oversized amount fails on the pause flag first
        let huge = SwapRequest::exact_in(0usize, 1usize, U512::MAX);
        assert!(matches!(sim.calc_amount_out(&huge), Err(PoolError::PoolPaused)));
    }

    #[test]
    fn test_oversized_amount_overflows() {
        let sim = SimpleRateSimulator::new(&entity(&extra())).unwrap();
        let too_big = U512::from(U256::MAX) + U512::one();
        assert!(matches!(
            sim.calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, too_big)),
            Err(PoolError::Overflow)
        ));
        // fits in 256 bits but not after multiplying by the rate unit
        assert!(matches!(
            sim.calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, U256::MAX)),
            Err(PoolError::Overflow)
        ));
    }

    #[test]
    fn test_zero_rate_is_division_by_zero() {
        let mut zero = extra();
        zero.rate = U256::zero();
        let sim = SimpleRateSimulator::new(&entity(&zero)).unwrap();
        assert!(matches!(
            sim.calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, 10u64)),
            Err(PoolError::DivisionByZero)
        ));
    }

    #[test]
    fn test_round_trip_never_favours_the_caller() {
        let mut e18 = extra();
        e18.rate = U256::from(1_050_000_000_000_000_000u64);
        e18.rate_unit = U256::exp10(18);
        let sim = SimpleRateSimulator::new(&entity(&e18)).unwrap();
        for x in [
            U256::exp10(18),
            U256::from(123_456_789_012_345_678_901u128),
            U256::exp10(25) + 7,
        ] {
            let there = sim
                .calc_amount_out(&SwapRequest::exact_in(0usize, 1usize, x))
                .unwrap()
                .amount
                .amount;
            let back = sim
                .calc_amount_out(&SwapRequest::exact_in(1usize, 0usize, there))
                .unwrap()
                .amount
                .amount;
            assert!(back <= x, "round trip of {} returned more: {}", x, back);
            // loss is bounded by one truncation step on each leg
            assert!(x - back <= e18.rate + e18.rate / e18.rate_unit + 1);
        }
    }

    #[test]
    fn test_one_directional_pool() {
        let mut one_way = extra();
        one_way.is_bidirectional = false;
        let sim = SimpleRateSimulator::new(&entity(&one_way)).unwrap();
        let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));

        assert_eq!(sim.can_swap_from(a), vec![b]);
        assert_eq!(sim.can_swap_to(b), vec![a]);
        assert!(sim.can_swap_from(b).is_empty());
        assert!(sim.can_swap_to(a).is_empty());
        assert!(matches!(
            sim.calc_amount_out(&SwapRequest::exact_in(1usize, 0usize, 10u64)),
            Err(PoolError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_construction_failures() {
        let mut broken = entity(&extra());
        broken.extra = "{}".into();
        assert!(matches!(
            SimpleRateSimulator::new(&broken),
            Err(PoolError::Codec(_))
        ));

        let mut missing_rate = entity(&extra());
        missing_rate.extra = r#"{"t":"generic-simple-rate","v":1,"d":{"rate_unit":"1","default_gas":1}}"#.into();
        assert!(matches!(
            SimpleRateSimulator::new(&missing_rate),
            Err(PoolError::Codec(codec::CodecError::MissingField(_)))
        ));

        let mut three = entity(&extra());
        three.tokens.push(PoolToken::new(format!("{:?}", Address::repeat_byte(3)), 18));
        three.reserves.push(U256::zero());
        assert!(matches!(
            SimpleRateSimulator::new(&three),
            Err(PoolError::InvalidPool(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: SimpleRateConfig = serde_json::from_str(r#"{"rate_method":"convertRate"}"#).unwrap();
        assert_eq!(config.rate_method, "convertRate");
        assert_eq!(config.rate_unit, U256::exp10(18));
        assert_eq!(config.default_gas, 60_000);
    }
}
