use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::Address;
use log::debug;

use super::buffer::Erc4626Buffer;
use super::types::{BalancerV3Config, BalancerV3Extra, BalancerV3StaticExtra, HooksConfig};
use super::{static_extra, POOL_TYPE};
use crate::codec;
use crate::contracts::{balancer_v3, erc4626};
use crate::entity::{parse_address, PoolEntity};
use crate::error::PoolError;
use crate::multicall::{Call, Multicall};
use crate::registry::TrackerContext;
use crate::tracker::{instrumented, PoolTracker, TrackParams};
use crate::transport::StateOverrides;

// getPoolConfig tuple fields
const CONFIG_STATIC_SWAP_FEE: usize = 1;
const CONFIG_AGGREGATE_SWAP_FEE: usize = 2;
const CONFIG_IS_POOL_PAUSED: usize = 8;
const CONFIG_IS_POOL_IN_RECOVERY_MODE: usize = 9;

// getHooksConfig tuple fields
const HOOKS_ENABLE_HOOK_ADJUSTED_AMOUNTS: usize = 0;
const HOOKS_COMPUTE_DYNAMIC_SWAP_FEE: usize = 3;
const HOOKS_BEFORE_SWAP: usize = 4;
const HOOKS_AFTER_SWAP: usize = 5;

/// Calls issued before the per-buffer reads.
const FIXED_CALLS: usize = 7;

pub struct BalancerV3Tracker {
    multicall: Multicall,
    vault: Option<Address>,
}

impl BalancerV3Tracker {
    pub fn new(multicall: Multicall, config: BalancerV3Config) -> Result<Self, PoolError> {
        let vault = config.vault.as_deref().map(parse_address).transpose()?;
        Ok(Self { multicall, vault })
    }

    pub fn from_context(context: &TrackerContext) -> Result<Self, PoolError> {
        Self::new(context.multicall.clone(), context.config()?)
    }

    fn statics(&self, pool: &PoolEntity) -> Result<BalancerV3StaticExtra, PoolError> {
        let mut statics = static_extra(pool)?;
        if pool.static_extra.trim().is_empty() {
            if let Some(vault) = self.vault {
                statics.vault = vault;
            }
        }
        Ok(statics)
    }

    async fn fetch(
        &self,
        pool: &PoolEntity,
        params: &TrackParams,
        overrides: Option<StateOverrides>,
    ) -> Result<PoolEntity, PoolError> {
        let address = pool.parsed_address()?;
        let statics = self.statics(pool)?;
        let vault = statics.vault;
        let pool_arg = [Token::Address(address)];

        let buffer_tokens: Vec<(usize, Address)> = (0..pool.tokens.len())
            .filter_map(|i| statics.buffer_token(i).map(|token| (i, token)))
            .collect();

        let mut request = self.multicall.new_request();
        request
            .add_call(Call::new(vault, &balancer_v3::GET_POOL_TOKEN_INFO, &pool_arg)?)
            .add_call(Call::new(vault, &balancer_v3::GET_CURRENT_LIVE_BALANCES, &pool_arg)?)
            .add_call(Call::new(vault, &balancer_v3::GET_POOL_TOKEN_RATES, &pool_arg)?)
            .add_call(Call::new(vault, &balancer_v3::GET_POOL_CONFIG, &pool_arg)?)
            .add_call(Call::new(vault, &balancer_v3::GET_HOOKS_CONFIG, &pool_arg)?)
            .add_call(Call::new(vault, &balancer_v3::IS_VAULT_PAUSED, &[])?)
            .add_call(Call::new(address, &balancer_v3::GET_NORMALIZED_WEIGHTS, &[])?);
        for (_, token) in &buffer_tokens {
            request
                .add_call(Call::new(*token, &erc4626::TOTAL_ASSETS, &[])?)
                .add_call(Call::new(*token, &erc4626::TOTAL_SUPPLY, &[])?);
        }
        request.set_context(params.block, overrides);
        let response = request.aggregate().await?;

        let token_info = response.output(0)?;
        let registered = token_info.address_array(0)?;
        self.check_registered_tokens(pool, &statics, &registered)?;
        let balances_raw = token_info.uint_array(2)?;

        let rates = response.output(2)?;
        let pool_config = response.output(3)?.tuple(0)?;
        let hooks = response.output(4)?.tuple(0)?;

        let mut buffers = vec![None; pool.tokens.len()];
        for (n, (index, token)) in buffer_tokens.iter().enumerate() {
            let assets = response.output(FIXED_CALLS + 2 * n)?.uint(0)?;
            let supply = response.output(FIXED_CALLS + 2 * n + 1)?.uint(0)?;
            debug!("{}: buffer {:?} holds {} assets / {} shares", pool.address, token, assets, supply);
            buffers[*index] = Some(Erc4626Buffer::new(assets, supply));
        }

        let extra = BalancerV3Extra {
            hooks_config: HooksConfig {
                enable_hook_adjusted_amounts: hooks.bool(HOOKS_ENABLE_HOOK_ADJUSTED_AMOUNTS)?,
                should_call_compute_dynamic_swap_fee: hooks.bool(HOOKS_COMPUTE_DYNAMIC_SWAP_FEE)?,
                should_call_before_swap: hooks.bool(HOOKS_BEFORE_SWAP)?,
                should_call_after_swap: hooks.bool(HOOKS_AFTER_SWAP)?,
            },
            static_swap_fee_percentage: pool_config.uint(CONFIG_STATIC_SWAP_FEE)?,
            aggregate_swap_fee_percentage: pool_config.uint(CONFIG_AGGREGATE_SWAP_FEE)?,
            normalized_weights: response.output(6)?.uint_array(0)?,
            balances_live_scaled18: response.output(1)?.uint_array(0)?,
            decimal_scaling_factors: rates.uint_array(0)?,
            token_rates: rates.uint_array(1)?,
            buffers,
            is_vault_paused: response.output(5)?.bool(0)?,
            is_pool_paused: pool_config.bool(CONFIG_IS_POOL_PAUSED)?,
            is_pool_in_recovery_mode: pool_config.bool(CONFIG_IS_POOL_IN_RECOVERY_MODE)?,
        };

        pool.with_snapshot(balances_raw, codec::encode(&extra)?, response.block_number)
    }

    /// The Vault's token list must match the entity, with wrappers in place of buffered tokens.
    fn check_registered_tokens(
        &self,
        pool: &PoolEntity,
        statics: &BalancerV3StaticExtra,
        registered: &[Address],
    ) -> Result<(), PoolError> {
        let tokens = pool.token_addresses()?;
        if registered.len() != tokens.len() {
            return Err(PoolError::InvalidPool(format!(
                "{}: vault reports {} tokens, entity has {}",
                pool.address,
                registered.len(),
                tokens.len()
            )));
        }
        for (i, (registered, token)) in registered.iter().zip(&tokens).enumerate() {
            let expected = statics.buffer_token(i).unwrap_or(*token);
            if *registered != expected {
                return Err(PoolError::InvalidPool(format!(
                    "{}: token #{} is {:?} in the vault, expected {:?}",
                    pool.address, i, registered, expected
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PoolTracker for BalancerV3Tracker {
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
