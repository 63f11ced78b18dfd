use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use super::buffer::Erc4626Buffer;
use super::POOL_TYPE;
use crate::codec::{is_false, u256_dec, u256_vec_dec, PoolExtraCodec};
use crate::contracts::balancer_v3::VAULT;

/// The four hook flags that affect a swap. Any of them set means the swap result depends on
/// contract code we do not model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    #[serde(skip_serializing_if = "is_false")]
    pub enable_hook_adjusted_amounts: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub should_call_compute_dynamic_swap_fee: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub should_call_before_swap: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub should_call_after_swap: bool,
}

impl HooksConfig {
    pub fn affects_swaps(&self) -> bool {
        self.enable_hook_adjusted_amounts
            || self.should_call_compute_dynamic_swap_fee
            || self.should_call_before_swap
            || self.should_call_after_swap
    }
}

/// Per-refresh Vault and pool state. Vectors are indexed like the pool's registered tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerV3Extra {
    #[serde(default)]
    pub hooks_config: HooksConfig,
    #[serde(with = "u256_dec")]
    pub static_swap_fee_percentage: U256,
    #[serde(with = "u256_dec")]
    pub aggregate_swap_fee_percentage: U256,
    #[serde(with = "u256_vec_dec")]
    pub normalized_weights: Vec<U256>,
    #[serde(with = "u256_vec_dec")]
    pub balances_live_scaled18: Vec<U256>,
    #[serde(with = "u256_vec_dec")]
    pub decimal_scaling_factors: Vec<U256>,
    #[serde(with = "u256_vec_dec")]
    pub token_rates: Vec<U256>,
    /// `None` where the pool token is not an ERC-4626 wrapper.
    #[serde(default)]
    pub buffers: Vec<Option<Erc4626Buffer>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_vault_paused: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_pool_paused: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_pool_in_recovery_mode: bool,
}

impl PoolExtraCodec for BalancerV3Extra {
    const TYPE_TAG: &'static str = POOL_TYPE;
    const VERSION: u32 = 1;
}

/// Fixed at discovery time.
///
/// Entity tokens are what a router trades. Where `buffer_tokens[i]` is set, entity token `i` is
/// the underlying asset and the pool itself holds that ERC-4626 wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerV3StaticExtra {
    #[serde(default = "default_vault")]
    pub vault: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
    #[serde(default)]
    pub buffer_tokens: Vec<Option<Address>>,
}

fn default_vault() -> Address {
    VAULT.parse().unwrap_or_default()
}

impl Default for BalancerV3StaticExtra {
    fn default() -> Self {
        Self {
            vault: default_vault(),
            hook_type: None,
            buffer_tokens: Vec::new(),
        }
    }
}

impl BalancerV3StaticExtra {
    pub fn buffer_token(&self, index: usize) -> Option<Address> {
        self.buffer_tokens.get(index).copied().flatten()
    }
}

impl PoolExtraCodec for BalancerV3StaticExtra {
    const TYPE_TAG: &'static str = "balancer-v3-weighted.static";
    const VERSION: u32 = 1;
}

/// Tracker settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BalancerV3Config {
    /// Overrides the Vault for entities whose static extra is empty.
    pub vault: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_flags_are_omitted_when_false() {
        let extra = BalancerV3Extra {
            hooks_config: HooksConfig::default(),
            static_swap_fee_percentage: U256::exp10(15),
            aggregate_swap_fee_percentage: U256::zero(),
            normalized_weights: vec![U256::exp10(17) * 5; 2],
            balances_live_scaled18: vec![U256::exp10(21); 2],
            decimal_scaling_factors: vec![U256::one(); 2],
            token_rates: vec![U256::exp10(18); 2],
            buffers: vec![None, Some(Erc4626Buffer::new(U256::from(5u64), U256::from(4u64)))],
            is_vault_paused: false,
            is_pool_paused: false,
            is_pool_in_recovery_mode: false,
        };
        let blob = codec::encode(&extra).unwrap();
        assert!(!blob.contains("is_pool_paused"));
        assert!(!blob.contains("should_call_before_swap"));
        assert_eq!(codec::decode::<BalancerV3Extra>(&blob).unwrap(), extra);
    }

    #[test]
    fn test_static_extra_defaults_to_canonical_vault() {
        let blob = r#"{"t":"balancer-v3-weighted.static","v":1,"d":{}}"#;
        let decoded = codec::decode::<BalancerV3StaticExtra>(blob).unwrap();
        assert_eq!(decoded.vault, VAULT.parse::<Address>().unwrap());
        assert_eq!(decoded.buffer_token(0), None);
    }

    #[test]
    fn test_hooks_that_affect_swaps() {
        assert!(!HooksConfig::default().affects_swaps());
        let dynamic_fee = HooksConfig {
            should_call_compute_dynamic_swap_fee: true,
            ..Default::default()
        };
        assert!(dynamic_fee.affects_swaps());
    }
}
