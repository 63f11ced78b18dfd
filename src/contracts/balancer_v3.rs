// Balancer V3 Vault (VaultExtension/VaultExplorer views) and weighted pool reads.
use ethers::abi::{Function, ParamType};
use once_cell::sync::Lazy;

/// Balancer V3 Vault, same address on every chain it is deployed to.
pub const VAULT: &str = "0xba1333333333a1ba1108e8412f11850a5c319ba9";

fn uint_array() -> ParamType {
    ParamType::Array(Box::new(ParamType::Uint(256)))
}

/// `getPoolTokenInfo(address pool) returns (address[] tokens, TokenInfo[] tokenInfo,
///     uint256[] balancesRaw, uint256[] lastBalancesLiveScaled18)`
pub static GET_POOL_TOKEN_INFO: Lazy<Function> = Lazy::new(|| {
    super::view(
        "getPoolTokenInfo",
        vec![ParamType::Address],
        vec![
            ParamType::Array(Box::new(ParamType::Address)),
            ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Uint(8),
                ParamType::Address,
                ParamType::Bool,
            ]))),
            uint_array(),
            uint_array(),
        ],
    )
});

/// `getCurrentLiveBalances(address pool) returns (uint256[] balancesLiveScaled18)`
pub static GET_CURRENT_LIVE_BALANCES: Lazy<Function> = Lazy::new(|| {
    super::view(
        "getCurrentLiveBalances",
        vec![ParamType::Address],
        vec![uint_array()],
    )
});

/// `getPoolTokenRates(address pool) returns (uint256[] decimalScalingFactors, uint256[] tokenRates)`
pub static GET_POOL_TOKEN_RATES: Lazy<Function> = Lazy::new(|| {
    super::view(
        "getPoolTokenRates",
        vec![ParamType::Address],
        vec![uint_array(), uint_array()],
    )
});

/// `getPoolConfig(address pool) returns (PoolConfig)`
///
/// PoolConfig: (LiquidityManagement(4 x bool), staticSwapFeePercentage,
/// aggregateSwapFeePercentage, aggregateYieldFeePercentage, uint40 tokenDecimalDiffs,
/// uint32 pauseWindowEndTime, isPoolRegistered, isPoolInitialized, isPoolPaused,
/// isPoolInRecoveryMode)
pub static GET_POOL_CONFIG: Lazy<Function> = Lazy::new(|| {
    super::view(
        "getPoolConfig",
        vec![ParamType::Address],
        vec![ParamType::Tuple(vec![
            ParamType::Tuple(vec![ParamType::Bool; 4]),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(40),
            ParamType::Uint(32),
            ParamType::Bool,
            ParamType::Bool,
            ParamType::Bool,
            ParamType::Bool,
        ])],
    )
});

/// `getHooksConfig(address pool) returns (HooksConfig)`: ten flags then the hooks contract.
pub static GET_HOOKS_CONFIG: Lazy<Function> = Lazy::new(|| {
    let mut fields = vec![ParamType::Bool; 10];
    fields.push(ParamType::Address);
    super::view(
        "getHooksConfig",
        vec![ParamType::Address],
        vec![ParamType::Tuple(fields)],
    )
});

pub static IS_VAULT_PAUSED: Lazy<Function> = Lazy::new(|| super::bool_getter("isVaultPaused"));

/// Weighted pool: `getNormalizedWeights() returns (uint256[])`
pub static GET_NORMALIZED_WEIGHTS: Lazy<Function> =
    Lazy::new(|| super::view("getNormalizedWeights", vec![], vec![uint_array()]));
