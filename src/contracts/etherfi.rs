use ethers::abi::Function;
use once_cell::sync::Lazy;

/// ether.fi LiquidityPool
pub const LIQUIDITY_POOL: &str = "0x308861a430be4cce5502d0a12724771fc6daf216";
/// eETH (rebasing share token)
pub const EETH: &str = "0x35fa164735182de50811e8e2e824cfb9b6118ac2";
/// weETH (non-rebasing wrapper)
pub const WEETH: &str = "0xcd5fe23c85820f7b72d0926fc9b05b43e359b7ee";

pub static GET_TOTAL_POOLED_ETHER: Lazy<Function> =
    Lazy::new(|| super::uint_getter("getTotalPooledEther"));
pub static TOTAL_SHARES: Lazy<Function> = Lazy::new(|| super::uint_getter("totalShares"));
