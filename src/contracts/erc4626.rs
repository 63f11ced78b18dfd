use ethers::abi::Function;
use once_cell::sync::Lazy;

pub static TOTAL_ASSETS: Lazy<Function> = Lazy::new(|| super::uint_getter("totalAssets"));
pub static TOTAL_SUPPLY: Lazy<Function> = Lazy::new(|| super::uint_getter("totalSupply"));
