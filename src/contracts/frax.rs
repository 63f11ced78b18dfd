use ethers::abi::Function;
use once_cell::sync::Lazy;

/// frxETHMinter
pub const FRXETH_MINTER: &str = "0xbafa44efe7901e04e39dad13167d089c559c1138";
/// sfrxETH (ERC-4626 vault over frxETH)
pub const SFRXETH: &str = "0xac3e018457b222d93114458476f3e3416abbe38f";
pub const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";

pub static SUBMIT_PAUSED: Lazy<Function> = Lazy::new(|| super::bool_getter("submitPaused"));
