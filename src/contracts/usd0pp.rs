use ethers::abi::Function;
use once_cell::sync::Lazy;

pub const USD0PP: &str = "0x35d8949372d46b7a3d5a56006ae77b215fc69bc0";
pub const USD0: &str = "0x73a15fed60bf67631dc6cd7bc5b6e8da8190acf5";

pub static PAUSED: Lazy<Function> = Lazy::new(|| super::bool_getter("paused"));
pub static GET_START_TIME: Lazy<Function> = Lazy::new(|| super::uint_getter("getStartTime"));
pub static GET_END_TIME: Lazy<Function> = Lazy::new(|| super::uint_getter("getEndTime"));
