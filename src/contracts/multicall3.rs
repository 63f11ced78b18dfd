use ethers::abi::{Function, ParamType, StateMutability};
use once_cell::sync::Lazy;

/// Multicall3 is deployed at the same address on every major EVM chain.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// `tryBlockAndAggregate(bool requireSuccess, (address target, bytes callData)[] calls)
///     returns (uint256 blockNumber, bytes32 blockHash, (bool success, bytes returnData)[] returnData)`
///
/// Returning the block number from inside the same execution is what ties every result of a
/// batch to one height.
pub static TRY_BLOCK_AND_AGGREGATE: Lazy<Function> = Lazy::new(|| {
    super::function(
        "tryBlockAndAggregate",
        vec![
            ParamType::Bool,
            ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Bytes,
            ]))),
        ],
        vec![
            ParamType::Uint(256),
            ParamType::FixedBytes(32),
            ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Bool,
                ParamType::Bytes,
            ]))),
        ],
        StateMutability::Payable,
    )
});
