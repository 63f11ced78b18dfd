// Contracts Module - read-only ABI fragments for the reads each tracker batches.
//
// Functions are built by hand (no abigen) because the aggregator only needs `Function` values to
// encode calldata and decode return data; it never binds them to a middleware.

pub mod balancer_v3;
pub mod erc4626;
pub mod etherfi;
pub mod frax;
pub mod multicall3;
pub mod usd0pp;

use ethers::abi::{Function, Param, ParamType, StateMutability};

fn params(kinds: Vec<ParamType>) -> Vec<Param> {
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Param {
            name: format!("arg{}", i),
            kind,
            internal_type: None,
        })
        .collect()
}

/// Builds a function fragment with positional parameter names.
#[allow(deprecated)]
pub fn function(
    name: &str,
    inputs: Vec<ParamType>,
    outputs: Vec<ParamType>,
    state_mutability: StateMutability,
) -> Function {
    Function {
        name: name.to_string(),
        inputs: params(inputs),
        outputs: params(outputs),
        constant: None,
        state_mutability,
    }
}

/// Shorthand for a `view` function.
pub fn view(name: &str, inputs: Vec<ParamType>, outputs: Vec<ParamType>) -> Function {
    function(name, inputs, outputs, StateMutability::View)
}

/// A no-argument view returning a single `uint256` (rates, totals, timestamps).
pub fn uint_getter(name: &str) -> Function {
    view(name, vec![], vec![ParamType::Uint(256)])
}

/// A no-argument view returning a single `bool` (pause flags).
pub fn bool_getter(name: &str) -> Function {
    view(name, vec![], vec![ParamType::Bool])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_match_solidity_signatures() {
        // keccak256("totalSupply()")[..4]
        assert_eq!(uint_getter("totalSupply").short_signature(), [0x18, 0x16, 0x0d, 0xdd]);
        // keccak256("paused()")[..4]
        assert_eq!(bool_getter("paused").short_signature(), [0x5c, 0x97, 0x5a, 0xbb]);
    }
}
