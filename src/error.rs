//! Error taxonomy shared by trackers, simulators and the registry.
//!
//! Every failure falls into one of three classes so the routing engine can decide what to do
//! without knowing the protocol behind a pool:
//!
//! - **Transient**: the remote read did not complete (transport down, timeout, cancellation).
//!   Retry later; nothing was overwritten.
//! - **Terminal**: the input itself is unusable (malformed blob, wrong arity, unknown type tag,
//!   a read that reverted). Retrying without fixing the input gives the same answer.
//! - **Domain**: the pool is healthy but this swap is not possible (paused, bond window closed,
//!   overflow, insufficient liquidity). Try a different route.

use ethers::types::Address;
use std::time::Duration;
use thiserror::Error;

use crate::codec::CodecError;
use crate::math::MathError;
use crate::rfq::RfqError;
use crate::simulator::SwapKind;
use crate::transport::TransportError;

/// Coarse classification of a [`PoolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Transient,
    Terminal,
    Domain,
}

#[derive(Debug, Error)]
pub enum PoolError {
    // --- transient ---
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("remote read timed out after {0:?}")]
    Timeout(Duration),
    #[error("fetch cancelled by caller")]
    Cancelled,
    #[error("call #{index} to {target:?} reverted")]
    CallFailed { index: usize, target: Address },

    // --- terminal ---
    #[error("snapshot codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("invalid pool: {0}")]
    InvalidPool(String),
    #[error("abi error: {0}")]
    Abi(String),
    #[error("unknown pool type: {0}")]
    UnknownPoolType(String),
    #[error("invalid configuration: {0}")]
    Config(String),

    // --- domain ---
    #[error("pool is paused")]
    PoolPaused,
    #[error("bond not started")]
    BondNotStarted,
    #[error("bond ended")]
    BondEnded,
    #[error("amount does not fit in 256 bits")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic error: {0}")]
    Math(MathError),
    #[error("token is not part of this pool: {0}")]
    InvalidToken(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("amount in exceeds max in ratio")]
    MaxInRatio,
    #[error("amount out exceeds max out ratio")]
    MaxOutRatio,
    #[error("pool hook is not supported: {0}")]
    HookNotSupported(String),
    #[error("swap kind {0:?} is not supported by this pool")]
    UnsupportedSwapKind(SwapKind),
    #[error("rfq error: {0}")]
    Rfq(#[from] RfqError),
}

impl PoolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PoolError::Transport(_)
            | PoolError::Timeout(_)
            | PoolError::Cancelled => ErrorClass::Transient,
            PoolError::CallFailed { .. }
            | PoolError::Codec(_)
            | PoolError::InvalidPool(_)
            | PoolError::Abi(_)
            | PoolError::UnknownPoolType(_)
            | PoolError::Config(_) => ErrorClass::Terminal,
            PoolError::Rfq(e) if e.is_transient() => ErrorClass::Transient,
            _ => ErrorClass::Domain,
        }
    }

    /// True when the same request may succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<MathError> for PoolError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::DivisionByZero => PoolError::DivisionByZero,
            MathError::Overflow => PoolError::Overflow,
            other => PoolError::Math(other),
        }
    }
}

impl From<ethers::abi::Error> for PoolError {
    fn from(e: ethers::abi::Error) -> Self {
        PoolError::Abi(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert!(PoolError::Cancelled.is_retryable());
        assert!(PoolError::Timeout(Duration::from_secs(1)).is_retryable());
        assert_eq!(
            PoolError::InvalidPool("arity".into()).class(),
            ErrorClass::Terminal
        );
        assert_eq!(PoolError::PoolPaused.class(), ErrorClass::Domain);
        assert_eq!(PoolError::Overflow.class(), ErrorClass::Domain);
        assert_eq!(
            PoolError::from(MathError::DivisionByZero).class(),
            ErrorClass::Domain
        );
    }

    #[test]
    fn reverted_call_is_terminal() {
        let err = PoolError::CallFailed {
            index: 0,
            target: Address::zero(),
        };
        assert_eq!(err.class(), ErrorClass::Terminal);
        assert!(!err.is_retryable());
        assert!(PoolError::from(TransportError::Unavailable("connection reset".into())).is_retryable());
    }

    #[test]
    fn rfq_errors_are_domain_conditions() {
        assert_eq!(
            PoolError::from(RfqError::Blacklist).class(),
            ErrorClass::Domain
        );
        assert_eq!(
            PoolError::from(RfqError::Http("connection reset".into())).class(),
            ErrorClass::Transient
        );
    }
}
