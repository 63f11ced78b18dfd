//! Swap simulation interface.
//!
//! A [`PoolSimulator`] is built from exactly one [`PoolEntity`] snapshot and answers swap
//! questions without any remote call. All computation is synchronous integer arithmetic that
//! mirrors the protocol's on-chain evaluation order.

use crate::entity::PoolEntity;
use crate::error::PoolError;
use ethers::types::{Address, U256, U512};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapKind {
    /// The input amount is fixed, the output is computed.
    ExactInput,
    /// The output amount is fixed, the required input is computed.
    ExactOutput,
}

/// Names a pool token either by its position or by its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRef {
    Index(usize),
    Address(Address),
}

impl From<usize> for TokenRef {
    fn from(index: usize) -> Self {
        TokenRef::Index(index)
    }
}

impl From<Address> for TokenRef {
    fn from(address: Address) -> Self {
        TokenRef::Address(address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub kind: SwapKind,
    pub token_in: TokenRef,
    pub token_out: TokenRef,
    /// Wider than any pool's domain so that oversized inputs surface as `Overflow`.
    pub amount: U512,
}

impl SwapRequest {
    pub fn exact_in(
        token_in: impl Into<TokenRef>,
        token_out: impl Into<TokenRef>,
        amount: impl Into<U512>,
    ) -> Self {
        Self {
            kind: SwapKind::ExactInput,
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount: amount.into(),
        }
    }

    pub fn exact_out(
        token_in: impl Into<TokenRef>,
        token_out: impl Into<TokenRef>,
        amount: impl Into<U512>,
    ) -> Self {
        Self {
            kind: SwapKind::ExactOutput,
            ..Self::exact_in(token_in, token_out, amount)
        }
    }

    pub fn ensure_kind(&self, expected: SwapKind) -> Result<(), PoolError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(PoolError::UnsupportedSwapKind(self.kind))
        }
    }

    /// The request amount in the 256-bit domain every pool computes in.
    pub fn amount_u256(&self) -> Result<U256, PoolError> {
        amount_to_u256(self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    /// The computed side: output for exact-in, required input for exact-out.
    pub amount: TokenAmount,
    /// Denominated in the input token unless the protocol charges elsewhere.
    pub fee: TokenAmount,
    pub gas: u64,
}

/// Generic view of the snapshot a simulator was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub address: Address,
    pub exchange: String,
    pub pool_type: String,
    pub tokens: Vec<Address>,
    pub decimals: Vec<u8>,
    pub reserves: Vec<U256>,
    pub block_number: Option<u64>,
}

impl PoolInfo {
    /// Validates the entity and, when `arity` is given, its exact token count.
    pub fn from_entity(entity: &PoolEntity, arity: Option<usize>) -> Result<Self, PoolError> {
        entity.validate()?;
        if let Some(expected) = arity {
            if entity.tokens.len() != expected {
                return Err(PoolError::InvalidPool(format!(
                    "{}: {} pools have exactly {} tokens, got {}",
                    entity.address,
                    entity.pool_type,
                    expected,
                    entity.tokens.len()
                )));
            }
        }
        Ok(Self {
            address: entity.parsed_address()?,
            exchange: entity.exchange.clone(),
            pool_type: entity.pool_type.clone(),
            tokens: entity.token_addresses()?,
            decimals: entity.tokens.iter().map(|t| t.decimals).collect(),
            reserves: entity.reserves.clone(),
            block_number: entity.block_number,
        })
    }

    pub fn token_index(&self, token: Address) -> Option<usize> {
        self.tokens.iter().position(|t| *t == token)
    }

    pub fn resolve(&self, token: TokenRef) -> Result<usize, PoolError> {
        match token {
            TokenRef::Index(i) if i < self.tokens.len() => Ok(i),
            TokenRef::Index(i) => Err(PoolError::InvalidToken(format!("index {}", i))),
            TokenRef::Address(a) => self
                .token_index(a)
                .ok_or_else(|| PoolError::InvalidToken(format!("{:?}", a))),
        }
    }

    /// Resolves `(index_in, index_out)` and rejects a swap of a token into itself.
    pub fn resolve_pair(&self, request: &SwapRequest) -> Result<(usize, usize), PoolError> {
        let token_in = self.resolve(request.token_in)?;
        let token_out = self.resolve(request.token_out)?;
        if token_in == token_out {
            return Err(PoolError::InvalidToken(format!(
                "{:?} cannot be swapped into itself",
                self.tokens[token_in]
            )));
        }
        Ok((token_in, token_out))
    }
}

pub trait PoolSimulator: Send + Sync + Debug {
    fn info(&self) -> &PoolInfo;

    /// Output for an exact input. Read-only.
    fn calc_amount_out(&self, request: &SwapRequest) -> Result<SwapResult, PoolError>;

    /// Required input for an exact output, where the protocol supports it.
    fn calc_amount_in(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        Err(PoolError::UnsupportedSwapKind(request.kind))
    }

    /// Dispatches on the request kind.
    fn simulate(&self, request: &SwapRequest) -> Result<SwapResult, PoolError> {
        match request.kind {
            SwapKind::ExactInput => self.calc_amount_out(request),
            SwapKind::ExactOutput => self.calc_amount_in(request),
        }
    }

    /// Advances internal balances by a swap the caller decided to take. Rate-only pools keep
    /// this as a no-op.
    fn update_balance(&mut self, _request: &SwapRequest, _result: &SwapResult) {}

    /// Tokens that can be received when selling `token`.
    fn can_swap_from(&self, token: Address) -> Vec<Address>;

    /// Tokens that can be sold to receive `token`.
    fn can_swap_to(&self, token: Address) -> Vec<Address>;

    fn token_index(&self, token: Address) -> Option<usize> {
        self.info().token_index(token)
    }
}

pub fn amount_to_u256(amount: U512) -> Result<U256, PoolError> {
    U256::try_from(amount).map_err(|_| PoolError::Overflow)
}

/// Legal outputs for `token_in` in a two-token pool whose forward direction is 0 -> 1.
pub fn pair_outputs(info: &PoolInfo, token_in: Address, bidirectional: bool) -> Vec<Address> {
    match info.token_index(token_in) {
        Some(0) => vec![info.tokens[1]],
        Some(1) if bidirectional => vec![info.tokens[0]],
        _ => Vec::new(),
    }
}

/// Legal inputs for `token_out` in a two-token pool whose forward direction is 0 -> 1.
pub fn pair_inputs(info: &PoolInfo, token_out: Address, bidirectional: bool) -> Vec<Address> {
    match info.token_index(token_out) {
        Some(1) => vec![info.tokens[0]],
        Some(0) if bidirectional => vec![info.tokens[1]],
        _ => Vec::new(),
    }
}

/// Every other token of an n-token pool where all pairs trade.
pub fn all_others(info: &PoolInfo, token: Address) -> Vec<Address> {
    if info.token_index(token).is_none() {
        return Vec::new();
    }
    info.tokens.iter().copied().filter(|t| *t != token).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PoolToken;

    fn info() -> PoolInfo {
        let entity = PoolEntity::new(
            format!("{:?}", Address::repeat_byte(0xcc)),
            "test",
            "test",
            vec![
                PoolToken::new(format!("{:?}", Address::repeat_byte(1)), 18),
                PoolToken::new(format!("{:?}", Address::repeat_byte(2)), 6),
            ],
            vec![U256::zero(), U256::zero()],
        )
        .unwrap();
        PoolInfo::from_entity(&entity, Some(2)).unwrap()
    }

    #[test]
    fn test_resolve_tokens() {
        let info = info();
        assert_eq!(info.resolve(TokenRef::Index(1)).unwrap(), 1);
        assert_eq!(info.resolve(Address::repeat_byte(2).into()).unwrap(), 1);
        assert!(matches!(info.resolve(TokenRef::Index(2)), Err(PoolError::InvalidToken(_))));
        assert!(info.resolve(Address::repeat_byte(9).into()).is_err());
        let same = SwapRequest::exact_in(0usize, 0usize, 1u64);
        assert!(info.resolve_pair(&same).is_err());
        assert_eq!(info.decimals, vec![18, 6]);
    }

    #[test]
    fn test_arity_is_enforced() {
        let entity = PoolEntity::new(
            format!("{:?}", Address::repeat_byte(0xcc)),
            "test",
            "test",
            (1..=3)
                .map(|b| PoolToken::new(format!("{:?}", Address::repeat_byte(b)), 18))
                .collect(),
            vec![U256::zero(); 3],
        )
        .unwrap();
        assert!(matches!(
            PoolInfo::from_entity(&entity, Some(2)),
            Err(PoolError::InvalidPool(_))
        ));
        assert!(PoolInfo::from_entity(&entity, None).is_ok());
    }

    #[test]
    fn test_amount_conversion_overflows() {
        let too_big = U512::from(U256::MAX) + U512::one();
        assert!(matches!(amount_to_u256(too_big), Err(PoolError::Overflow)));
        assert_eq!(amount_to_u256(U512::from(7u64)).unwrap(), U256::from(7u64));
    }

    #[test]
    fn test_one_directional_sets_are_consistent() {
        let info = info();
        let (a, b) = (info.tokens[0], info.tokens[1]);
        assert_eq!(pair_outputs(&info, a, false), vec![b]);
        assert_eq!(pair_inputs(&info, b, false), vec![a]);
        assert!(pair_outputs(&info, b, false).is_empty());
        assert!(pair_inputs(&info, a, false).is_empty());

        assert_eq!(pair_outputs(&info, b, true), vec![a]);
        assert_eq!(pair_inputs(&info, a, true), vec![b]);
        assert!(pair_outputs(&info, Address::repeat_byte(7), true).is_empty());
    }

    #[test]
    fn test_request_kind_guard() {
        let request = SwapRequest::exact_out(0usize, 1usize, 5u64);
        assert_eq!(request.kind, SwapKind::ExactOutput);
        assert!(matches!(
            request.ensure_kind(SwapKind::ExactInput),
            Err(PoolError::UnsupportedSwapKind(SwapKind::ExactOutput))
        ));
    }
}
