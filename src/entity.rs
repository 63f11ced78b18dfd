use crate::codec::u256_vec_dec;
use crate::error::PoolError;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// A token slot of a pool. The position in [`PoolEntity::tokens`] is the token's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolToken {
    pub address: String,
    pub decimals: u8,
    #[serde(default = "default_true")]
    pub swappable: bool,
}

fn default_true() -> bool {
    true
}

impl PoolToken {
    pub fn new(address: impl Into<String>, decimals: u8) -> Self {
        Self {
            address: address.into().to_lowercase(),
            decimals,
            swappable: true,
        }
    }

    pub fn parsed_address(&self) -> Result<Address, PoolError> {
        parse_address(&self.address)
    }
}

/// Protocol-agnostic pool snapshot, as stored by the host.
///
/// Produced by a tracker and consumed by a simulator. Only the tracker rewrites it, and it does
/// so by returning a new value; the token order fixed at creation never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntity {
    pub address: String,
    pub exchange: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub tokens: Vec<PoolToken>,
    #[serde(with = "u256_vec_dec")]
    pub reserves: Vec<U256>,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub static_extra: String,
    /// Height the snapshot was read at; `None` when it is unknown.
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Unix seconds of the capture.
    #[serde(default)]
    pub timestamp: i64,
}

impl PoolEntity {
    /// Builds a validated entity with lowercased addresses and empty blobs.
    pub fn new(
        address: impl Into<String>,
        exchange: impl Into<String>,
        pool_type: impl Into<String>,
        tokens: Vec<PoolToken>,
        reserves: Vec<U256>,
    ) -> Result<Self, PoolError> {
        let entity = Self {
            address: address.into().to_lowercase(),
            exchange: exchange.into(),
            pool_type: pool_type.into(),
            tokens: tokens
                .into_iter()
                .map(|t| PoolToken {
                    address: t.address.to_lowercase(),
                    ..t
                })
                .collect(),
            reserves,
            extra: String::new(),
            static_extra: String::new(),
            block_number: None,
            timestamp: 0,
        };
        entity.validate()?;
        Ok(entity)
    }

    pub fn with_static_extra(mut self, static_extra: String) -> Self {
        self.static_extra = static_extra;
        self
    }

    /// Checks the structural invariants every simulator relies on.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.tokens.len() < 2 {
            return Err(PoolError::InvalidPool(format!(
                "{}: expected at least 2 tokens, got {}",
                self.address,
                self.tokens.len()
            )));
        }
        if self.tokens.len() != self.reserves.len() {
            return Err(PoolError::InvalidPool(format!(
                "{}: {} tokens but {} reserves",
                self.address,
                self.tokens.len(),
                self.reserves.len()
            )));
        }
        parse_address(&self.address)?;
        for token in &self.tokens {
            token.parsed_address()?;
        }
        Ok(())
    }

    pub fn parsed_address(&self) -> Result<Address, PoolError> {
        parse_address(&self.address)
    }

    pub fn token_addresses(&self) -> Result<Vec<Address>, PoolError> {
        self.tokens.iter().map(PoolToken::parsed_address).collect()
    }

    pub fn token_index(&self, token: &str) -> Option<usize> {
        let token = token.to_lowercase();
        self.tokens.iter().position(|t| t.address == token)
    }

    /// A copy of this entity carrying a fresh snapshot. The receiver is left untouched.
    pub fn with_snapshot(
        &self,
        reserves: Vec<U256>,
        extra: String,
        block_number: Option<u64>,
    ) -> Result<Self, PoolError> {
        let updated = Self {
            reserves,
            extra,
            block_number,
            timestamp: chrono::Utc::now().timestamp(),
            ..self.clone()
        };
        updated.validate()?;
        Ok(updated)
    }
}

pub(crate) fn parse_address(raw: &str) -> Result<Address, PoolError> {
    raw.parse::<Address>()
        .map_err(|e| PoolError::InvalidPool(format!("invalid address {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const POOL: &str = "0xCcCcCcCcCcCcCcCcCcCcCcCcCcCcCcCcCcCcCcCc";

    fn entity() -> PoolEntity {
        PoolEntity::new(
            POOL,
            "ether-fi",
            "etherfi-weeth",
            vec![PoolToken::new(A, 18), PoolToken::new(B, 18)],
            vec![U256::from(1u64), U256::from(2u64)],
        )
        .unwrap()
    }

    #[test]
    fn test_addresses_are_lowercased() {
        let e = entity();
        assert_eq!(e.address, POOL.to_lowercase());
        assert_eq!(e.tokens[0].address, A.to_lowercase());
        assert_eq!(e.token_index(A), Some(0));
        assert_eq!(e.token_index(B), Some(1));
        assert_eq!(e.token_index(POOL), None);
    }

    #[test]
    fn test_arity_and_length_invariants() {
        let one_token = PoolEntity::new(POOL, "x", "y", vec![PoolToken::new(A, 18)], vec![U256::zero()]);
        assert!(matches!(one_token, Err(PoolError::InvalidPool(_))));

        let mismatch = PoolEntity::new(
            POOL,
            "x",
            "y",
            vec![PoolToken::new(A, 18), PoolToken::new(B, 18)],
            vec![U256::zero()],
        );
        assert!(matches!(mismatch, Err(PoolError::InvalidPool(_))));
    }

    #[test]
    fn test_snapshot_leaves_original_untouched() {
        let original = entity();
        let updated = original
            .with_snapshot(vec![U256::from(5u64), U256::from(6u64)], "blob".into(), Some(100))
            .unwrap();
        assert_eq!(original.block_number, None);
        assert_eq!(original.reserves[0], U256::from(1u64));
        assert_eq!(updated.block_number, Some(100));
        assert_eq!(updated.extra, "blob");
        assert_eq!(updated.tokens, original.tokens);
        assert!(updated.timestamp > 0);

        assert!(original.with_snapshot(vec![U256::zero()], String::new(), None).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(entity()).unwrap();
        assert_eq!(json["type"], "etherfi-weeth");
        assert_eq!(json["reserves"][1], "2");
        assert!(json["blockNumber"].is_null());
        let back: PoolEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity());
    }
}
