//! The single suspension point of the SDK: one `eth_call`, optionally against overridden state.
//!
//! [`CallTransport`] is the seam between the aggregator and the network. The SDK ships an
//! implementation for any `ethers` [`Provider`]; tests plug in an in-memory chain.

use async_trait::async_trait;
use ethers::providers::{JsonRpcClient, Provider, ProviderError, RpcError};
use ethers::types::{Address, BlockId, BlockNumber, Bytes, TransactionRequest, H256, U256, U64};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The node could not be reached or did not answer.
    #[error("call channel unavailable: {0}")]
    Unavailable(String),
    /// The node answered with a JSON-RPC error (revert, bad params, ...).
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<ProviderError> for TransportError {
    fn from(e: ProviderError) -> Self {
        if let Some(response) = e.as_error_response() {
            return TransportError::Rpc(response.message.clone());
        }
        match e {
            ProviderError::SerdeJson(err) => TransportError::MalformedResponse(err.to_string()),
            other => TransportError::Unavailable(other.to_string()),
        }
    }
}

/// Temporary replacement of one account's state for the duration of a call.
///
/// Serializes to geth's `eth_call` override object. `state` replaces the whole storage,
/// `state_diff` patches individual slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BTreeMap<H256, H256>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<BTreeMap<H256, H256>>,
}

impl AccountOverride {
    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_code(mut self, code: Bytes) -> Self {
        self.code = Some(code);
        self
    }

    /// Patches a single storage slot, leaving the rest of the account's storage intact.
    pub fn with_storage(mut self, slot: H256, value: H256) -> Self {
        self.state_diff.get_or_insert_with(BTreeMap::new).insert(slot, value);
        self
    }

    /// Storage value this override forces for `slot`, if any.
    pub fn storage_at(&self, slot: &H256) -> Option<H256> {
        self.state_diff
            .as_ref()
            .and_then(|diff| diff.get(slot).copied())
            .or_else(|| self.state.as_ref().map(|full| full.get(slot).copied().unwrap_or_default()))
    }
}

/// Account -> override, in insertion order.
pub type StateOverrides = IndexMap<Address, AccountOverride>;

/// One read-only call as handed to the transport.
#[derive(Debug, Clone)]
pub struct EthCall {
    pub to: Address,
    pub data: Bytes,
    pub block: Option<BlockId>,
    pub overrides: Option<StateOverrides>,
}

#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn eth_call(&self, call: &EthCall) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<P: JsonRpcClient> CallTransport for Provider<P> {
    async fn eth_call(&self, call: &EthCall) -> Result<Bytes, TransportError> {
        let tx = TransactionRequest::new().to(call.to).data(call.data.clone());
        let block = call.block.unwrap_or(BlockId::Number(BlockNumber::Latest));
        let result: Result<Bytes, ProviderError> = match &call.overrides {
            Some(overrides) if !overrides.is_empty() => {
                self.request("eth_call", (tx, block, overrides)).await
            }
            _ => self.request("eth_call", (tx, block)).await,
        };
        result.map_err(TransportError::from)
    }
}
