//! In-memory chain for integration tests.
//!
//! Decodes Multicall3 `tryBlockAndAggregate` calldata and answers each inner call from a table
//! keyed by (target, selector). Storage-backed getters honour `eth_call` state overrides.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{encode, Function, Token};
use ethers::types::{Address, Bytes, H256, U256};
use pool_sync_sdk::contracts::multicall3::TRY_BLOCK_AND_AGGREGATE;
use pool_sync_sdk::transport::{CallTransport, EthCall, TransportError};
use pool_sync_sdk::Multicall;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MULTICALL: Address = Address::repeat_byte(0xca);

enum Answer {
    /// Fixed return values.
    Returns(Vec<Token>),
    /// A `uint256` getter backed by one storage slot of the target.
    Slot(H256),
    Reverts,
}

pub struct MockChain {
    block: u64,
    answers: HashMap<(Address, [u8; 4]), Answer>,
    storage: HashMap<(Address, H256), U256>,
    delays: HashMap<Address, Duration>,
    calls: Mutex<Vec<EthCall>>,
}

impl MockChain {
    pub fn at_block(block: u64) -> Self {
        Self {
            block,
            answers: HashMap::new(),
            storage: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returns(mut self, target: Address, function: &Function, tokens: Vec<Token>) -> Self {
        self.answers
            .insert((target, function.short_signature()), Answer::Returns(tokens));
        self
    }

    pub fn reverts(mut self, target: Address, function: &Function) -> Self {
        self.answers
            .insert((target, function.short_signature()), Answer::Reverts);
        self
    }

    /// `function` on `target` returns the value stored at `slot`.
    pub fn slot_getter(
        mut self,
        target: Address,
        function: &Function,
        slot: H256,
        value: U256,
    ) -> Self {
        self.answers
            .insert((target, function.short_signature()), Answer::Slot(slot));
        self.storage.insert((target, slot), value);
        self
    }

    /// Any batch touching `target` is answered only after `delay`.
    pub fn delayed(mut self, target: Address, delay: Duration) -> Self {
        self.delays.insert(target, delay);
        self
    }

    pub fn multicall(self: &Arc<Self>) -> Multicall {
        Multicall::new(self.clone(), MULTICALL)
    }

    pub fn eth_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> EthCall {
        self.calls.lock().unwrap().last().cloned().expect("no eth_call seen")
    }

    fn answer(&self, call: &EthCall, target: Address, data: &[u8]) -> (bool, Vec<u8>) {
        let mut selector = [0u8; 4];
        if data.len() < 4 {
            return (false, Vec::new());
        }
        selector.copy_from_slice(&data[..4]);
        match self.answers.get(&(target, selector)) {
            Some(Answer::Returns(tokens)) => (true, encode(tokens)),
            Some(Answer::Slot(slot)) => {
                let overridden = call
                    .overrides
                    .as_ref()
                    .and_then(|overrides| overrides.get(&target))
                    .and_then(|account| account.storage_at(slot))
                    .map(|value| U256::from_big_endian(value.as_bytes()));
                let value = overridden
                    .or_else(|| self.storage.get(&(target, *slot)).copied())
                    .unwrap_or_default();
                (true, encode(&[Token::Uint(value)]))
            }
            Some(Answer::Reverts) | None => (false, Vec::new()),
        }
    }
}

#[async_trait]
impl CallTransport for MockChain {
    async fn eth_call(&self, call: &EthCall) -> Result<Bytes, TransportError> {
        self.calls.lock().unwrap().push(call.clone());
        if call.to != MULTICALL {
            return Err(TransportError::Rpc(format!("no contract at {:?}", call.to)));
        }
        let input = TRY_BLOCK_AND_AGGREGATE
            .decode_input(&call.data[4..])
            .map_err(|e| TransportError::Rpc(e.to_string()))?;
        let inner = input[1].clone().into_array().unwrap_or_default();

        let mut delay = Duration::ZERO;
        let mut results = Vec::with_capacity(inner.len());
        for entry in inner {
            let fields = entry.into_tuple().unwrap_or_default();
            let target = fields[0].clone().into_address().unwrap_or_default();
            let data = fields[1].clone().into_bytes().unwrap_or_default();
            if let Some(d) = self.delays.get(&target) {
                delay = delay.max(*d);
            }
            let (success, output) = self.answer(call, target, &data);
            results.push(Token::Tuple(vec![Token::Bool(success), Token::Bytes(output)]));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(Bytes::from(encode(&[
            Token::Uint(U256::from(self.block)),
            Token::FixedBytes(H256::from_low_u64_be(self.block).as_bytes().to_vec()),
            Token::Array(results),
        ])))
    }
}

pub fn slot(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub fn address(entity_address: &str) -> Address {
    entity_address.parse().expect("valid address")
}
