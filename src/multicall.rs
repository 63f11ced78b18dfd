use crate::contracts::multicall3::{MULTICALL3_ADDRESS, TRY_BLOCK_AND_AGGREGATE};
use crate::error::PoolError;
use crate::metrics;
use crate::transport::{CallTransport, EthCall, StateOverrides, TransportError};
use ethers::abi::{Function, Token};
use ethers::types::{Address, BlockId, Bytes, H256, U256};
use indexmap::IndexMap;
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Past this many unique calls some RPC providers start rejecting the payload.
const RECOMMENDED_MAX_CALLS: usize = 200;

/// A single read to be batched in a multicall.
#[derive(Debug, Clone)]
pub struct Call {
    /// Target contract address
    pub target: Address,
    /// ABI fragment used to decode the return data
    pub function: Function,
    /// Encoded function call data
    pub call_data: Bytes,
}

impl Call {
    pub fn new(target: Address, function: &Function, params: &[Token]) -> Result<Self, PoolError> {
        let call_data = function.encode_input(params)?;
        Ok(Self {
            target,
            function: function.clone(),
            call_data: Bytes::from(call_data),
        })
    }
}

/// Decoded return values of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput(Vec<Token>);

impl CallOutput {
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.0
    }

    fn at(&self, index: usize) -> Result<&Token, PoolError> {
        self.0
            .get(index)
            .ok_or_else(|| PoolError::Abi(format!("missing return value #{}", index)))
    }

    pub fn uint(&self, index: usize) -> Result<U256, PoolError> {
        self.at(index)?
            .clone()
            .into_uint()
            .ok_or_else(|| PoolError::Abi(format!("return value #{} is not a uint", index)))
    }

    pub fn bool(&self, index: usize) -> Result<bool, PoolError> {
        self.at(index)?
            .clone()
            .into_bool()
            .ok_or_else(|| PoolError::Abi(format!("return value #{} is not a bool", index)))
    }

    pub fn address(&self, index: usize) -> Result<Address, PoolError> {
        self.at(index)?
            .clone()
            .into_address()
            .ok_or_else(|| PoolError::Abi(format!("return value #{} is not an address", index)))
    }

    pub fn uint_array(&self, index: usize) -> Result<Vec<U256>, PoolError> {
        token_array(self.at(index)?, index)?
            .into_iter()
            .map(|t| {
                t.into_uint()
                    .ok_or_else(|| PoolError::Abi(format!("return value #{} is not uint[]", index)))
            })
            .collect()
    }

    pub fn address_array(&self, index: usize) -> Result<Vec<Address>, PoolError> {
        token_array(self.at(index)?, index)?
            .into_iter()
            .map(|t| {
                t.into_address().ok_or_else(|| {
                    PoolError::Abi(format!("return value #{} is not address[]", index))
                })
            })
            .collect()
    }

    /// Fields of a returned struct.
    pub fn tuple(&self, index: usize) -> Result<CallOutput, PoolError> {
        self.at(index)?
            .clone()
            .into_tuple()
            .map(CallOutput)
            .ok_or_else(|| PoolError::Abi(format!("return value #{} is not a tuple", index)))
    }

    /// Elements of a returned struct array.
    pub fn tuple_array(&self, index: usize) -> Result<Vec<CallOutput>, PoolError> {
        token_array(self.at(index)?, index)?
            .into_iter()
            .map(|t| {
                t.into_tuple().map(CallOutput).ok_or_else(|| {
                    PoolError::Abi(format!("return value #{} is not a tuple[]", index))
                })
            })
            .collect()
    }
}

fn token_array(token: &Token, index: usize) -> Result<Vec<Token>, PoolError> {
    match token.clone() {
        Token::Array(items) | Token::FixedArray(items) => Ok(items),
        _ => Err(PoolError::Abi(format!("return value #{} is not an array", index))),
    }
}

/// Result of a strict batch: one output per call, all from the same block.
#[derive(Debug, Clone)]
pub struct AggregateResponse {
    /// `None` when the node did not report a height.
    pub block_number: Option<u64>,
    pub block_hash: Option<H256>,
    pub outputs: Vec<CallOutput>,
}

impl AggregateResponse {
    pub fn output(&self, index: usize) -> Result<&CallOutput, PoolError> {
        self.outputs
            .get(index)
            .ok_or_else(|| PoolError::Abi(format!("missing output #{}", index)))
    }
}

/// Result of a tolerant batch: failed calls are `None`.
#[derive(Debug, Clone)]
pub struct TryAggregateResponse {
    pub block_number: Option<u64>,
    pub block_hash: Option<H256>,
    pub outputs: Vec<Option<CallOutput>>,
}

/// Batches read-only calls into one `tryBlockAndAggregate` request.
///
/// Every call of a request executes inside the same `eth_call`, so all outputs are consistent
/// as of one block and the response carries that single block number. Requests are never split
/// into chunks: splitting would break that guarantee.
///
/// The aggregator does not retry. A failure of the transport or of any call (in strict mode)
/// fails the whole request; retry policy belongs to the caller.
///
/// ## Example
///
/// ```rust,ignore
/// let multicall = Multicall::new(Arc::new(provider), multicall_address);
/// let mut request = multicall.new_request();
/// request
///     .add_call(Call::new(pool, &TOTAL_ASSETS, &[])?)
///     .add_call(Call::new(pool, &TOTAL_SUPPLY, &[])?);
/// let response = request.aggregate().await?;
/// ```
#[derive(Clone)]
pub struct Multicall {
    transport: Arc<dyn CallTransport>,
    multicall_address: Address,
    timeout: Duration,
}

impl std::fmt::Debug for Multicall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multicall")
            .field("multicall_address", &self.multicall_address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Multicall {
    pub fn new(transport: Arc<dyn CallTransport>, multicall_address: Address) -> Self {
        Self {
            transport,
            multicall_address,
            timeout: Duration::from_secs(10),
        }
    }

    /// Uses the canonical Multicall3 deployment.
    pub fn with_default_address(transport: Arc<dyn CallTransport>) -> Result<Self, PoolError> {
        let address = MULTICALL3_ADDRESS
            .parse()
            .map_err(|e| PoolError::Config(format!("multicall address: {}", e)))?;
        Ok(Self::new(transport, address))
    }

    /// Set custom timeout for a whole request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.multicall_address
    }

    pub fn new_request(&self) -> AggregateRequest<'_> {
        AggregateRequest {
            multicall: self,
            calls: Vec::new(),
            overrides: None,
            block: None,
        }
    }
}

/// One batch under construction.
pub struct AggregateRequest<'a> {
    multicall: &'a Multicall,
    calls: Vec<Call>,
    overrides: Option<StateOverrides>,
    block: Option<BlockId>,
}

struct RawBatch {
    block_number: Option<u64>,
    block_hash: Option<H256>,
    // (success, return data) per original call
    results: Vec<(bool, Bytes)>,
}

impl<'a> AggregateRequest<'a> {
    pub fn add_call(&mut self, call: Call) -> &mut Self {
        self.calls.push(call);
        self
    }

    /// Execute the batch as if these account overrides were applied.
    pub fn set_overrides(&mut self, overrides: StateOverrides) -> &mut Self {
        self.overrides = Some(overrides);
        self
    }

    /// Pin the batch to a block instead of `latest`.
    pub fn set_block(&mut self, block: BlockId) -> &mut Self {
        self.block = Some(block);
        self
    }

    /// Applies an optional block pin and optional overrides in one go.
    pub fn set_context(
        &mut self,
        block: Option<BlockId>,
        overrides: Option<StateOverrides>,
    ) -> &mut Self {
        if let Some(block) = block {
            self.block = Some(block);
        }
        if let Some(overrides) = overrides {
            self.overrides = Some(overrides);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Runs the batch; any failed call fails the whole request.
    pub async fn aggregate(self) -> Result<AggregateResponse, PoolError> {
        let batch = self.execute(true).await?;
        let mut outputs = Vec::with_capacity(self.calls.len());
        for (index, (call, (success, data))) in self.calls.iter().zip(batch.results).enumerate() {
            // A call to an account without code succeeds with empty return data.
            if !success || (data.is_empty() && !call.function.outputs.is_empty()) {
                metrics::increment_multicall_failures("call_failed");
                return Err(PoolError::CallFailed {
                    index,
                    target: call.target,
                });
            }
            outputs.push(CallOutput(call.function.decode_output(&data)?));
        }
        Ok(AggregateResponse {
            block_number: batch.block_number,
            block_hash: batch.block_hash,
            outputs,
        })
    }

    /// Runs the batch; failed or undecodable calls yield `None`.
    pub async fn try_aggregate(self) -> Result<TryAggregateResponse, PoolError> {
        let batch = self.execute(false).await?;
        let outputs = self
            .calls
            .iter()
            .zip(batch.results)
            .enumerate()
            .map(|(index, (call, (success, data)))| {
                if !success {
                    return None;
                }
                match call.function.decode_output(&data) {
                    Ok(tokens) => Some(CallOutput(tokens)),
                    Err(e) => {
                        debug!(
                            "Multicall output #{} ({}) undecodable: {}",
                            index, call.function.name, e
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(TryAggregateResponse {
            block_number: batch.block_number,
            block_hash: batch.block_hash,
            outputs,
        })
    }

    async fn execute(&self, require_success: bool) -> Result<RawBatch, PoolError> {
        if self.calls.is_empty() {
            return Ok(RawBatch {
                block_number: None,
                block_hash: None,
                results: Vec::new(),
            });
        }

        // Coalesce identical calls to reduce load
        let mut unique_calls = IndexMap::new();
        let mut original_indices = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let (index, _) = unique_calls.insert_full((call.target, call.call_data.clone()), ());
            original_indices.push(index);
        }
        if unique_calls.len() < self.calls.len() {
            debug!(
                "Multicall coalesced {} calls into {}",
                self.calls.len(),
                unique_calls.len()
            );
        }
        if unique_calls.len() > RECOMMENDED_MAX_CALLS {
            warn!(
                "Multicall batch of {} calls exceeds recommended maximum ({}), may be rejected by RPC",
                unique_calls.len(),
                RECOMMENDED_MAX_CALLS
            );
        }
        metrics::record_multicall_batch_size(unique_calls.len());

        let call_tokens = unique_calls
            .into_keys()
            .map(|(target, call_data)| {
                Token::Tuple(vec![Token::Address(target), Token::Bytes(call_data.to_vec())])
            })
            .collect::<Vec<_>>();
        let unique_count = call_tokens.len();
        let data = TRY_BLOCK_AND_AGGREGATE
            .encode_input(&[Token::Bool(require_success), Token::Array(call_tokens)])?;

        let request = EthCall {
            to: self.multicall.multicall_address,
            data: Bytes::from(data),
            block: self.block,
            overrides: self.overrides.clone(),
        };

        let started = Instant::now();
        let response = match tokio::time::timeout(
            self.multicall.timeout,
            self.multicall.transport.eth_call(&request),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                metrics::increment_multicall_failures("transport");
                return Err(e.into());
            }
            Err(_) => {
                metrics::increment_multicall_failures("timeout");
                return Err(PoolError::Timeout(self.multicall.timeout));
            }
        };
        metrics::record_multicall_latency(started.elapsed());

        let (block_number, block_hash, unique_results) = decode_response(&response)?;
        if unique_results.len() != unique_count {
            return Err(TransportError::MalformedResponse(format!(
                "expected {} results, got {}",
                unique_count,
                unique_results.len()
            ))
            .into());
        }

        // Reconstruct the full result set in the original order
        let results = original_indices
            .into_iter()
            .map(|index| unique_results[index].clone())
            .collect();

        Ok(RawBatch {
            block_number,
            block_hash,
            results,
        })
    }
}

type DecodedBatch = (Option<u64>, Option<H256>, Vec<(bool, Bytes)>);

fn decode_response(response: &Bytes) -> Result<DecodedBatch, PoolError> {
    let malformed = |what: &str| -> PoolError {
        TransportError::MalformedResponse(format!("tryBlockAndAggregate: {}", what)).into()
    };

    let mut tokens = TRY_BLOCK_AND_AGGREGATE
        .decode_output(response)
        .map_err(|e| malformed(&e.to_string()))?
        .into_iter();

    let block_number = tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| malformed("block number"))?;
    let block_hash = tokens
        .next()
        .and_then(Token::into_fixed_bytes)
        .filter(|bytes| bytes.len() == 32)
        .map(|bytes| H256::from_slice(&bytes))
        .ok_or_else(|| malformed("block hash"))?;
    let entries = tokens
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| malformed("return data"))?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut fields = entry
            .into_tuple()
            .ok_or_else(|| malformed("result entry"))?
            .into_iter();
        let success = fields
            .next()
            .and_then(Token::into_bool)
            .ok_or_else(|| malformed("success flag"))?;
        let data = fields
            .next()
            .and_then(Token::into_bytes)
            .ok_or_else(|| malformed("result bytes"))?;
        results.push((success, Bytes::from(data)));
    }

    Ok((
        resolve_block_number(block_number),
        Some(block_hash).filter(|h| !h.is_zero()),
        results,
    ))
}

/// Height 0 means "not reported", never genesis.
fn resolve_block_number(raw: U256) -> Option<u64> {
    if raw.is_zero() || raw > U256::from(u64::MAX) {
        None
    } else {
        Some(raw.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::erc4626::{TOTAL_ASSETS, TOTAL_SUPPLY};
    use async_trait::async_trait;
    use ethers::abi::encode;
    use std::sync::Mutex;

    /// Answers every call with its index as a uint and records what it was sent.
    struct EchoTransport {
        block: u64,
        seen: Mutex<Vec<EthCall>>,
        fail_index: Option<usize>,
    }

    #[async_trait]
    impl CallTransport for EchoTransport {
        async fn eth_call(&self, call: &EthCall) -> Result<Bytes, TransportError> {
            self.seen.lock().unwrap().push(call.clone());
            let input = TRY_BLOCK_AND_AGGREGATE
                .decode_input(&call.data[4..])
                .map_err(|e| TransportError::Rpc(e.to_string()))?;
            let calls = input[1].clone().into_array().unwrap();
            let results = (0..calls.len())
                .map(|i| {
                    let success = Some(i) != self.fail_index;
                    Token::Tuple(vec![
                        Token::Bool(success),
                        Token::Bytes(encode(&[Token::Uint(U256::from(i))])),
                    ])
                })
                .collect();
            Ok(Bytes::from(encode(&[
                Token::Uint(U256::from(self.block)),
                Token::FixedBytes(vec![0xab; 32]),
                Token::Array(results),
            ])))
        }
    }

    fn transport(block: u64, fail_index: Option<usize>) -> Arc<EchoTransport> {
        Arc::new(EchoTransport {
            block,
            seen: Mutex::new(Vec::new()),
            fail_index,
        })
    }

    fn call(target: u8, function: &Function) -> Call {
        Call::new(Address::repeat_byte(target), function, &[]).unwrap()
    }

    #[tokio::test]
    async fn test_aggregate_coalesces_and_fans_out() {
        let t = transport(42, None);
        let multicall = Multicall::new(t.clone(), Address::repeat_byte(0xca));
        let mut request = multicall.new_request();
        request
            .add_call(call(1, &TOTAL_ASSETS))
            .add_call(call(1, &TOTAL_SUPPLY))
            .add_call(call(1, &TOTAL_ASSETS));
        let response = request.aggregate().await.unwrap();

        assert_eq!(response.block_number, Some(42));
        assert_eq!(response.outputs.len(), 3);
        // the duplicate read shares the first read's result
        assert_eq!(response.outputs[0].uint(0).unwrap(), U256::zero());
        assert_eq!(response.outputs[1].uint(0).unwrap(), U256::one());
        assert_eq!(response.outputs[2].uint(0).unwrap(), U256::zero());

        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "one request must be one eth_call");
        let sent = TRY_BLOCK_AND_AGGREGATE.decode_input(&seen[0].data[4..]).unwrap();
        assert_eq!(sent[0], Token::Bool(true));
        assert_eq!(sent[1].clone().into_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_block_is_unknown() {
        let multicall = Multicall::new(transport(0, None), Address::repeat_byte(0xca));
        let mut request = multicall.new_request();
        request.add_call(call(1, &TOTAL_SUPPLY));
        assert_eq!(request.aggregate().await.unwrap().block_number, None);
    }

    #[tokio::test]
    async fn test_strict_fails_whole_batch_on_one_failure() {
        let multicall = Multicall::new(transport(7, Some(1)), Address::repeat_byte(0xca));
        let mut request = multicall.new_request();
        request
            .add_call(call(1, &TOTAL_ASSETS))
            .add_call(call(2, &TOTAL_ASSETS));
        match request.aggregate().await {
            Err(PoolError::CallFailed { index, target }) => {
                assert_eq!(index, 1);
                assert_eq!(target, Address::repeat_byte(2));
            }
            other => panic!("expected CallFailed, got {:?}", other.map(|r| r.outputs)),
        }
    }

    #[tokio::test]
    async fn test_try_aggregate_tolerates_failures() {
        let multicall = Multicall::new(transport(7, Some(0)), Address::repeat_byte(0xca));
        let mut request = multicall.new_request();
        request
            .add_call(call(1, &TOTAL_ASSETS))
            .add_call(call(2, &TOTAL_ASSETS));
        let response = request.try_aggregate().await.unwrap();
        assert!(response.outputs[0].is_none());
        assert_eq!(response.outputs[1].as_ref().unwrap().uint(0).unwrap(), U256::one());
    }

    #[tokio::test]
    async fn test_overrides_and_block_are_forwarded() {
        let t = transport(9, None);
        let multicall = Multicall::new(t.clone(), Address::repeat_byte(0xca));
        let mut overrides = StateOverrides::new();
        overrides.insert(Address::repeat_byte(1), Default::default());
        let mut request = multicall.new_request();
        request
            .add_call(call(1, &TOTAL_ASSETS))
            .set_overrides(overrides)
            .set_block(BlockId::from(9u64));
        request.aggregate().await.unwrap();

        let seen = t.seen.lock().unwrap();
        assert_eq!(seen[0].block, Some(BlockId::from(9u64)));
        assert_eq!(seen[0].overrides.as_ref().map(|o| o.len()), Some(1));
    }

    struct StalledTransport;

    #[async_trait]
    impl CallTransport for StalledTransport {
        async fn eth_call(&self, _call: &EthCall) -> Result<Bytes, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(TransportError::Unavailable("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let multicall = Multicall::new(Arc::new(StalledTransport), Address::zero())
            .with_timeout(Duration::from_millis(20));
        let mut request = multicall.new_request();
        request.add_call(call(1, &TOTAL_SUPPLY));
        assert!(matches!(
            request.aggregate().await,
            Err(PoolError::Timeout(_))
        ));
    }

    #[test]
    fn test_resolve_block_number() {
        assert_eq!(resolve_block_number(U256::zero()), None);
        assert_eq!(resolve_block_number(U256::from(18_000_000u64)), Some(18_000_000));
        assert_eq!(resolve_block_number(U256::MAX), None);
    }
}
