//! Client for a market maker's firm-quote endpoint.
//!
//! Quotes from an RFQ market maker are not derived from on-chain state, so they never go through
//! a tracker. The router asks for a firm (signed) order right before building a route. Failures
//! the maker reports in the response body are business outcomes and are never retried; transport
//! failures and 5xx responses are.

use crate::metrics;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use url::Url;

// relative to the base url, which may carry a path prefix
const FIRM_ENDPOINT: &str = "kyberswap/v1/firm";
const FIRM_BATCH_ENDPOINT: &str = "kyberswap/v1/firm-batch";

const ERR_INTERNAL_TEXT: &str = "internal_error";
const ERR_BLACKLIST_TEXT: &str = "blacklist";
const ERR_INSUFFICIENT_LIQUIDITY_TEXT: &str = "insufficient_liquidity";
const ERR_MARKET_CONDITION_TEXT: &str = "market_condition";
const ERR_AMOUNT_OUT_LESS_THAN_MIN_TEXT: &str = "amount_out_less_than_min";
const ERR_MIN_GREATER_EXPECT_TEXT: &str = "min_greater_expect";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RfqError {
    #[error("firm quote failed: internal error")]
    Internal,
    #[error("firm quote failed: blacklisted")]
    Blacklist,
    #[error("firm quote failed: insufficient liquidity")]
    InsufficientLiquidity,
    #[error("firm quote failed: market condition")]
    MarketCondition,
    #[error("firm quote failed: amount out less than min")]
    AmountOutLessThanMin,
    #[error("firm quote failed: min greater than expected")]
    MinGreaterExpect,
    #[error("rfq http error: {0}")]
    Http(String),
    #[error("rfq endpoint responded with status {0}")]
    Status(u16),
    #[error("invalid rfq response: {0}")]
    Decode(String),
    #[error("invalid rfq base url: {0}")]
    InvalidUrl(String),
}

impl RfqError {
    /// Transport failures and server-side 5xx may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RfqError::Http(_) => true,
            RfqError::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

/// Maps the `error` text of a firm-quote response. Unknown texts are treated as internal errors.
pub fn parse_firm_quote_error(message: &str) -> RfqError {
    match message {
        ERR_INTERNAL_TEXT => RfqError::Internal,
        ERR_BLACKLIST_TEXT => RfqError::Blacklist,
        ERR_INSUFFICIENT_LIQUIDITY_TEXT => RfqError::InsufficientLiquidity,
        ERR_MARKET_CONDITION_TEXT => RfqError::MarketCondition,
        ERR_AMOUNT_OUT_LESS_THAN_MIN_TEXT => RfqError::AmountOutLessThanMin,
        ERR_MIN_GREATER_EXPECT_TEXT => RfqError::MinGreaterExpect,
        _ => RfqError::Internal,
    }
}

/// Amounts travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmRequest {
    pub maker_asset: String,
    pub taker_asset: String,
    pub maker_amount: String,
    pub taker_amount: String,
    pub user_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmOrder {
    pub maker_asset: String,
    pub taker_asset: String,
    pub maker: String,
    pub allowed_sender: String,
    pub making_amount: String,
    pub taking_amount: String,
    pub expiry: u64,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmResponse {
    pub order: FirmOrder,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmBatchRequest {
    pub orders: Vec<FirmRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmBatchResponse {
    pub orders: Vec<FirmOrder>,
    pub error: String,
}

trait MakerError {
    fn maker_error(&self) -> &str;
}

impl MakerError for FirmResponse {
    fn maker_error(&self) -> &str {
        &self.error
    }
}

impl MakerError for FirmBatchResponse {
    fn maker_error(&self) -> &str {
        &self.error
    }
}

#[derive(Debug, Clone)]
pub struct RfqClient {
    client: Client,
    base_url: Url,
    retry_count: usize,
}

impl RfqClient {
    pub fn new(base_url: &str, timeout: Duration, retry_count: usize) -> Result<Self, RfqError> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{}/", base_url))
        }
        .map_err(|e| RfqError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RfqError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            retry_count,
        })
    }

    /// Requests one signed order.
    pub async fn firm(&self, request: &FirmRequest) -> Result<FirmOrder, RfqError> {
        let response: FirmResponse = self.post(FIRM_ENDPOINT, request).await?;
        Ok(response.order)
    }

    /// Requests several signed orders in one round trip; one maker error fails the whole batch.
    pub async fn firm_batch(&self, requests: Vec<FirmRequest>) -> Result<Vec<FirmOrder>, RfqError> {
        let body = FirmBatchRequest { orders: requests };
        let response: FirmBatchResponse = self.post(FIRM_BATCH_ENDPOINT, &body).await?;
        Ok(response.orders)
    }

    fn endpoint(&self, path: &str) -> Result<Url, RfqError> {
        self.base_url
            .join(path)
            .map_err(|e| RfqError::InvalidUrl(e.to_string()))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, RfqError>
    where
        B: Serialize,
        R: DeserializeOwned + MakerError,
    {
        let url = self.endpoint(path)?;
        let strategy = ExponentialBackoff::from_millis(50)
            .max_delay(Duration::from_secs(1))
            .map(jitter)
            .take(self.retry_count);

        let result = RetryIf::spawn(
            strategy,
            || self.send::<B, R>(url.clone(), body),
            |e: &RfqError| {
                let retry = e.is_transient();
                if retry {
                    debug!("Retrying rfq request to {}: {}", path, e);
                }
                retry
            },
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::increment_rfq_requests("transport_error");
                return Err(e);
            }
        };
        if !response.maker_error().is_empty() {
            error!("Firm quote failed with error: {}", response.maker_error());
            metrics::increment_rfq_requests("rejected");
            return Err(parse_firm_quote_error(response.maker_error()));
        }
        metrics::increment_rfq_requests("ok");
        Ok(response)
    }

    async fn send<B, R>(&self, url: Url, body: &B) -> Result<R, RfqError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RfqError::Http(e.to_string()))?;
        let status = response.status();
        // makers report business failures with a 4xx and an error body
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            return Err(RfqError::Status(status.as_u16()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| RfqError::Http(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| RfqError::Decode(e.to_string()))
    }
}
