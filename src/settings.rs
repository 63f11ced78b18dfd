use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::contracts::multicall3::MULTICALL3_ADDRESS;
use crate::error::PoolError;
use crate::multicall::Multicall;
use crate::registry::TrackerContext;
use crate::rfq::{RfqClient, RfqError};
use crate::transport::CallTransport;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
    /// Upper bound on one batched read, in seconds.
    #[serde(default = "default_rpc_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}
fn default_multicall_address() -> String {
    MULTICALL3_ADDRESS.to_string()
}
fn default_rpc_timeout_seconds() -> u64 {
    10
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            multicall_address: default_multicall_address(),
            timeout_seconds: default_rpc_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rfq {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_rfq_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_rfq_retry_count")]
    pub retry_count: usize,
}

fn default_rfq_timeout_ms() -> u64 {
    2_000
}
fn default_rfq_retry_count() -> usize {
    2
}

impl Default for Rfq {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_rfq_timeout_ms(),
            retry_count: default_rfq_retry_count(),
        }
    }
}

/// Process-wide settings. Every section is optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub rpc: Rpc,
    /// Per pool type tables, handed verbatim to that protocol's tracker.
    #[serde(default)]
    pub protocols: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub rfq: Rfq,
}

impl Settings {
    /// Loads `Config.toml` from the working directory (if present) and `POOL_SYNC__*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    /// Loads `path` (if present), then applies `.env` and `POOL_SYNC__SECTION__KEY` overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let path = path.as_ref().to_string_lossy().into_owned();
        let s = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("POOL_SYNC").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Builds the aggregator for `transport` with the configured address and timeout.
    pub fn multicall(&self, transport: Arc<dyn CallTransport>) -> Result<Multicall, PoolError> {
        let address = self.rpc.multicall_address.parse().map_err(|e| {
            PoolError::Config(format!(
                "invalid multicall address {:?}: {}",
                self.rpc.multicall_address, e
            ))
        })?;
        Ok(Multicall::new(transport, address)
            .with_timeout(Duration::from_secs(self.rpc.timeout_seconds)))
    }

    /// Context for the tracker of `pool_type`, carrying its `[protocols.<pool_type>]` table.
    pub fn tracker_context(&self, pool_type: &str, multicall: Multicall) -> TrackerContext {
        let context = TrackerContext::new(multicall);
        match self.protocols.get(pool_type) {
            Some(config) => context.with_config(config.clone()),
            None => context,
        }
    }

    /// The RFQ client, when a maker endpoint is configured.
    pub fn rfq_client(&self) -> Option<Result<RfqClient, RfqError>> {
        self.rfq.base_url.as_deref().map(|base_url| {
            RfqClient::new(
                base_url,
                Duration::from_millis(self.rfq.timeout_ms),
                self.rfq.retry_count,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.rpc.timeout_seconds, 10);
        assert_eq!(settings.rpc.multicall_address, MULTICALL3_ADDRESS);
        assert!(settings.protocols.is_empty());
        assert!(settings.rfq_client().is_none());
    }

    #[test]
    fn test_file_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[rpc]
url = "https://rpc.example"
timeout_seconds = 3

[protocols.generic-simple-rate]
rate_method = "convertToAssets"
is_bidirectional = true

[rfq]
base_url = "https://maker.example"
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.rpc.url, "https://rpc.example");
        assert_eq!(settings.rpc.timeout_seconds, 3);
        assert_eq!(settings.rfq.timeout_ms, 2_000);
        let simple_rate = &settings.protocols["generic-simple-rate"];
        assert_eq!(simple_rate["rate_method"], "convertToAssets");
        assert_eq!(simple_rate["is_bidirectional"], true);
        assert!(matches!(settings.rfq_client(), Some(Ok(_))));
    }
}
