//! # Pool Sync CLI
//!
//! Refreshes a pool snapshot against a node and optionally quotes a swap on it.
//!
//! ## Usage
//!
//! ```bash
//! # print the refreshed snapshot
//! cargo run --bin pool_sync -- track --pool pool.json
//!
//! # refresh at a fixed height, then quote 1 token-in (raw units)
//! cargo run --bin pool_sync -- quote --pool pool.json --block 21000000 \
//!     --token-in 0x... --token-out 0x... --amount 1000000000000000000
//! ```
//!
//! Settings come from `Config.toml` and `POOL_SYNC__*` variables. Ctrl+C cancels an in-flight
//! refresh.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ethers::prelude::{Address, BlockId, BlockNumber, Http, Provider, U256};
use log::{info, warn};
use pool_sync_sdk::{
    math, metrics, registry,
    settings::Settings,
    tracker::{cancel_pair, TrackParams},
    transport::CallTransport,
    PoolEntity, SwapRequest,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pool_sync", about = "Refresh pool snapshots and simulate swaps")]
struct Cli {
    /// Settings file; missing is fine
    #[arg(long, default_value = "Config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch fresh state for a pool and print the new snapshot as JSON.
    Track {
        /// JSON file holding the pool entity
        #[arg(long)]
        pool: PathBuf,
        #[arg(long)]
        block: Option<u64>,
    },
    /// Fetch fresh state, then simulate an exact-input swap on it.
    Quote {
        #[arg(long)]
        pool: PathBuf,
        #[arg(long)]
        block: Option<u64>,
        #[arg(long)]
        token_in: String,
        #[arg(long)]
        token_out: String,
        /// Raw input amount in the token's smallest unit
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = Settings::from_file(&cli.config).context("loading settings")?;

    #[cfg(feature = "observability")]
    {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .context("installing prometheus exporter")?;
    }
    metrics::describe_metrics();

    let provider = Provider::<Http>::try_from(settings.rpc.url.as_str())
        .with_context(|| format!("invalid rpc url {}", settings.rpc.url))?;
    let transport: Arc<dyn CallTransport> = Arc::new(provider);
    let multicall = settings.multicall(transport)?;
    let registry = registry::init()?;

    match cli.command {
        Command::Track { pool, block } => {
            let entity = load_entity(&pool)?;
            let updated = track(&registry, &settings, multicall, &entity, block).await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Command::Quote {
            pool,
            block,
            token_in,
            token_out,
            amount,
        } => {
            let entity = load_entity(&pool)?;
            let token_in = parse_token(&token_in)?;
            let token_out = parse_token(&token_out)?;
            let amount = U256::from_dec_str(&amount)
                .map_err(|e| anyhow!("invalid amount {:?}: {}", amount, e))?;
            let updated = track(&registry, &settings, multicall, &entity, block).await?;

            let simulator = registry.new_simulator(&updated)?;
            let result =
                simulator.calc_amount_out(&SwapRequest::exact_in(token_in, token_out, amount))?;

            let decimals_of = |token: Address| {
                simulator
                    .token_index(token)
                    .map(|i| simulator.info().decimals[i])
                    .unwrap_or(18)
            };
            println!(
                "amount_out: {} ({})",
                math::to_decimal(result.amount.amount, decimals_of(result.amount.token))?,
                result.amount.amount
            );
            println!(
                "fee:        {} ({:?})",
                math::to_decimal(result.fee.amount, decimals_of(result.fee.token))?,
                result.fee.token
            );
            println!("gas:        {}", result.gas);
        }
    }
    Ok(())
}

fn parse_token(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| anyhow!("invalid token address {:?}: {:?}", raw, e))
}

fn load_entity(path: &Path) -> Result<PoolEntity> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entity: PoolEntity =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    entity.validate()?;
    Ok(entity)
}

async fn track(
    registry: &registry::Registry,
    settings: &Settings,
    multicall: pool_sync_sdk::Multicall,
    entity: &PoolEntity,
    block: Option<u64>,
) -> Result<PoolEntity> {
    let context = settings.tracker_context(&entity.pool_type, multicall);
    let tracker = registry.new_tracker(&entity.pool_type, &context)?;

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, cancelling refresh");
            handle.cancel();
        }
    });

    let params = match block {
        Some(number) => TrackParams::at_block(BlockId::Number(BlockNumber::Number(number.into()))),
        None => TrackParams::default(),
    }
    .with_cancel(signal);

    info!("Tracking {} pool {}", entity.pool_type, entity.address);
    Ok(tracker.get_new_pool_state(entity, params).await?)
}
