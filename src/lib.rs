//! # Pool Sync SDK
//!
//! Keeps an in-memory picture of on-chain liquidity pools current and answers swap questions
//! against it without touching the chain.
//!
//! ## Overview
//!
//! The SDK has two halves that meet at the [`PoolEntity`] snapshot:
//!
//! - **Tracking**: a [`PoolTracker`] batches every read a pool needs into a single Multicall3
//!   `eth_call`, so all values in one snapshot come from the same block. Reads can be pinned to a
//!   block and evaluated under state overrides.
//! - **Simulation**: a [`PoolSimulator`] is built from one snapshot and reproduces the protocol's
//!   integer math exactly, including rounding direction and revert conditions.
//!
//! ## Architecture
//!
//! ### Transport & Aggregation
//! [`transport::CallTransport`] is the only seam to the node. [`multicall::Multicall`] builds on
//! it to coalesce, encode, time-limit and decode batched reads.
//!
//! ### Snapshots
//! [`entity::PoolEntity`] carries reserves plus a tagged, versioned protocol blob
//! ([`codec`]) that only the matching simulator decodes.
//!
//! ### Protocols
//! Each module in [`adapters`] registers a tracker and a simulator under its pool type tag in a
//! [`registry::Registry`].
//!
//! ### Off-chain quotes
//! [`rfq`] talks to market makers whose prices are not derived from chain state.

// Core Types
/// Error taxonomy (transient / terminal / domain)
pub mod error;
/// Pool snapshot exchanged between trackers and simulators
pub mod entity;
/// Tagged, versioned encoding of protocol-specific snapshot fields
pub mod codec;

// Chain Access
/// `eth_call` abstraction with state overrides
pub mod transport;
/// Multicall3 batch reads
pub mod multicall;
/// ABI fragments for the contracts the trackers read
pub mod contracts;

// Tracking & Simulation
/// Pool state refresh
pub mod tracker;
/// Swap simulation interface
pub mod simulator;
/// Integer and fixed-point math
pub mod math;
/// Built-in protocols
pub mod adapters;
/// Pool type tag -> tracker/simulator constructors
pub mod registry;

// Infrastructure
/// RFQ market maker client
pub mod rfq;
/// Metrics and observability
pub mod metrics;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use entity::{PoolEntity, PoolToken};
pub use error::{ErrorClass, PoolError};
pub use multicall::Multicall;
pub use registry::{Registry, TrackerContext};
pub use settings::Settings;
pub use simulator::{PoolSimulator, SwapKind, SwapRequest, SwapResult};
pub use tracker::{PoolTracker, TrackParams};
