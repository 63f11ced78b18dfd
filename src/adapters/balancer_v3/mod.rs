//! Balancer V3 weighted pools.
//!
//! The Vault holds every pool's balances, so the tracker reads almost everything from the Vault
//! and only the weights from the pool. Pools that hold ERC-4626 wrappers are exposed with the
//! underlying tokens; the simulator routes through the Vault's liquidity buffer on those legs.

pub mod buffer;
mod simulator;
mod tracker;
pub mod types;
pub mod weighted_math;

pub use buffer::Erc4626Buffer;
pub use simulator::BalancerV3Simulator;
pub use tracker::BalancerV3Tracker;
pub use types::{BalancerV3Config, BalancerV3Extra, BalancerV3StaticExtra, HooksConfig};

use crate::codec;
use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::registry::{simulator_factory, tracker_factory, Registry, RegistryError};

pub const POOL_TYPE: &str = "balancer-v3-weighted";

/// An empty static extra means a plain pool on the canonical Vault.
fn static_extra(entity: &PoolEntity) -> Result<BalancerV3StaticExtra, PoolError> {
    if entity.static_extra.trim().is_empty() {
        return Ok(BalancerV3StaticExtra::default());
    }
    Ok(codec::decode(&entity.static_extra)?)
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        POOL_TYPE,
        tracker_factory(BalancerV3Tracker::from_context),
        simulator_factory(BalancerV3Simulator::new),
    )
}
