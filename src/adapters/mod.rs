// Protocol adapters: one tracker + simulator pair per pool type.

pub mod balancer_v3;
pub mod sfrxeth;
pub mod simple_rate;
pub mod usd0pp;
pub mod weeth;

use crate::registry::{Registry, RegistryError};

/// Registers every built-in protocol. Fails on the first tag that is already taken.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    simple_rate::register(registry)?;
    weeth::register(registry)?;
    sfrxeth::register(registry)?;
    usd0pp::register(registry)?;
    balancer_v3::register(registry)?;
    Ok(())
}
