//! Binds pool type tags to tracker and simulator constructors.
//!
//! The host builds one [`Registry`] at startup with [`init`] (or registers its own protocols on
//! an empty one) and passes it to whatever needs to instantiate trackers or simulators. There is
//! no global table: a second registration for the same tag is a startup error.

use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::multicall::Multicall;
use crate::simulator::PoolSimulator;
use crate::tracker::PoolTracker;
use log::info;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Everything a tracker constructor may need.
#[derive(Debug, Clone)]
pub struct TrackerContext {
    pub multicall: Multicall,
    /// Protocol-specific settings, usually a table from `Config.toml`.
    pub config: serde_json::Value,
}

impl TrackerContext {
    pub fn new(multicall: Multicall) -> Self {
        Self {
            multicall,
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Deserializes the protocol config; a missing table yields the protocol's defaults.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T, PoolError> {
        if self.config.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.config.clone()).map_err(|e| PoolError::Config(e.to_string()))
    }
}

pub type TrackerFactory =
    Arc<dyn Fn(&TrackerContext) -> Result<Arc<dyn PoolTracker>, PoolError> + Send + Sync>;
pub type SimulatorFactory =
    Arc<dyn Fn(&PoolEntity) -> Result<Box<dyn PoolSimulator>, PoolError> + Send + Sync>;

/// Wraps a concrete tracker constructor into a [`TrackerFactory`].
pub fn tracker_factory<T, F>(build: F) -> TrackerFactory
where
    T: PoolTracker + 'static,
    F: Fn(&TrackerContext) -> Result<T, PoolError> + Send + Sync + 'static,
{
    Arc::new(move |context: &TrackerContext| {
        build(context).map(|tracker| Arc::new(tracker) as Arc<dyn PoolTracker>)
    })
}

/// Wraps a concrete simulator constructor into a [`SimulatorFactory`].
pub fn simulator_factory<S, F>(build: F) -> SimulatorFactory
where
    S: PoolSimulator + 'static,
    F: Fn(&PoolEntity) -> Result<S, PoolError> + Send + Sync + 'static,
{
    Arc::new(move |entity: &PoolEntity| {
        build(entity).map(|simulator| Box::new(simulator) as Box<dyn PoolSimulator>)
    })
}

#[derive(Clone)]
pub struct ProtocolEntry {
    pub pool_type: String,
    pub tracker: TrackerFactory,
    pub simulator: SimulatorFactory,
}

impl std::fmt::Debug for ProtocolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEntry")
            .field("pool_type", &self.pool_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("pool type {0:?} is already registered")]
    Duplicate(String),
    #[error("unknown pool type: {0}")]
    UnknownPoolType(String),
}

impl From<RegistryError> for PoolError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownPoolType(tag) => PoolError::UnknownPoolType(tag),
            duplicate => PoolError::Config(duplicate.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, ProtocolEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        pool_type: &str,
        tracker: TrackerFactory,
        simulator: SimulatorFactory,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(pool_type) {
            return Err(RegistryError::Duplicate(pool_type.to_string()));
        }
        self.entries.insert(
            pool_type.to_string(),
            ProtocolEntry {
                pool_type: pool_type.to_string(),
                tracker,
                simulator,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, pool_type: &str) -> Result<&ProtocolEntry, RegistryError> {
        self.entries
            .get(pool_type)
            .ok_or_else(|| RegistryError::UnknownPoolType(pool_type.to_string()))
    }

    /// Builds the simulator matching `entity.pool_type`.
    pub fn new_simulator(&self, entity: &PoolEntity) -> Result<Box<dyn PoolSimulator>, PoolError> {
        let entry = self.lookup(&entity.pool_type)?;
        (entry.simulator)(entity)
    }

    pub fn new_tracker(
        &self,
        pool_type: &str,
        context: &TrackerContext,
    ) -> Result<Arc<dyn PoolTracker>, PoolError> {
        let entry = self.lookup(pool_type)?;
        (entry.tracker)(context)
    }

    /// Registered tags, sorted.
    pub fn pool_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

/// Registry holding every built-in protocol.
pub fn init() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    crate::adapters::register_all(&mut registry)?;
    info!(
        "Pool registry initialized with {} protocols: {:?}",
        registry.entries.len(),
        registry.pool_types()
    );
    Ok(registry)
}
