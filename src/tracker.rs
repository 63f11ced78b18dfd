//! Pool state tracking interface.
//!
//! A [`PoolTracker`] turns a previous [`PoolEntity`] into a fresh one by issuing one batched read
//! through the [`Multicall`](crate::multicall::Multicall) aggregator. Trackers share no mutable
//! state, so a host can refresh many pools concurrently (see [`refresh_many`]).
//!
//! ## Consistency
//!
//! Every read a tracker needs goes into a single aggregated request, so all fields of one
//! snapshot come from the same block. Two different fetches carry no ordering guarantee; pin
//! `TrackParams::block` when several pools must be read at the same height.
//!
//! ## Failure
//!
//! The input entity is borrowed immutably and a new entity is returned, so a failed or
//! cancelled fetch can never leave a half-written snapshot behind.

use crate::entity::PoolEntity;
use crate::error::PoolError;
use crate::metrics;
use crate::transport::StateOverrides;
use async_trait::async_trait;
use ethers::types::{BlockId, Log};
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::future::Future;
use std::time::Instant;
use tokio::sync::watch;

/// Caller side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

/// Fetch side of a cancellation signal. Cheap to clone; every clone observes the same handle.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

/// Creates a linked handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        // no receivers left means nothing is in flight
        let _ = self.0.send(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.0.subscribe())
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the handle cancels. Never resolves if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Races `fetch` against an optional cancellation signal.
pub async fn with_cancellation<T, F>(cancel: Option<CancelSignal>, fetch: F) -> Result<T, PoolError>
where
    F: Future<Output = Result<T, PoolError>>,
{
    let Some(mut signal) = cancel else {
        return fetch.await;
    };
    if signal.is_cancelled() {
        return Err(PoolError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(PoolError::Cancelled),
        result = fetch => result,
    }
}

/// Per-fetch inputs besides the previous entity.
#[derive(Debug, Clone, Default)]
pub struct TrackParams {
    /// Already-observed logs for the pool. Trackers that rebuild state from reads ignore them.
    pub logs: Vec<Log>,
    /// Block to read at; `latest` when unset.
    pub block: Option<BlockId>,
    pub cancel: Option<CancelSignal>,
}

impl TrackParams {
    pub fn at_block(block: BlockId) -> Self {
        Self {
            block: Some(block),
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[async_trait]
pub trait PoolTracker: Send + Sync {
    /// Type tag of the pools this tracker understands.
    fn pool_type(&self) -> &'static str;

    /// Reads the pool's current on-chain state.
    async fn get_new_pool_state(
        &self,
        pool: &PoolEntity,
        params: TrackParams,
    ) -> Result<PoolEntity, PoolError>;

    /// Reads the pool's state as if `overrides` were applied to the chain.
    async fn get_new_pool_state_with_overrides(
        &self,
        pool: &PoolEntity,
        params: TrackParams,
        overrides: StateOverrides,
    ) -> Result<PoolEntity, PoolError>;
}

/// Wraps a tracker's fetch with cancellation, logging and metrics.
pub(crate) async fn instrumented<F>(
    pool_type: &'static str,
    pool: &PoolEntity,
    cancel: Option<CancelSignal>,
    fetch: F,
) -> Result<PoolEntity, PoolError>
where
    F: Future<Output = Result<PoolEntity, PoolError>>,
{
    let started = Instant::now();
    let result = with_cancellation(cancel, fetch).await;
    match &result {
        Ok(updated) => {
            debug!(
                "Tracked {} pool {} at block {:?}",
                pool_type, pool.address, updated.block_number
            );
            metrics::record_tracker_fetch(pool_type, "ok", started.elapsed());
        }
        Err(e) => {
            warn!(
                "Failed to track {} pool {} ({:?}): {}",
                pool_type,
                pool.address,
                e.class(),
                e
            );
            metrics::record_tracker_fetch(pool_type, "error", started.elapsed());
        }
    }
    result
}

/// Refreshes many pools with at most `concurrency` fetches in flight.
///
/// Results come back in input order, one per pool; a failing pool does not affect the others.
pub async fn refresh_many(
    tracker: &dyn PoolTracker,
    pools: &[PoolEntity],
    params: TrackParams,
    concurrency: usize,
) -> Vec<Result<PoolEntity, PoolError>> {
    stream::iter(pools)
        .map(|pool| tracker.get_new_pool_state(pool, params.clone()))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_without_signal_runs_to_completion() {
        let result = with_cancellation(None, async { Ok::<_, PoolError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_short_circuits() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let result = with_cancellation(Some(signal), async { Ok::<_, PoolError>(7) }).await;
        assert!(matches!(result, Err(PoolError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_fetch() {
        let (handle, signal) = cancel_pair();
        let fetch = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, PoolError>(())
        };
        let cancel = async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };
        let (result, _) = tokio::join!(with_cancellation(Some(signal), fetch), cancel);
        assert!(matches!(result, Err(PoolError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, signal) = cancel_pair();
        drop(handle);
        let result = with_cancellation(Some(signal), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, PoolError>("done")
        })
        .await;
        assert_eq!(result.unwrap(), "done");
    }
}
