//! Time-bounded result store.
//!
//! The store maps a [`CorrelationId`] to the latest [`ResultEntry`] posted for it. Entries
//! live for a fixed TTL counted from their most recent write:
//!
//! - `put` is an unconditional upsert (last write wins) and restarts the expiry clock.
//! - `get` hides expired entries and evicts them on the way out (lazy eviction).
//! - `sweep` proactively drops everything past its TTL, so memory stays bounded even when
//!   nobody polls. [`spawn_sweeper`] runs it on a fixed interval.
//!
//! [`ResultStore`] is the seam for alternative backends. Process memory is not shared across
//! replicas, so a multi-instance deployment needs a backend over an external cache service.
//! Only [`InMemoryResultStore`] ships today.

mod memory;

pub use memory::InMemoryResultStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::types::{CorrelationId, ResultEntry};

/// Default lifetime of a stored result
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default period between proactive sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(ThisError, Debug)]
pub enum StoreError {
    /// The backing cache could not be reached
    #[error("Result store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Key/value store of callback results with per-entry expiry.
///
/// Each call is atomic for its key. No ordering is promised between a write and a
/// concurrent read of the same key beyond that.
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    /// Insert or replace the entry for `id`, restarting its expiry clock.
    async fn put(&self, id: CorrelationId, entry: ResultEntry) -> Result<(), StoreError>;

    /// Fetch the live entry for `id`. Expired entries are removed and reported as absent.
    async fn get(&self, id: &CorrelationId) -> Result<Option<ResultEntry>, StoreError>;

    /// Remove every expired entry, returning how many were dropped.
    async fn sweep(&self) -> Result<usize, StoreError>;

    /// Number of entries currently held, including expired ones not yet swept.
    async fn entry_count(&self) -> Result<usize, StoreError>;
}

/// Run [`ResultStore::sweep`] every `interval` until `shutdown` is cancelled.
pub fn spawn_sweeper(store: Arc<dyn ResultStore>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can have expired yet
        ticker.tick().await;

        info!("Result store sweeper started (interval: {:?})", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Result store sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match store.sweep().await {
                        Ok(0) => {}
                        Ok(removed) => debug!("Swept {} expired results", removed),
                        Err(e) => error!("Result store sweep failed: {}", e),
                    }

                    if let Ok(count) = store.entry_count().await {
                        metrics::gauge!("cbrelay_store_entries").set(count as f64);
                    }
                }
            }
        }
    })
}
