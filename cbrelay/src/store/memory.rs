//! In-process [`ResultStore`] backed by a sharded concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::{ResultStore, StoreError};
use crate::types::{CorrelationId, ResultEntry};

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: ResultEntry,
    stored_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) > ttl
    }
}

/// Result store held in process memory.
///
/// Ages are measured on the monotonic tokio clock, so wall-clock jumps never expire or
/// resurrect entries.
#[derive(Debug)]
pub struct InMemoryResultStore {
    entries: DashMap<CorrelationId, StoredEntry>,
    ttl: Duration,
}

impl InMemoryResultStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remove `id` if it had expired as of `now`.
    ///
    /// Expiry is re-checked under the shard write lock, so an entry written after `now` is kept
    /// even when `now` was taken from an earlier, stale read.
    fn evict_if_expired(&self, id: &CorrelationId, now: Instant) -> bool {
        let ttl = self.ttl;
        self.entries.remove_if(id, |_, stored| stored.is_expired(now, ttl)).is_some()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    #[instrument(skip_all, fields(callback_id = %id))]
    async fn put(&self, id: CorrelationId, entry: ResultEntry) -> Result<(), StoreError> {
        let replaced = self
            .entries
            .insert(
                id,
                StoredEntry {
                    entry,
                    stored_at: Instant::now(),
                },
            )
            .is_some();

        if replaced {
            debug!("Replaced existing result");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(callback_id = %id))]
    async fn get(&self, id: &CorrelationId) -> Result<Option<ResultEntry>, StoreError> {
        let now = Instant::now();

        // The shard guard must be released before eviction below
        let live = match self.entries.get(id) {
            None => return Ok(None),
            Some(stored) if !stored.is_expired(now, self.ttl) => Some(stored.entry.clone()),
            Some(_) => None,
        };

        if live.is_none() && self.evict_if_expired(id, now) {
            debug!("Evicted expired result on read");
        }

        Ok(live)
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut removed = 0;

        self.entries.retain(|_, stored| {
            let keep = !stored.is_expired(now, ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }

    async fn entry_count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultStatus;
    use std::sync::Arc;

    fn id(raw: &str) -> CorrelationId {
        CorrelationId::parse(raw).unwrap()
    }

    fn success(estimate: f64) -> ResultEntry {
        ResultEntry::new(ResultStatus::Success, Some(estimate), None).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_returns_entry_unchanged() {
        let store = InMemoryResultStore::new(Duration::from_secs(300));
        let entry = ResultEntry::new(ResultStatus::Success, Some(1500.0), Some("done".to_string())).unwrap();

        store.put(id("abc"), entry.clone()).await.unwrap();

        assert_eq!(store.get(&id("abc")).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_absent() {
        let store = InMemoryResultStore::new(Duration::from_secs(300));
        assert_eq!(store.get(&id("never-written")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_is_absent_and_evicts() {
        let store = InMemoryResultStore::new(Duration::from_secs(300));
        store.put(id("abc"), success(1500.0)).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get(&id("abc")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get(&id("abc")).await.unwrap(), None);
        assert_eq!(store.entry_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_keeps_entry_rewritten_after_stale_read() {
        let store = InMemoryResultStore::new(Duration::from_secs(30));
        store.put(id("abc"), success(1.0)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        // A reader saw the expired entry, then a new callback landed before it could evict
        let seen_at = Instant::now();
        tokio::time::advance(Duration::from_millis(1)).await;
        store.put(id("abc"), success(2.0)).await.unwrap();

        assert!(!store.evict_if_expired(&id("abc"), seen_at));
        let entry = store.get(&id("abc")).await.unwrap().unwrap();
        assert_eq!(entry.total_estimate, Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_expired_entry() {
        let store = InMemoryResultStore::new(Duration::from_secs(30));
        store.put(id("abc"), success(1.0)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(store.evict_if_expired(&id("abc"), Instant::now()));
        assert_eq!(store.entry_count().await.unwrap(), 0);
        assert!(!store.evict_if_expired(&id("unknown"), Instant::now()));
    }

    #[tokio::test]
    async fn test_second_put_wins() {
        let store = InMemoryResultStore::new(Duration::from_secs(300));
        store.put(id("abc"), success(100.0)).await.unwrap();
        store.put(id("abc"), success(200.0)).await.unwrap();

        let entry = store.get(&id("abc")).await.unwrap().unwrap();
        assert_eq!(entry.total_estimate, Some(200.0));
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let store = InMemoryResultStore::new(Duration::from_secs(300));
        store.put(id("abc"), success(100.0)).await.unwrap();

        tokio::time::advance(Duration::from_secs(200)).await;
        store.put(id("abc"), success(200.0)).await.unwrap();

        // 400s after the first write, 200s after the second
        tokio::time::advance(Duration::from_secs(200)).await;
        let entry = store.get(&id("abc")).await.unwrap().unwrap();
        assert_eq!(entry.total_estimate, Some(200.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryResultStore::new(Duration::from_secs(60));
        store.put(id("old"), success(1.0)).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        store.put(id("new"), success(2.0)).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.sweep().await.unwrap(), 1);
        assert_eq!(store.entry_count().await.unwrap(), 1);
        assert!(store.get(&id("new")).await.unwrap().is_some());
        assert!(store.get(&id("old")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_and_readers() {
        let store = Arc::new(InMemoryResultStore::new(Duration::from_secs(300)));
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = id(&format!("job-{}", i % 8));
                store.put(key.clone(), success(i as f64)).await.unwrap();
                assert!(store.get(&key).await.unwrap().is_some());
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.entry_count().await.unwrap(), 8);
    }
}
