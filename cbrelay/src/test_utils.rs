//! Test utilities shared by handler tests.

use crate::config::Config;
use crate::store::{InMemoryResultStore, ResultStore, StoreError};
use crate::types::{CorrelationId, ResultEntry};
use crate::{AppState, build_router};
use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::Arc;

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_metrics: false,
        ..Default::default()
    }
}

pub fn create_test_state(config: Config) -> AppState {
    let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new(config.store.ttl));
    AppState::builder().config(config).store(store).build()
}

pub fn create_test_server(state: &AppState) -> TestServer {
    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Store whose backend is unreachable; every call fails.
pub struct UnavailableStore;

impl UnavailableStore {
    fn error() -> StoreError {
        StoreError::Unavailable {
            reason: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl ResultStore for UnavailableStore {
    async fn put(&self, _id: CorrelationId, _entry: ResultEntry) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn get(&self, _id: &CorrelationId) -> Result<Option<ResultEntry>, StoreError> {
        Err(Self::error())
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        Err(Self::error())
    }

    async fn entry_count(&self) -> Result<usize, StoreError> {
        Err(Self::error())
    }
}

pub fn create_unavailable_store_state(config: Config) -> AppState {
    AppState::builder().config(config).store(Arc::new(UnavailableStore)).build()
}
