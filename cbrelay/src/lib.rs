//! # cbrelay: callback relay for asynchronous estimate results
//!
//! An external workflow engine computes a cost estimate asynchronously and posts the result to
//! this service. The client that requested the computation polls for it using the correlation
//! id (`callbackId`) it generated up front.
//!
//! ```text
//! producer ──POST /callback──▶ receiver ──put──▶ store ◀──get── poller ◀──GET /result── consumer
//! ```
//!
//! ## Components
//!
//! The **result store** ([`store`]) is the core: a key/value cache with per-entry expiry. Writes
//! are last-write-wins and restart the expiry clock; expired entries are evicted lazily on
//! read and proactively by a background sweeper.
//!
//! The **callback receiver** ([`api::handlers::callbacks`]) normalises the upstream payload,
//! whose estimate field arrives under several names, validates it and writes it to the store.
//!
//! The **poller** ([`api::handlers::results`]) reports `pending` or `completed` for an id.
//! Absence is a normal transient state and is never an error.
//!
//! This is not a durable queue: a result is available for the configured TTL after it is
//! written and then disappears. Delivery retries belong to the producer, and pollers retry by
//! polling again.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use cbrelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = cbrelay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     cbrelay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
mod notifications;
mod openapi;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api::handlers;
use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::store::{InMemoryResultStore, ResultStore};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ResultStore>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard))
    {
        AllowOrigin::any()
    } else {
        let mut origins: Vec<HeaderValue> = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path, but Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_TYPE]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - Relay routes (`/callback`, `/result`, `/status/{callbackId}`)
/// - Health check, OpenAPI document and docs UI
/// - Optional Prometheus metrics
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let relay_routes = Router::new()
        .route(
            "/callback",
            post(handlers::callbacks::receive_callback).options(handlers::preflight),
        )
        .route(
            "/result",
            get(handlers::results::poll_result).options(handlers::preflight),
        )
        .route(
            "/status/{callback_id}",
            get(handlers::results::poll_status).options(handlers::preflight),
        )
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .merge(relay_routes);

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks running alongside the HTTP server.
///
/// Today that is the result store sweeper. Dropping the struct cancels the shutdown token,
/// which stops every task.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    _drop_guard: tokio_util::sync::DropGuard,
}

impl BackgroundServices {
    fn start(store: Arc<dyn ResultStore>, config: &Config) -> Self {
        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let drop_guard = shutdown_token.clone().drop_guard();

        let sweeper = store::spawn_sweeper(store, config.store.sweep_interval, shutdown_token.clone());

        Self {
            background_tasks: vec![sweeper],
            shutdown_token,
            _drop_guard: drop_guard,
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] creates the result store and starts the sweeper
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, stops background tasks and flushes
///    telemetry
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting callback relay with configuration: {:#?}", config);

        let store = Arc::new(InMemoryResultStore::new(config.store.ttl));
        info!(
            "Result store ready (ttl: {:?}, sweep interval: {:?})",
            store.ttl(),
            config.store.sweep_interval
        );
        let store: Arc<dyn ResultStore> = store;

        let bg_services = BackgroundServices::start(store.clone(), &config);

        let app_state = AppState::builder().config(config.clone()).store(store).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Callback relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stopping background services...");
        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_server, create_test_state};
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_application_integration() {
        let app = Application::new(create_test_config()).await.expect("Failed to create application");
        let (server, bg_services) = app.into_test_server();

        server.get("/healthz").await.assert_text("OK");

        server
            .post("/callback")
            .json(&json!({ "callbackId": "integration", "totalCost": "$1,250" }))
            .await
            .assert_status_ok();

        let body: Value = server.get("/result").add_query_param("callbackId", "integration").await.json();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"]["totalEstimate"], 1250.0);

        bg_services.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_background_services_stops_sweeper() {
        let config = create_test_config();
        let state = create_test_state(config.clone());

        let services = BackgroundServices::start(state.store.clone(), &config);
        let token = services.shutdown_token.clone();
        assert!(!token.is_cancelled());

        drop(services);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_openapi_json_endpoint() {
        let server = create_test_server(&create_test_state(create_test_config()));

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/callback"]["post"].is_object());
    }

    #[tokio::test]
    async fn test_cors_with_explicit_origins() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url("https://app.example.com".parse().unwrap())];
        let server = create_test_server(&create_test_state(config));

        let response = server
            .get("/result")
            .add_query_param("callbackId", "x")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "https://app.example.com"
        );

        let response = server
            .get("/result")
            .add_query_param("callbackId", "x")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example.com"))
            .await;
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_build_router_with_metrics_enabled() {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let server = create_test_server(&create_test_state(config));

        server
            .post("/callback")
            .json(&json!({ "callbackId": "metered", "totalEstimate": 1 }))
            .await
            .assert_status_ok();

        let response = server.get("/internal/metrics").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_metrics_route_absent_when_disabled() {
        let server = create_test_server(&create_test_state(create_test_config()));
        server.get("/internal/metrics").await.assert_status(StatusCode::NOT_FOUND);
    }
}
