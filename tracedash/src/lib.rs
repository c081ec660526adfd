//! # tracedash
//!
//! Dashboard analytics service over a remote LLM trace store.
//!
//! tracedash fetches run traces from an upstream trace store, aggregates them
//! into usage, engagement, model, and query metrics in a single pass, and
//! serves the result as a JSON dashboard API.
//!
//! ## Architecture
//!
//! - [`tracestore`]: the upstream client boundary ([`tracestore::TraceStore`]
//!   trait plus the HTTP implementation)
//! - [`fetch`]: page cache, per-page retry, and bounded-parallel pagination
//! - [`metrics`]: the single-pass aggregation over fetched records
//! - [`api`]: HTTP handlers and response assembly
//!
//! ## Quick start
//!
//! ```no_run
//! use tracedash::{Application, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.trace_store.project = "my-project".to_string();
//!
//! Application::new(config)?
//!     .serve(async { tokio::signal::ctrl_c().await.ok(); })
//!     .await
//! # }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod metrics;
pub mod openapi;
pub mod telemetry;
pub mod tracestore;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{Json, Router, http::HeaderValue, routing::get};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use config::CorsOrigin;
use fetch::{PageCache, PageFetcher};
use openapi::ApiDoc;
use tracestore::{HttpTraceStore, TraceStore};

/// Shared state available to all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub fetcher: PageFetcher,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/api/dashboard/overview",
            get(api::handlers::dashboard::get_overview),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The configured application, ready to serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Build the application against the HTTP trace store from the config.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(HttpTraceStore::new(&config.trace_store)?);
        Self::with_store(config, store)
    }

    /// Build the application against an explicit trace store. Used by tests
    /// to substitute an in-memory store.
    pub fn with_store(config: Config, store: Arc<dyn TraceStore>) -> anyhow::Result<Self> {
        let cache = PageCache::new(config.cache.capacity, config.cache.ttl);
        let fetcher = PageFetcher::new(store, cache, &config);
        let state = AppState::builder()
            .config(config.clone())
            .fetcher(fetcher)
            .build();
        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service())
            .expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Listening on {bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedStore, test_config};

    #[test_log::test(tokio::test)]
    async fn healthz_responds_ok() {
        let store = Arc::new(ScriptedStore::with_pages(vec![]));
        let server = Application::with_store(test_config(), store)
            .unwrap()
            .into_test_server();

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[test_log::test(tokio::test)]
    async fn openapi_document_is_served() {
        let store = Arc::new(ScriptedStore::with_pages(vec![]));
        let server = Application::with_store(test_config(), store)
            .unwrap()
            .into_test_server();

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/api/dashboard/overview"].is_object());
    }

    #[test]
    fn wildcard_origin_with_credentials_is_rejected_up_front() {
        // tower-http panics on this combination at request time, so config
        // validation refuses it before a router is ever built.
        let mut config = test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        assert!(config.validate().is_err());
    }
}
