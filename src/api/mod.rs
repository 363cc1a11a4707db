// Axum web server layer

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub mod handlers;
pub mod middleware;
pub mod responses;

use crate::core::errors::ProxyError;
use crate::core::models::{InboundRequest, SafetyVerdict, UpstreamResponse};
use crate::metrics::Metrics;
use crate::proxy::ProxyPipeline;

// Re-export Config from config module
pub use crate::config::Config;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "JUNI Proxy Server";

/// Application state containing all shared dependencies
///
/// All components are wrapped in Arc for shared ownership across async tasks.
/// Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<dyn SafetyGate + Send + Sync>,
    pub pipeline: Arc<ProxyPipeline>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the pipeline from its two upstream seams
    pub fn new(
        config: Arc<Config>,
        gate: Arc<dyn SafetyGate + Send + Sync>,
        rag: Arc<dyn RagUpstream + Send + Sync>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let pipeline = Arc::new(ProxyPipeline::new(gate.clone(), rag, metrics.clone()));
        Self {
            config,
            gate,
            pipeline,
            metrics,
        }
    }
}

/// Trait for the Safety Gate (PII guard service)
#[async_trait::async_trait]
pub trait SafetyGate: Send + Sync {
    /// Classify `text`. Never fails; service failures degrade the verdict.
    async fn check(&self, text: &str) -> SafetyVerdict;

    /// Forward an arbitrary JSON body to the guard endpoint verbatim
    async fn passthrough(&self, body: &serde_json::Value) -> Result<serde_json::Value, ProxyError>;
}

/// Trait for the RAG backend
#[async_trait::async_trait]
pub trait RagUpstream: Send + Sync {
    async fn forward(&self, request: &InboundRequest) -> Result<UpstreamResponse, ProxyError>;
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - CORS (tower-http::cors) - configured origin allow-list
/// - Tracing (tower-http::trace) - one span per request
/// - Body size limit (tower-http::limit) - configurable, 413 above it
///
/// Axum's own default body limit is disabled so the configured limit is the only one.
pub fn create_router(app_state: AppState) -> Result<Router, ProxyError> {
    let cors = middleware::cors_layer(&app_state.config.cors_allowed_origins)?;
    let body_limit = app_state.config.body_size_limit_bytes;

    // Explicit HEAD so it does not fall back to the GET handler
    let ragflow = get(handlers::ragflow_proxy_handler)
        .post(handlers::ragflow_proxy_handler)
        .put(handlers::ragflow_proxy_handler)
        .delete(handlers::ragflow_proxy_handler)
        .patch(handlers::ragflow_proxy_handler)
        .head(handlers::method_not_allowed_handler);

    let ragflow_root = get(handlers::ragflow_root_handler)
        .post(handlers::ragflow_root_handler)
        .put(handlers::ragflow_root_handler)
        .delete(handlers::ragflow_root_handler)
        .patch(handlers::ragflow_root_handler)
        .head(handlers::method_not_allowed_handler);

    let router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/pii/guard", post(handlers::pii_guard_handler))
        .route("/api/ragflow/", ragflow_root)
        .route("/api/ragflow/*path", ragflow)
        .with_state(app_state)
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::body_size_limit_layer(body_limit))
        .layer(middleware::tracing_layer())
        .layer(cors);

    Ok(router)
}
