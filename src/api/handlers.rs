// Request handlers for API endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, Instrument};

use crate::api::middleware::request_id;
use crate::api::responses::{upstream_into_response, ApiError, HealthResponse};
use crate::api::{AppState, SERVICE_NAME};
use crate::core::errors::ProxyError;
use crate::core::models::InboundRequest;
use crate::proxy::PipelineOutcome;

const RAGFLOW_ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH";

/// Health check handler
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Metrics handler
///
/// GET /metrics
///
/// Returns Prometheus metrics in text format
pub async fn metrics_handler(State(app_state): State<AppState>) -> Result<Response, ApiError> {
    let body = app_state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

/// PII guard passthrough
///
/// POST /api/pii/guard
///
/// Body is forwarded verbatim to `{PII_GUARD_URL}/guard`; the guard's JSON
/// reply is returned as-is.
pub async fn pii_guard_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request_id = request_id(&headers);
    app_state.metrics.record_request("pii_guard");

    app_state
        .gate
        .passthrough(&body)
        .await
        .map(Json)
        .map_err(|e| {
            app_state.metrics.record_upstream_error(&e);
            log_upstream_error(&e, "guard", &request_id);
            ApiError::from_proxy_error_with_id(&e, request_id.clone())
        })
}

/// RAG passthrough
///
/// GET|POST|PUT|DELETE|PATCH /api/ragflow/{path}
///
/// Request flow:
/// 1. Decide the body shape once (structured JSON or raw bytes)
/// 2. Keep only user-agent / accept from the inbound headers
/// 3. Run the proxy pipeline (safety checks for completions calls)
/// 4. Map the outcome or the upstream failure to the client response
pub async fn ragflow_proxy_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    proxy_ragflow(app_state, path, method, uri, headers, body).await
}

/// RAG passthrough with an empty trailing path
///
/// GET|POST|PUT|DELETE|PATCH /api/ragflow/ -> `{RAGFLOW_BASE_URL}/api/`
pub async fn ragflow_root_handler(
    State(app_state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    proxy_ragflow(app_state, String::new(), method, uri, headers, body).await
}

/// 405 for methods the passthrough routes do not serve
pub async fn method_not_allowed_handler() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, RAGFLOW_ALLOWED_METHODS)],
    )
        .into_response()
}

async fn proxy_ragflow(
    app_state: AppState,
    path: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request_id = request_id(&headers);
    app_state.metrics.record_request("ragflow");

    let request = InboundRequest::new(method, path, uri.query(), &headers, body);

    let span = tracing::info_span!(
        "ragflow_proxy",
        request_id = %request_id,
        method = %request.method,
        path = %request.path,
    );

    async move {
        let outcome = app_state.pipeline.handle(&request).await.map_err(|e| {
            app_state.metrics.record_upstream_error(&e);
            log_upstream_error(&e, &request.path, &request_id);
            ApiError::from_proxy_error_with_id(&e, request_id.clone())
        })?;

        match outcome {
            PipelineOutcome::Refused(envelope) => {
                info!("Completions request refused before forwarding");
                Ok(Json(envelope).into_response())
            }
            PipelineOutcome::Proxied(upstream) => {
                info!(status = upstream.status, "RAG request proxied");
                upstream_into_response(upstream).map_err(|e| {
                    log_upstream_error(&e, &request.path, &request_id);
                    ApiError::from_proxy_error_with_id(&e, request_id.clone())
                })
            }
        }
    }
    .instrument(span)
    .await
}

fn log_upstream_error(err: &ProxyError, path: &str, request_id: &str) {
    match err {
        ProxyError::UpstreamTimeout { service } => {
            error!(service = %service, path = %path, request_id = %request_id, "Upstream timeout");
        }
        ProxyError::UpstreamUnavailable { service, error } => {
            error!(service = %service, path = %path, request_id = %request_id, error = %error, "Upstream connection error");
        }
        other => {
            error!(path = %path, request_id = %request_id, error = %other, "Proxy error");
        }
    }
}
