// Response types for API endpoints

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::errors::{ProxyError, Upstream};
use crate::core::models::{UpstreamBody, UpstreamResponse};

/// Error response structure
///
/// `detail` is the field clients of this proxy already read error text from.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// API error type that converts domain errors to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: String) -> Self {
        Self {
            status,
            message,
            request_id: None,
        }
    }

    /// Create from ProxyError
    pub fn from_proxy_error(err: &ProxyError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            message: err.user_message(),
            request_id: None,
        }
    }

    /// Create from ProxyError with request ID
    pub fn from_proxy_error_with_id(err: &ProxyError, request_id: String) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::from_proxy_error(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            detail: self.message,
            request_id: self.request_id,
        });
        (self.status, body).into_response()
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        ApiError::from_proxy_error(&err)
    }
}

/// Turn a RAG backend reply into the client response
///
/// Status is kept; `content-type` is the only upstream header copied, and
/// `content-length` always describes the body actually sent.
pub fn upstream_into_response(upstream: UpstreamResponse) -> Result<Response, ProxyError> {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let (bytes, fallback_type) = match upstream.body {
        UpstreamBody::Json(value) => (
            serde_json::to_vec(&value).map_err(|e| ProxyError::Internal {
                service: Upstream::Rag,
                error: e.to_string(),
            })?,
            Some("application/json"),
        ),
        UpstreamBody::Text(text) => (text.into_bytes(), None),
    };

    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .or_else(|| fallback_type.map(HeaderValue::from_static));

    let content_length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));

    Ok(response)
}
