// Unit tests for API response types

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use juni_proxy::api::responses::*;
use juni_proxy::core::errors::*;
use juni_proxy::core::models::{UpstreamBody, UpstreamResponse};
use serde_json::json;

use crate::common::{body_bytes, body_json};

#[test]
fn test_error_response_with_request_id() {
    let response = ErrorResponse {
        detail: "PII Guard 서비스 타임아웃".to_string(),
        request_id: Some("req-123".to_string()),
    };

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["detail"], "PII Guard 서비스 타임아웃");
    assert_eq!(json["request_id"], "req-123");
}

#[test]
fn test_health_response_serialization() {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: "JUNI Proxy Server".to_string(),
    };

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json, json!({"status": "healthy", "service": "JUNI Proxy Server"}));
}

#[test]
fn test_api_error_from_proxy_errors() {
    let cases = vec![
        (ProxyError::UpstreamTimeout { service: Upstream::Rag }, StatusCode::GATEWAY_TIMEOUT),
        (
            ProxyError::UpstreamUnavailable { service: Upstream::PiiGuard, error: "refused".to_string() },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            ProxyError::UpstreamStatus { service: Upstream::PiiGuard, status: 422 },
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            ProxyError::MalformedResponse { service: Upstream::Rag, error: "eof".to_string() },
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (ProxyError::CircuitOpen { service: Upstream::PiiGuard }, StatusCode::SERVICE_UNAVAILABLE),
        (ProxyError::Configuration("bad".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, expected) in cases {
        let api_error = ApiError::from(err);
        assert_eq!(api_error.status, expected);
        assert!(api_error.request_id.is_none());
    }
}

#[tokio::test]
async fn test_api_error_into_response_body() {
    let err = ProxyError::UpstreamUnavailable {
        service: Upstream::Rag,
        error: "dns error: failed to lookup address".to_string(),
    };
    let response = ApiError::from_proxy_error_with_id(&err, "req-9".to_string()).into_response();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body, json!({"detail": "RAGFlow 서비스에 연결할 수 없습니다", "request_id": "req-9"}));
}

#[tokio::test]
async fn test_upstream_response_content_length_matches_rewritten_body() {
    let mut upstream = UpstreamResponse {
        status: 200,
        content_type: Some("application/json".to_string()),
        body: UpstreamBody::Json(json!({"code": 0, "data": {"answer": "short"}})),
    };
    upstream.replace_answer("a considerably longer replacement answer".to_string());

    let response = upstream_into_response(upstream).unwrap();
    let declared: usize = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    let bytes = body_bytes(response).await;
    assert_eq!(declared, bytes.len());
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["answer"], "a considerably longer replacement answer");
}

#[tokio::test]
async fn test_upstream_json_without_content_type_defaults_to_json() {
    let response = upstream_into_response(UpstreamResponse {
        status: 200,
        content_type: None,
        body: UpstreamBody::Json(json!([1, 2, 3])),
    })
    .unwrap();

    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(body_bytes(response).await, b"[1,2,3]".to_vec());
}
