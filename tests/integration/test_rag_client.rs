// Integration tests for the RAG backend client

use axum::http::{header, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use juni_proxy::api::RagUpstream;
use juni_proxy::config::RouteTarget;
use juni_proxy::core::errors::{ProxyError, Upstream};
use juni_proxy::core::models::{InboundRequest, UpstreamBody};
use juni_proxy::proxy::RagClient;
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

use crate::common::{spawn_silent_server, UNREACHABLE_URL};

fn create_test_client(base_url: &str, api_key: Option<&str>) -> RagClient {
    RagClient::new(
        RouteTarget::new(base_url, api_key),
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn get(path: &str, query: Option<&str>) -> InboundRequest {
    InboundRequest::new(Method::GET, path, query, &HeaderMap::new(), Bytes::new())
}

fn post(path: &str, body: &'static [u8]) -> InboundRequest {
    InboundRequest::new(Method::POST, path, None, &HeaderMap::new(), Bytes::from_static(body))
}

#[tokio::test]
async fn test_get_forwards_path_query_and_bearer() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), Some("ragflow-key"));

    let mock = server
        .mock("GET", "/api/v1/chats/c1/sessions")
        .match_header("authorization", "Bearer ragflow-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("orderby".into(), "create_time".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"code": 0, "data": [{"id": "s1"}]}).to_string())
        .create_async()
        .await;

    let response = client
        .forward(&get("v1/chats/c1/sessions", Some("page=1&page=2&orderby=create_time")))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, UpstreamBody::Json(json!({"code": 0, "data": [{"id": "s1"}]})));
}

#[tokio::test]
async fn test_only_whitelisted_headers_reach_backend() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), Some("ragflow-key"));

    let mock = server
        .mock("GET", "/api/v1/datasets")
        .match_header("user-agent", "juni-web/2.1")
        .match_header("accept", "text/event-stream")
        .match_header("authorization", "Bearer ragflow-key")
        .match_header("cookie", Matcher::Missing)
        .match_header("x-forwarded-for", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"code\":0}")
        .create_async()
        .await;

    let mut inbound = HeaderMap::new();
    inbound.insert(header::USER_AGENT, HeaderValue::from_static("juni-web/2.1"));
    inbound.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer client-token"));
    inbound.insert(header::COOKIE, HeaderValue::from_static("sid=abc"));
    inbound.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));

    let request = InboundRequest::new(Method::GET, "v1/datasets", None, &inbound, Bytes::new());
    client.forward(&request).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_api_key_sends_no_authorization() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), Some(""));

    let mock = server
        .mock("GET", "/api/v1/datasets")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"code\":0}")
        .create_async()
        .await;

    client.forward(&get("v1/datasets", None)).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_forwards_json_body() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), Some("ragflow-key"));

    let mock = server
        .mock("POST", "/api/v1/chats/c1/completions")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"question": "hello", "stream": false})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"code": 0, "data": {"answer": "hi"}}).to_string())
        .create_async()
        .await;

    let response = client
        .forward(&post("v1/chats/c1/completions", b"{\"question\":\"hello\",\"stream\":false}"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.successful_answer(), Some("hi"));
}

#[tokio::test]
async fn test_unparseable_body_forwarded_as_original_bytes() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), None);

    let mock = server
        .mock("POST", "/api/v1/chats/c1/completions")
        .match_header("content-type", "application/json")
        .match_body("{\"question\": broken")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"code\":100,\"message\":\"bad json\"}")
        .create_async()
        .await;

    client
        .forward(&post("v1/chats/c1/completions", b"{\"question\": broken"))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_json_response_returned_as_text() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), None);

    let mock = server
        .mock("GET", "/api/v1/file/f1")
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body("plain contents")
        .create_async()
        .await;

    let response = client.forward(&get("v1/file/f1", None)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert_eq!(response.body, UpstreamBody::Text("plain contents".to_string()));
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), None);

    let mock = server
        .mock("DELETE", "/api/v1/datasets/d1")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body("{\"code\":102,\"message\":\"not found\"}")
        .create_async()
        .await;

    let request = InboundRequest::new(Method::DELETE, "v1/datasets/d1", None, &HeaderMap::new(), Bytes::new());
    let response = client.forward(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body, UpstreamBody::Json(json!({"code": 102, "message": "not found"})));
}

#[tokio::test]
async fn test_invalid_json_response_is_malformed() {
    let mut server = Server::new_async().await;
    let client = create_test_client(&server.url(), None);

    let _mock = server
        .mock("GET", "/api/v1/datasets")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let result = client.forward(&get("v1/datasets", None)).await;

    assert!(matches!(
        result,
        Err(ProxyError::MalformedResponse { service: Upstream::Rag, .. })
    ));
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let client = create_test_client(UNREACHABLE_URL, None);

    let result = client.forward(&get("v1/datasets", None)).await;

    match result {
        Err(err @ ProxyError::UpstreamUnavailable { service: Upstream::Rag, .. }) => {
            assert_eq!(err.status_code(), 503);
            assert_eq!(err.user_message(), "RAGFlow 서비스에 연결할 수 없습니다");
        }
        other => panic!("Expected UpstreamUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let url = spawn_silent_server().await;
    let client = RagClient::new(
        RouteTarget::new(url, None),
        Duration::from_millis(300),
        Duration::from_millis(200),
    )
    .unwrap();

    let result = client.forward(&get("v1/chats", None)).await;

    match result {
        Err(err @ ProxyError::UpstreamTimeout { service: Upstream::Rag }) => {
            assert_eq!(err.status_code(), 504);
            assert_eq!(err.user_message(), "RAGFlow 서비스 타임아웃");
        }
        other => panic!("Expected UpstreamTimeout, got {:?}", other),
    }
}
