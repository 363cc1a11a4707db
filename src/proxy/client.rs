// HTTP client for forwarding passthrough calls to the RAG backend

use crate::api::RagUpstream;
use crate::config::{Config, RouteTarget};
use crate::core::errors::{ProxyError, Upstream};
use crate::core::models::{is_json_content_type, Body, InboundRequest, UpstreamBody, UpstreamResponse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

/// HTTP client for the RAG backend
///
/// One pooled client for the whole process. Each call is a single attempt;
/// failures are classified and returned, never retried.
pub struct RagClient {
    http_client: Client,
    target: RouteTarget,
    default_timeout: Duration,
}

impl RagClient {
    /// Create a new RagClient with connection pooling
    ///
    /// # Arguments
    /// * `timeout` - Total request timeout (generation can be slow)
    /// * `connect_timeout` - Connection establishment timeout
    pub fn new(target: RouteTarget, timeout: Duration, connect_timeout: Duration) -> Result<Self, ProxyError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .tcp_nodelay(true) // Reduce latency
            .pool_idle_timeout(Duration::from_secs(90)) // Reuse connections
            .build()
            .map_err(|e| ProxyError::Configuration(format!(
                "Failed to create RAG HTTP client: {}", e
            )))?;

        Ok(Self {
            http_client,
            target,
            default_timeout: timeout,
        })
    }

    /// Build the client from process configuration
    pub fn from_config(config: &Config) -> Result<Self, ProxyError> {
        Self::new(config.rag.clone(), config.rag_timeout(), config.rag_connect_timeout())
    }

    /// Upstream URL for a passthrough path
    pub(crate) fn url_for(&self, path: &str) -> String {
        self.target.join(&format!("api/{}", path))
    }

    fn build_request(&self, request: &InboundRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .request(request.method.clone(), self.url_for(&request.path))
            .header(CONTENT_TYPE, "application/json")
            .query(&request.query);

        if let Some(token) = self.target.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(user_agent) = &request.headers.user_agent {
            builder = builder.header(USER_AGENT, user_agent.clone());
        }
        if let Some(accept) = &request.headers.accept {
            builder = builder.header(ACCEPT, accept.clone());
        }

        match &request.body {
            Some(Body::Structured(value)) => builder.json(value),
            Some(Body::Raw(bytes)) => builder.body(bytes.clone()),
            None => builder,
        }
    }

    async fn forward_internal(&self, request: &InboundRequest) -> Result<UpstreamResponse, ProxyError> {
        let service = Upstream::Rag;

        debug!(
            method = %request.method,
            path = %request.path,
            timeout_secs = self.default_timeout.as_secs(),
            "Forwarding request to RAG backend"
        );

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(service, &e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if is_json_content_type(content_type.as_deref()) {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProxyError::from_transport(service, &e))?;
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                error!(error = %e, path = %request.path, "Failed to parse RAG JSON response");
                ProxyError::MalformedResponse { service, error: e.to_string() }
            })?;
            UpstreamBody::Json(value)
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| ProxyError::from_transport(service, &e))?;
            UpstreamBody::Text(text)
        };

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl RagUpstream for RagClient {
    async fn forward(&self, request: &InboundRequest) -> Result<UpstreamResponse, ProxyError> {
        self.forward_internal(request).await
    }
}
