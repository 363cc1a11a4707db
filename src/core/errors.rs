// Domain error types - upstream failures mapped to client-safe responses

use std::fmt;
use thiserror::Error;

/// Upstream services the proxy talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    Rag,
    PiiGuard,
}

impl Upstream {
    /// Display name used in logs and user-facing messages
    pub fn name(&self) -> &'static str {
        match self {
            Upstream::Rag => "RAGFlow",
            Upstream::PiiGuard => "PII Guard",
        }
    }

    /// Stable metric label
    pub fn label(&self) -> &'static str {
        match self {
            Upstream::Rag => "rag",
            Upstream::PiiGuard => "pii_guard",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Upstream did not answer in time (HTTP 504)
    #[error("{service} request timed out")]
    UpstreamTimeout { service: Upstream },

    /// Upstream could not be reached (HTTP 503)
    #[error("{service} connection error: {error}")]
    UpstreamUnavailable { service: Upstream, error: String },

    /// Upstream answered with an unexpected status (status passed through)
    #[error("{service} returned HTTP {status}")]
    UpstreamStatus { service: Upstream, status: u16 },

    /// Upstream body could not be decoded (HTTP 500)
    #[error("{service} returned a malformed response: {error}")]
    MalformedResponse { service: Upstream, error: String },

    /// Circuit breaker rejected the call without contacting the upstream (HTTP 503)
    #[error("{service} circuit breaker open")]
    CircuitOpen { service: Upstream },

    /// Anything else that went wrong while proxying (HTTP 500)
    #[error("{service} proxy error: {error}")]
    Internal { service: Upstream, error: String },

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProxyError {
    /// Classify a reqwest failure the same way for every upstream.
    ///
    /// Timeouts win over everything else; remaining transport failures
    /// (connect, request, body) count as the upstream being unavailable.
    pub fn from_transport(service: Upstream, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout { service }
        } else if err.is_decode() {
            ProxyError::MalformedResponse {
                service,
                error: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ProxyError::UpstreamUnavailable {
                service,
                error: err.to_string(),
            }
        } else {
            ProxyError::Internal {
                service,
                error: err.to_string(),
            }
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::UpstreamTimeout { .. } => 504,
            ProxyError::UpstreamUnavailable { .. } => 503,
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::MalformedResponse { .. } => 500,
            ProxyError::CircuitOpen { .. } => 503,
            ProxyError::Internal { .. } => 500,
            ProxyError::Configuration(_) => 500,
        }
    }

    /// Get user-facing error message (no upstream internals)
    pub fn user_message(&self) -> String {
        match self {
            ProxyError::UpstreamTimeout { service } => format!("{} 서비스 타임아웃", service),
            ProxyError::UpstreamUnavailable { service, .. } | ProxyError::CircuitOpen { service } => {
                format!("{} 서비스에 연결할 수 없습니다", service)
            }
            ProxyError::UpstreamStatus { service, status } => {
                format!("{} API 요청 실패: {}", service, status)
            }
            ProxyError::MalformedResponse { service, .. } | ProxyError::Internal { service, .. } => {
                format!("{} 프록시 오류", service)
            }
            ProxyError::Configuration(_) => "Internal error".to_string(),
        }
    }

    /// Metric label for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UpstreamTimeout { .. } => "timeout",
            ProxyError::UpstreamUnavailable { .. } => "unavailable",
            ProxyError::UpstreamStatus { .. } => "status",
            ProxyError::MalformedResponse { .. } => "malformed",
            ProxyError::CircuitOpen { .. } => "circuit_open",
            ProxyError::Internal { .. } => "internal",
            ProxyError::Configuration(_) => "configuration",
        }
    }

    /// Upstream this error originated from, if any
    pub fn service(&self) -> Option<Upstream> {
        match self {
            ProxyError::UpstreamTimeout { service }
            | ProxyError::UpstreamUnavailable { service, .. }
            | ProxyError::UpstreamStatus { service, .. }
            | ProxyError::MalformedResponse { service, .. }
            | ProxyError::CircuitOpen { service }
            | ProxyError::Internal { service, .. } => Some(*service),
            ProxyError::Configuration(_) => None,
        }
    }
}
