// Request-scoped domain types shared by the router, the gate and the pipeline

use axum::http::{header, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Inbound request body, decided once at ingress.
///
/// JSON objects and arrays are `Structured`; anything else (including
/// malformed JSON and JSON scalars) is carried as the original bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Structured(Value),
    Raw(Bytes),
}

impl Body {
    /// Parse a body-bearing request payload. Never fails.
    pub fn parse(bytes: Bytes) -> Self {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Body::Structured(value),
            _ => Body::Raw(bytes),
        }
    }

    /// Top-level string field of a structured object body
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self {
            Body::Structured(value) => value.get(key).and_then(Value::as_str),
            Body::Raw(_) => None,
        }
    }

    /// Top-level field of a structured object body, any JSON type
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Body::Structured(value) => value.get(key),
            Body::Raw(_) => None,
        }
    }
}

/// The two inbound headers that are forwarded upstream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardedHeaders {
    pub user_agent: Option<HeaderValue>,
    pub accept: Option<HeaderValue>,
}

impl ForwardedHeaders {
    /// Keep user-agent and accept, drop everything else
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            user_agent: headers.get(header::USER_AGENT).cloned(),
            accept: headers.get(header::ACCEPT).cloned(),
        }
    }
}

/// A client call to the RAG passthrough route
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Trailing path after `/api/ragflow/`, without a leading slash
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: ForwardedHeaders,
    /// `None` for methods that carry no body
    pub body: Option<Body>,
}

impl InboundRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Self {
        let body = if method_carries_body(&method) {
            Some(Body::parse(body))
        } else {
            None
        };

        Self {
            method,
            path: path.into().trim_start_matches('/').to_string(),
            query: parse_query(raw_query),
            headers: ForwardedHeaders::from_headers(headers),
            body,
        }
    }
}

/// POST, PUT and PATCH carry a body; everything else is forwarded without one
pub fn method_carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Collapse a query string into a map; the last value of a repeated key wins
pub fn parse_query(raw_query: Option<&str>) -> BTreeMap<String, String> {
    raw_query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Safety service verdict for one piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// Safe to show; `text` is the original or a masked variant
    Allowed { text: String },
    /// Must not be shown; the caller supplies the refusal text
    Blocked,
}

impl SafetyVerdict {
    pub fn allowed(text: impl Into<String>) -> Self {
        SafetyVerdict::Allowed { text: text.into() }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, SafetyVerdict::Blocked)
    }
}

/// Decoded RAG backend body
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Json(Value),
    Text(String),
}

/// Reply from the RAG backend as handed back to the client
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// `data.answer` of a successful (`code == 0`) JSON reply, when non-empty
    pub fn successful_answer(&self) -> Option<&str> {
        let UpstreamBody::Json(value) = &self.body else {
            return None;
        };
        if value.get("code").and_then(Value::as_i64) != Some(0) {
            return None;
        }
        value
            .get("data")
            .and_then(|data| data.get("answer"))
            .and_then(Value::as_str)
            .filter(|answer| !answer.is_empty())
    }

    /// Overwrite `data.answer`; no-op when the body has no `data` object
    pub fn replace_answer(&mut self, answer: String) {
        if let UpstreamBody::Json(value) = &mut self.body {
            if let Some(data) = value.get_mut("data").and_then(Value::as_object_mut) {
                data.insert("answer".to_string(), Value::String(answer));
            }
        }
    }
}

/// Content types that the proxy decodes as JSON
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}
