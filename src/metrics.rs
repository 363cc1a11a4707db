// Prometheus counters for the proxy
//
// Each `Metrics` owns its registry so tests can build independent instances.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::core::errors::ProxyError;

/// Which side of a completions exchange a safety check ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    /// The client's question, before forwarding
    Pre,
    /// The RAG backend's answer, before responding
    Post,
}

impl CheckStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStage::Pre => "pre",
            CheckStage::Post => "post",
        }
    }
}

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    guard_verdicts: IntCounterVec,
    guard_failures: IntCounterVec,
    upstream_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("juni_proxy_requests_total", "Inbound requests by route"),
            &["route"],
        )?;
        let guard_verdicts = IntCounterVec::new(
            Opts::new(
                "juni_proxy_guard_verdicts_total",
                "Safety verdicts applied to completions traffic",
            ),
            &["stage", "verdict"],
        )?;
        let guard_failures = IntCounterVec::new(
            Opts::new(
                "juni_proxy_guard_failures_total",
                "Safety checks that degraded because the guard service failed",
            ),
            &["kind"],
        )?;
        let upstream_errors = IntCounterVec::new(
            Opts::new(
                "juni_proxy_upstream_errors_total",
                "Upstream failures reported to clients",
            ),
            &["service", "kind"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(guard_verdicts.clone()))?;
        registry.register(Box::new(guard_failures.clone()))?;
        registry.register(Box::new(upstream_errors.clone()))?;

        Ok(Self {
            registry,
            requests,
            guard_verdicts,
            guard_failures,
            upstream_errors,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.requests.with_label_values(&[route]).inc();
    }

    pub fn record_verdict(&self, stage: CheckStage, blocked: bool) {
        let verdict = if blocked { "blocked" } else { "allowed" };
        self.guard_verdicts
            .with_label_values(&[stage.as_str(), verdict])
            .inc();
    }

    pub fn record_guard_failure(&self, err: &ProxyError) {
        self.guard_failures.with_label_values(&[err.kind()]).inc();
    }

    pub fn record_upstream_error(&self, err: &ProxyError) {
        let service = err.service().map(|s| s.label()).unwrap_or("none");
        self.upstream_errors
            .with_label_values(&[service, err.kind()])
            .inc();
    }

    /// Render all counters in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn verdict_count(&self, stage: CheckStage, verdict: &str) -> u64 {
        self.guard_verdicts
            .with_label_values(&[stage.as_str(), verdict])
            .get()
    }
}
