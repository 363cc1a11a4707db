// HTTP client for the PII guard service (Safety Gate)

use crate::api::SafetyGate;
use crate::config::{Config, GuardFailMode, RouteTarget};
use crate::core::errors::{ProxyError, Upstream};
use crate::core::models::SafetyVerdict;
use crate::core::resilience::{create_circuit_breaker, execute_with_cb, GuardCircuitBreaker};
use crate::metrics::Metrics;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const GUARD_PATH: &str = "guard";

#[derive(Debug, Serialize)]
struct GuardRequest<'a> {
    text: &'a str,
}

/// `/guard` reply; `answer` is the (possibly masked) text
#[derive(Debug, Deserialize)]
struct GuardResponse {
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    answer: Option<String>,
}

/// Safety Gate backed by the PII guard HTTP service
///
/// `check` never fails: timeouts, connection errors, non-200 replies,
/// undecodable bodies and an open circuit all degrade according to
/// `fail_mode`. With the default `GuardFailMode::Open` a degraded check
/// lets the original text through, so an unhealthy guard service never
/// takes the RAG service down with it.
pub struct PiiGuardClient {
    http_client: Client,
    target: RouteTarget,
    check_timeout: Duration,
    passthrough_timeout: Duration,
    fail_mode: GuardFailMode,
    cb: GuardCircuitBreaker,
    metrics: Arc<Metrics>,
}

impl PiiGuardClient {
    pub fn new(
        target: RouteTarget,
        check_timeout: Duration,
        passthrough_timeout: Duration,
        fail_mode: GuardFailMode,
        cb: GuardCircuitBreaker,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ProxyError> {
        let http_client = Client::builder()
            .connect_timeout(check_timeout.min(passthrough_timeout))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProxyError::Configuration(format!(
                "Failed to create PII guard HTTP client: {}", e
            )))?;

        Ok(Self {
            http_client,
            target,
            check_timeout,
            passthrough_timeout,
            fail_mode,
            cb,
            metrics,
        })
    }

    /// Build the client from process configuration
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self, ProxyError> {
        Self::new(
            config.guard.clone(),
            config.guard_check_timeout(),
            config.guard_passthrough_timeout(),
            config.guard_fail_mode,
            create_circuit_breaker(config.guard_cb_failure_threshold, config.guard_cb_cooldown()),
            metrics,
        )
    }

    fn post(&self, timeout: Duration) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .post(self.target.join(GUARD_PATH))
            .timeout(timeout);

        match self.target.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check_internal(&self, text: &str) -> Result<SafetyVerdict, ProxyError> {
        let service = Upstream::PiiGuard;

        let response = self
            .post(self.check_timeout)
            .json(&GuardRequest { text })
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(service, &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProxyError::UpstreamStatus { service, status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::from_transport(service, &e))?;
        let verdict: GuardResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProxyError::MalformedResponse { service, error: e.to_string() })?;

        if verdict.blocked {
            Ok(SafetyVerdict::Blocked)
        } else {
            Ok(SafetyVerdict::allowed(verdict.answer.unwrap_or_else(|| text.to_string())))
        }
    }

    fn degraded(&self, text: &str) -> SafetyVerdict {
        match self.fail_mode {
            GuardFailMode::Open => SafetyVerdict::allowed(text),
            GuardFailMode::Closed => SafetyVerdict::Blocked,
        }
    }
}

#[async_trait]
impl SafetyGate for PiiGuardClient {
    async fn check(&self, text: &str) -> SafetyVerdict {
        match execute_with_cb(&self.cb, Upstream::PiiGuard, || self.check_internal(text)).await {
            Ok(verdict) => {
                debug!(blocked = verdict.is_blocked(), "PII guard verdict received");
                verdict
            }
            Err(e) => {
                self.metrics.record_guard_failure(&e);
                warn!(
                    error = %e,
                    fail_mode = ?self.fail_mode,
                    "PII guard check failed - degrading verdict"
                );
                self.degraded(text)
            }
        }
    }

    async fn passthrough(&self, body: &serde_json::Value) -> Result<serde_json::Value, ProxyError> {
        let service = Upstream::PiiGuard;

        let response = self
            .post(self.passthrough_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(service, &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProxyError::UpstreamStatus { service, status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::from_transport(service, &e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProxyError::MalformedResponse { service, error: e.to_string() })
    }
}
