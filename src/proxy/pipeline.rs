// Proxy pipeline: pre-check -> forward -> post-check for one client request

use crate::api::{RagUpstream, SafetyGate};
use crate::core::errors::ProxyError;
use crate::core::models::{method_carries_body, InboundRequest, SafetyVerdict, UpstreamResponse};
use crate::metrics::{CheckStage, Metrics};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Path marker of conversational calls, the only traffic that is guarded
pub const COMPLETIONS_MARKER: &str = "completions";

/// Returned instead of forwarding when the question is blocked
pub const PRE_CHECK_REFUSAL: &str =
    "개인정보(PII)가 포함된 질문에는 답변할 수 없습니다. 개인정보를 제외하고 다시 질문해 주세요.";

/// Written over `data.answer` when the generated answer is blocked
pub const POST_CHECK_REFUSAL: &str =
    "답변에 개인정보(PII)가 포함되어 있어 표시할 수 없습니다.";

/// What the handler should send back
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Pre-check blocked the question; the RAG backend was not contacted
    Refused(Value),
    /// RAG backend reply, possibly with its answer replaced
    Proxied(UpstreamResponse),
}

enum PreCheck {
    Continue,
    Refuse(Value),
}

/// Orchestrates one passthrough request through the Safety Gate and the RAG backend.
///
/// Stages run strictly in order and each depends on the previous one:
/// 1. pre-check the `question` of a completions call (may short-circuit)
/// 2. forward to the RAG backend (errors end the request)
/// 3. post-check `data.answer` of a successful JSON reply
pub struct ProxyPipeline {
    gate: Arc<dyn SafetyGate + Send + Sync>,
    rag: Arc<dyn RagUpstream + Send + Sync>,
    metrics: Arc<Metrics>,
}

impl ProxyPipeline {
    pub fn new(
        gate: Arc<dyn SafetyGate + Send + Sync>,
        rag: Arc<dyn RagUpstream + Send + Sync>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { gate, rag, metrics }
    }

    /// Run the request through the pipeline
    pub async fn handle(&self, request: &InboundRequest) -> Result<PipelineOutcome, ProxyError> {
        let guarded = is_guarded(request);

        if guarded {
            if let PreCheck::Refuse(envelope) = self.pre_check(request).await {
                return Ok(PipelineOutcome::Refused(envelope));
            }
        }

        let mut response = self.rag.forward(request).await?;

        if guarded {
            self.post_check(&mut response).await;
        }

        Ok(PipelineOutcome::Proxied(response))
    }

    async fn pre_check(&self, request: &InboundRequest) -> PreCheck {
        let Some(question) = request
            .body
            .as_ref()
            .and_then(|body| body.str_field("question"))
            .filter(|q| !q.is_empty())
        else {
            return PreCheck::Continue;
        };

        let verdict = self.gate.check(question).await;
        self.metrics.record_verdict(CheckStage::Pre, verdict.is_blocked());

        // Only the block decision matters here; the outbound question is never rewritten.
        match verdict {
            SafetyVerdict::Blocked => {
                warn!(path = %request.path, "Question blocked by PII guard - not forwarding");
                let session_id = request
                    .body
                    .as_ref()
                    .and_then(|body| body.field("session_id"))
                    .cloned()
                    .unwrap_or(Value::Null);
                PreCheck::Refuse(refusal_envelope(session_id))
            }
            SafetyVerdict::Allowed { .. } => PreCheck::Continue,
        }
    }

    async fn post_check(&self, response: &mut UpstreamResponse) {
        let Some(answer) = response.successful_answer() else {
            return;
        };

        let verdict = self.gate.check(answer).await;
        self.metrics.record_verdict(CheckStage::Post, verdict.is_blocked());

        match verdict {
            SafetyVerdict::Blocked => {
                warn!("Answer blocked by PII guard - replacing with refusal");
                response.replace_answer(POST_CHECK_REFUSAL.to_string());
            }
            SafetyVerdict::Allowed { text } => {
                info!("Answer passed PII guard");
                response.replace_answer(text);
            }
        }
    }
}

/// Completions calls with a body-bearing method are the only guarded traffic
pub fn is_guarded(request: &InboundRequest) -> bool {
    method_carries_body(&request.method) && request.path.contains(COMPLETIONS_MARKER)
}

/// Envelope sent in place of a RAG reply when the question is blocked
pub fn refusal_envelope(session_id: Value) -> Value {
    json!({
        "code": 0,
        "message": "",
        "data": {
            "answer": PRE_CHECK_REFUSAL,
            "reference": {},
            "session_id": session_id,
        }
    })
}
