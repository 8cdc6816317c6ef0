use async_trait::async_trait;
use intake_flow::{IntakeError, LlmBackend, LlmRole, LlmTurn, Result};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Bound on a single LLM round-trip; the orchestrator itself imposes no
/// timeout, so the transport client enforces one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// LLM collaborator that talks to an Anthropic-compatible messages endpoint
/// and hands the raw response body to the extractor, which understands the
/// typed content-block payload it returns.
pub struct AnthropicMessagesBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicMessagesBackend {
    pub fn new(api_url: String, api_key: String, model: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string());
        let api_key =
            std::env::var("LLM_API_KEY").map_err(|_| anyhow::anyhow!("LLM_API_KEY not set"))?;
        let model = std::env::var("LLM_MODEL")
            .unwrap_or_else(|_| "claude-3-5-sonnet-latest".to_string());
        Self::new(api_url, api_key, model)
    }
}

#[async_trait]
impl LlmBackend for AnthropicMessagesBackend {
    async fn invoke(&self, turns: &[LlmTurn], max_tokens: u32) -> Result<String> {
        let body = build_request_body(&self.model, turns, max_tokens);

        debug!(model = %self.model, turn_count = turns.len(), "Invoking LLM backend");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| IntakeError::LlmInvocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::LlmInvocation(format!(
                "backend returned HTTP {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| IntakeError::LlmInvocation(e.to_string()))
    }
}

/// The messages API carries the system instruction as a top-level field,
/// not as a turn, so split it off before serializing.
fn build_request_body(model: &str, turns: &[LlmTurn], max_tokens: u32) -> Value {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();

    for turn in turns {
        match turn.role {
            LlmRole::System => system_parts.push(&turn.content),
            LlmRole::User => messages.push(json!({"role": "user", "content": turn.content})),
            LlmRole::Assistant => {
                messages.push(json!({"role": "assistant", "content": turn.content}))
            }
        }
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
    });
    if !system_parts.is_empty() {
        body["system"] = json!(system_parts.join("\n\n"));
    }
    body
}
