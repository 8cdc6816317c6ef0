use async_trait::async_trait;

use crate::{error::Result, model::LlmTurn};

/// Fixed generation budget for assistant replies, in tokens.
pub const MAX_COMPLETION_TOKENS: u32 = 512;

/// Abstraction over the LLM vendor API.
///
/// `invoke` returns the raw response payload text; normalization into plain
/// assistant text is the extractor's job. Transport or protocol failures
/// surface as `IntakeError::LlmInvocation`, which the orchestrator recovers
/// from with a placeholder reply.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, turns: &[LlmTurn], max_tokens: u32) -> Result<String>;
}
