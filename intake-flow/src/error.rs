use thiserror::Error;

/// Errors produced by the intake pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// A required request field is missing or empty. Client-caused, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced conversation does not exist in the store.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// A store read or write failed. Surfaced to the caller as an internal failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A health or disease lookup failed. Always recovered inside the
    /// orchestrator as an empty result; never surfaced to the caller.
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// The LLM backend was unreachable or returned a protocol error.
    /// Recovered by substituting a placeholder reply.
    #[error("LLM invocation error: {0}")]
    LlmInvocation(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
