use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a persisted conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Durable record of a user's dialogue session with the assistant.
///
/// Messages are append-only and hold conversation turn order; the id is
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Build a fresh conversation seeded with a single assistant greeting.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, greeting: &str) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            messages: vec![Message::new(Role::Assistant, greeting)],
        }
    }
}

/// Latest stored health metrics for a user. Arbitrary key/value shape;
/// absence is valid and never blocks the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub user_id: String,
    pub metrics: Map<String, Value>,
}

/// A disease record returned by the fuzzy symptom search. Relevance ranking
/// is the search engine's responsibility and is not re-derived here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseCandidate {
    pub name: String,
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Role tag on an LLM request turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl From<Role> for LlmRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => LlmRole::User,
            Role::Assistant => LlmRole::Assistant,
        }
    }
}

/// One turn of an LLM request. Built fresh per request from the stored
/// history plus the new input; never persisted in this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmTurn {
    pub role: LlmRole,
    pub content: String,
}

impl LlmTurn {
    pub fn new(role: LlmRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
