use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    assembler::assemble_turns,
    enrichment::{DiseaseMatcher, HealthContextLookup},
    error::{IntakeError, Result},
    extractor::extract_reply,
    llm::{LlmBackend, MAX_COMPLETION_TOKENS},
    model::{Conversation, DiseaseCandidate, HealthSnapshot, Message, Role},
    store::ConversationStore,
};

const GREETING_TEXT: &str = "Hello! How can I help you today?";

/// Result of `start_or_resume`: the conversation plus whether it was created
/// on this call (201-equivalent) or resumed unchanged (200-equivalent).
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub conversation: Conversation,
    pub created: bool,
}

/// Input for `submit_turn`. `symptoms` may be empty, in which case no
/// disease search is performed.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub user_id: String,
    pub user_message: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// What the enrichment step produced, with explicit degradation flags so
/// callers and tests can distinguish "lookup failed and was recovered" from
/// "lookup succeeded with an empty result" without inspecting logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentOutcome {
    #[serde(skip)]
    pub health: Option<HealthSnapshot>,
    #[serde(skip)]
    pub diseases: Vec<DiseaseCandidate>,
    pub health_degraded: bool,
    pub disease_degraded: bool,
}

/// Result of `submit_turn`.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub assistant_reply: String,
    pub messages: Vec<Message>,
    pub enrichment: EnrichmentOutcome,
    pub llm_degraded: bool,
}

/// Top-level coordinator for the two intake operations.
///
/// All collaborators are injected once at construction and shared for the
/// process lifetime; nothing is reconstructed per request.
pub struct ConversationOrchestrator {
    store: Arc<dyn ConversationStore>,
    health_lookup: Arc<dyn HealthContextLookup>,
    disease_matcher: Arc<dyn DiseaseMatcher>,
    llm: Arc<dyn LlmBackend>,
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        health_lookup: Arc<dyn HealthContextLookup>,
        disease_matcher: Arc<dyn DiseaseMatcher>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            store,
            health_lookup,
            disease_matcher,
            llm,
        }
    }

    /// Resume an existing conversation, or create a new one seeded with a
    /// single assistant greeting.
    ///
    /// Resuming is a pure read. Creation happens when no id is supplied or
    /// the supplied id does not resolve, and performs exactly one store
    /// write. No enrichment lookups run here.
    pub async fn start_or_resume(
        &self,
        user_id: &str,
        conversation_id: Option<String>,
    ) -> Result<StartOutcome> {
        if user_id.trim().is_empty() {
            return Err(IntakeError::Validation("Missing userId".to_string()));
        }

        let effective_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(existing) = self.store.get(&effective_id).await? {
            info!(conversation_id = %effective_id, "Resuming existing conversation");
            return Ok(StartOutcome {
                conversation: existing,
                created: false,
            });
        }

        let conversation = Conversation::new(effective_id.clone(), user_id, GREETING_TEXT);
        self.store.create(conversation.clone()).await?;
        info!(conversation_id = %effective_id, "Created new conversation");

        Ok(StartOutcome {
            conversation,
            created: true,
        })
    }

    /// Append one user turn, enrich the context, get the assistant's reply
    /// from the LLM, and persist both new turns.
    ///
    /// Enrichment and LLM failures degrade gracefully; only validation,
    /// unknown-conversation, and storage failures propagate.
    pub async fn submit_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        validate_turn_request(&request)?;

        let conversation = self
            .store
            .get(&request.conversation_id)
            .await?
            .ok_or_else(|| {
                IntakeError::ConversationNotFound(request.conversation_id.clone())
            })?;

        let enrichment = self.enrich(&request.user_id, &request.symptoms).await;

        let turns = assemble_turns(
            &conversation.messages,
            enrichment.health.as_ref(),
            &enrichment.diseases,
            &request.user_message,
        );

        let (raw_response, llm_degraded) =
            match self.llm.invoke(&turns, MAX_COMPLETION_TOKENS).await {
                Ok(raw) => (raw, false),
                Err(e) => {
                    // The placeholder is persisted so stored state matches
                    // what the user saw.
                    warn!(
                        conversation_id = %request.conversation_id,
                        "LLM invocation failed, substituting placeholder: {e}"
                    );
                    (format!("[assistant unavailable: {e}]"), true)
                }
            };

        let assistant_reply = extract_reply(&raw_response);

        let user_message = Message::new(Role::User, request.user_message.clone());
        let assistant_message = Message::new(Role::Assistant, assistant_reply.clone());

        self.store
            .append_messages(
                &request.conversation_id,
                vec![user_message.clone(), assistant_message.clone()],
            )
            .await?;

        let mut messages = conversation.messages;
        messages.push(user_message);
        messages.push(assistant_message);

        Ok(TurnOutcome {
            conversation_id: request.conversation_id,
            assistant_reply,
            messages,
            enrichment,
            llm_degraded,
        })
    }

    /// Run the two independent enrichment lookups concurrently. Either one
    /// failing is recorded and recovered as an empty result; neither aborts
    /// the request.
    async fn enrich(&self, user_id: &str, symptoms: &[String]) -> EnrichmentOutcome {
        let (health_result, disease_result) = tokio::join!(
            self.health_lookup.find_latest(user_id),
            self.search_diseases(symptoms),
        );

        let mut outcome = EnrichmentOutcome::default();

        match health_result {
            Ok(health) => outcome.health = health,
            Err(e) => {
                warn!(user_id, "Health snapshot lookup failed: {e}");
                outcome.health_degraded = true;
            }
        }

        match disease_result {
            Ok(diseases) => outcome.diseases = diseases,
            Err(e) => {
                warn!("Disease fuzzy search failed: {e}");
                outcome.disease_degraded = true;
            }
        }

        outcome
    }

    async fn search_diseases(&self, symptoms: &[String]) -> Result<Vec<DiseaseCandidate>> {
        if symptoms.is_empty() {
            return Ok(Vec::new());
        }
        self.disease_matcher.fuzzy_search(symptoms).await
    }
}

fn validate_turn_request(request: &TurnRequest) -> Result<()> {
    if request.conversation_id.trim().is_empty()
        || request.user_message.trim().is_empty()
        || request.user_id.trim().is_empty()
    {
        return Err(IntakeError::Validation(
            "Missing conversationId or userMessage or userId".to_string(),
        ));
    }
    Ok(())
}
