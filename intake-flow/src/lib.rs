pub mod assembler;
pub mod enrichment;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod store;

// Re-export commonly used types
pub use assembler::assemble_turns;
pub use enrichment::{
    DiseaseMatcher, HealthContextLookup, InMemoryDiseaseMatcher, InMemoryHealthLookup,
};
pub use error::{IntakeError, Result};
pub use extractor::extract_reply;
pub use llm::{LlmBackend, MAX_COMPLETION_TOKENS};
pub use model::{Conversation, DiseaseCandidate, HealthSnapshot, LlmRole, LlmTurn, Message, Role};
pub use orchestrator::{
    ConversationOrchestrator, EnrichmentOutcome, StartOutcome, TurnOutcome, TurnRequest,
};
pub use store::{ConversationStore, InMemoryConversationStore};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that always answers with a fixed content-block payload.
    struct ScriptedBackend {
        reply: String,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn invoke(&self, _turns: &[LlmTurn], _max_tokens: u32) -> Result<String> {
            Ok(format!(
                r#"{{"content":[{{"type":"text","text":"{}"}}]}}"#,
                self.reply
            ))
        }
    }

    /// Backend that simulates an unreachable vendor API.
    struct FailingBackend;

    #[async_trait]
    impl LlmBackend for FailingBackend {
        async fn invoke(&self, _turns: &[LlmTurn], _max_tokens: u32) -> Result<String> {
            Err(IntakeError::LlmInvocation("connection refused".to_string()))
        }
    }

    struct FailingHealthLookup;

    #[async_trait]
    impl HealthContextLookup for FailingHealthLookup {
        async fn find_latest(&self, _user_id: &str) -> Result<Option<HealthSnapshot>> {
            Err(IntakeError::Enrichment("health index unreachable".to_string()))
        }
    }

    struct FailingDiseaseMatcher;

    #[async_trait]
    impl DiseaseMatcher for FailingDiseaseMatcher {
        async fn fuzzy_search(&self, _terms: &[String]) -> Result<Vec<DiseaseCandidate>> {
            Err(IntakeError::Enrichment("disease index unreachable".to_string()))
        }
    }

    /// Store wrapper that counts writes, for asserting write-free paths.
    struct CountingStore {
        inner: InMemoryConversationStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryConversationStore::new(),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConversationStore for CountingStore {
        async fn exists(&self, id: &str) -> Result<bool> {
            self.inner.exists(id).await
        }

        async fn get(&self, id: &str) -> Result<Option<Conversation>> {
            self.inner.get(id).await
        }

        async fn create(&self, conversation: Conversation) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create(conversation).await
        }

        async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.append_messages(id, messages).await
        }
    }

    fn orchestrator_with(
        store: Arc<dyn ConversationStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> ConversationOrchestrator {
        ConversationOrchestrator::new(
            store,
            Arc::new(InMemoryHealthLookup::new()),
            Arc::new(InMemoryDiseaseMatcher::new(vec![DiseaseCandidate {
                name: "Migraine".to_string(),
                symptoms: vec!["headache".to_string(), "nausea".to_string()],
                metadata: serde_json::Map::new(),
            }])),
            llm,
        )
    }

    fn default_orchestrator() -> ConversationOrchestrator {
        orchestrator_with(
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(ScriptedBackend {
                reply: "It could be a tension headache.".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn start_without_id_creates_greeting_conversation() {
        let orchestrator = default_orchestrator();

        let outcome = orchestrator.start_or_resume("u1", None).await.unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.conversation.user_id, "u1");
        assert_eq!(outcome.conversation.messages.len(), 1);
        assert_eq!(outcome.conversation.messages[0].role, Role::Assistant);
        assert_eq!(
            outcome.conversation.messages[0].text,
            "Hello! How can I help you today?"
        );
    }

    #[tokio::test]
    async fn consecutive_starts_produce_distinct_conversations() {
        let orchestrator = default_orchestrator();

        let first = orchestrator.start_or_resume("u1", None).await.unwrap();
        let second = orchestrator.start_or_resume("u1", None).await.unwrap();

        assert_ne!(first.conversation.id, second.conversation.id);
    }

    #[tokio::test]
    async fn start_with_existing_id_is_a_pure_read() {
        let store = Arc::new(CountingStore::new());
        let orchestrator = orchestrator_with(
            store.clone(),
            Arc::new(ScriptedBackend {
                reply: "ok".to_string(),
            }),
        );

        let created = orchestrator.start_or_resume("u1", None).await.unwrap();
        let writes_after_create = store.writes.load(Ordering::SeqCst);

        let resumed = orchestrator
            .start_or_resume("u1", Some(created.conversation.id.clone()))
            .await
            .unwrap();

        assert!(!resumed.created);
        assert_eq!(resumed.conversation.id, created.conversation.id);
        assert_eq!(
            resumed.conversation.messages.len(),
            created.conversation.messages.len()
        );
        assert_eq!(store.writes.load(Ordering::SeqCst), writes_after_create);
    }

    #[tokio::test]
    async fn start_with_unknown_supplied_id_creates_under_that_id() {
        let orchestrator = default_orchestrator();

        let outcome = orchestrator
            .start_or_resume("u1", Some("my-chosen-id".to_string()))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.conversation.id, "my-chosen-id");
    }

    #[tokio::test]
    async fn start_without_user_id_is_rejected() {
        let orchestrator = default_orchestrator();

        let err = orchestrator.start_or_resume("  ", None).await.unwrap_err();
        assert!(matches!(err, IntakeError::Validation(_)));
    }

    #[tokio::test]
    async fn submit_turn_appends_user_then_assistant() {
        let orchestrator = default_orchestrator();
        let started = orchestrator.start_or_resume("u1", None).await.unwrap();
        let prior_len = started.conversation.messages.len();

        let outcome = orchestrator
            .submit_turn(TurnRequest {
                conversation_id: started.conversation.id.clone(),
                user_id: "u1".to_string(),
                user_message: "I have a headache".to_string(),
                symptoms: vec!["headache".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(outcome.messages.len(), prior_len + 2);
        let user_turn = &outcome.messages[outcome.messages.len() - 2];
        let assistant_turn = outcome.messages.last().unwrap();
        assert_eq!(user_turn.role, Role::User);
        assert_eq!(user_turn.text, "I have a headache");
        assert_eq!(assistant_turn.role, Role::Assistant);
        assert_eq!(assistant_turn.text, "It could be a tension headache.");
        assert!(!outcome.llm_degraded);
    }

    #[tokio::test]
    async fn submit_turn_to_unknown_conversation_writes_nothing() {
        let store = Arc::new(CountingStore::new());
        let orchestrator = orchestrator_with(
            store.clone(),
            Arc::new(ScriptedBackend {
                reply: "ok".to_string(),
            }),
        );

        let err = orchestrator
            .submit_turn(TurnRequest {
                conversation_id: "no-such-conversation".to_string(),
                user_id: "u1".to_string(),
                user_message: "hello".to_string(),
                symptoms: Vec::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::ConversationNotFound(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_turn_with_missing_fields_is_rejected() {
        let orchestrator = default_orchestrator();

        for request in [
            TurnRequest {
                conversation_id: String::new(),
                user_id: "u1".to_string(),
                user_message: "hello".to_string(),
                symptoms: Vec::new(),
            },
            TurnRequest {
                conversation_id: "c1".to_string(),
                user_id: String::new(),
                user_message: "hello".to_string(),
                symptoms: Vec::new(),
            },
            TurnRequest {
                conversation_id: "c1".to_string(),
                user_id: "u1".to_string(),
                user_message: "   ".to_string(),
                symptoms: Vec::new(),
            },
        ] {
            let err = orchestrator.submit_turn(request).await.unwrap_err();
            assert!(matches!(err, IntakeError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn llm_failure_persists_a_marked_placeholder() {
        let store = Arc::new(InMemoryConversationStore::new());
        let orchestrator = orchestrator_with(store.clone(), Arc::new(FailingBackend));

        let started = orchestrator.start_or_resume("u1", None).await.unwrap();
        let outcome = orchestrator
            .submit_turn(TurnRequest {
                conversation_id: started.conversation.id.clone(),
                user_id: "u1".to_string(),
                user_message: "I have a headache".to_string(),
                symptoms: Vec::new(),
            })
            .await
            .unwrap();

        assert!(outcome.llm_degraded);
        assert!(outcome.assistant_reply.starts_with("[assistant unavailable"));

        // The placeholder turn reached durable state too.
        let stored = store.get(&started.conversation.id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
        assert_eq!(stored.messages[1].role, Role::User);
        assert_eq!(stored.messages[2].text, outcome.assistant_reply);
    }

    #[tokio::test]
    async fn enrichment_failures_degrade_without_blocking() {
        let orchestrator = ConversationOrchestrator::new(
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(FailingHealthLookup),
            Arc::new(FailingDiseaseMatcher),
            Arc::new(ScriptedBackend {
                reply: "Please see a clinician.".to_string(),
            }),
        );

        let started = orchestrator.start_or_resume("u1", None).await.unwrap();
        let outcome = orchestrator
            .submit_turn(TurnRequest {
                conversation_id: started.conversation.id.clone(),
                user_id: "u1".to_string(),
                user_message: "I feel feverish".to_string(),
                symptoms: vec!["fever".to_string()],
            })
            .await
            .unwrap();

        assert!(outcome.enrichment.health_degraded);
        assert!(outcome.enrichment.disease_degraded);
        assert_eq!(outcome.assistant_reply, "Please see a clinician.");
    }

    #[tokio::test]
    async fn end_to_end_turn_is_visible_on_resume() {
        let orchestrator = default_orchestrator();

        let started = orchestrator.start_or_resume("u1", None).await.unwrap();
        assert_eq!(started.conversation.messages.len(), 1);

        let outcome = orchestrator
            .submit_turn(TurnRequest {
                conversation_id: started.conversation.id.clone(),
                user_id: "u1".to_string(),
                user_message: "I have a headache".to_string(),
                symptoms: vec!["headache".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(outcome.messages.len(), 3);
        assert!(!outcome.assistant_reply.is_empty());

        let resumed = orchestrator
            .start_or_resume("u1", Some(started.conversation.id.clone()))
            .await
            .unwrap();
        assert!(!resumed.created);
        assert_eq!(resumed.conversation.messages.len(), 3);
        assert_eq!(
            resumed.conversation.messages.last().unwrap().text,
            outcome.assistant_reply
        );
    }
}
