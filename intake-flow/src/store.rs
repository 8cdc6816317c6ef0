use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    error::{IntakeError, Result},
    model::{Conversation, Message},
};

/// Trait for durable get/create/append of conversation documents.
///
/// Implementations must provide read-your-writes visibility: a `create` or
/// `append_messages` that returns `Ok` is visible to an immediately
/// subsequent `get`. No compare-and-swap guarantee is assumed for appends;
/// concurrent writers to the same id are last-writer-wins unless the backing
/// store serializes them.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn exists(&self, id: &str) -> Result<bool>;
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;
    async fn create(&self, conversation: Conversation) -> Result<()>;
    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<()>;
}

/// In-memory implementation of ConversationStore, used by tests and as the
/// default wiring when no external document store is configured.
pub struct InMemoryConversationStore {
    conversations: Arc<DashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.conversations.contains_key(id))
    }

    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(id).map(|entry| entry.clone()))
    }

    async fn create(&self, conversation: Conversation) -> Result<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<()> {
        match self.conversations.get_mut(id) {
            Some(mut entry) => {
                entry.messages.extend(messages);
                Ok(())
            }
            None => Err(IntakeError::ConversationNotFound(id.to_string())),
        }
    }
}
