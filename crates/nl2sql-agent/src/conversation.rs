//! Per-conversation message history.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use nl2sql_core::ChatMessage;
use thiserror::Error;
use tokio::sync::RwLock;

/// Messages kept per conversation by default.
pub const DEFAULT_MAX_MSGS: usize = 20;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(String),
}

/// Storage for conversation histories.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message, creating the conversation on first use.
    async fn append(&self, conv_id: &str, message: ChatMessage);

    /// Messages of a conversation, oldest first. Unknown ids are empty.
    async fn get(&self, conv_id: &str) -> Vec<ChatMessage>;

    /// Delete a conversation.
    async fn delete(&self, conv_id: &str) -> Result<(), ConversationError>;

    /// Ids of all live conversations.
    async fn ids(&self) -> Vec<String>;
}

/// In-process [`ConversationStore`] with a per-conversation bound.
///
/// When a conversation is full the oldest message is evicted.
#[derive(Debug)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<String, VecDeque<ChatMessage>>>,
    max_msgs: usize,
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MSGS)
    }
}

impl MemoryConversationStore {
    /// A store keeping at most `max_msgs` messages per conversation (min 1).
    pub fn new(max_msgs: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_msgs: max_msgs.max(1),
        }
    }

    #[must_use]
    pub fn max_msgs(&self) -> usize {
        self.max_msgs
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(&self, conv_id: &str, message: ChatMessage) {
        let mut conversations = self.conversations.write().await;
        let history = conversations.entry(conv_id.to_string()).or_default();
        while history.len() >= self.max_msgs {
            history.pop_front();
        }
        history.push_back(message);
    }

    async fn get(&self, conv_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .read()
            .await
            .get(conv_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn delete(&self, conv_id: &str) -> Result<(), ConversationError> {
        self.conversations
            .write()
            .await
            .remove(conv_id)
            .map(|_| ())
            .ok_or_else(|| ConversationError::NotFound(conv_id.to_string()))
    }

    async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
