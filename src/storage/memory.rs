use crate::domain::conversation::{Conversation, PairKey};
use crate::domain::message::Message;
use crate::error::Result;
use crate::storage::ConversationStore;
use dashmap::DashMap;

/// In-process conversation store. The dashmap entry API holds the shard lock
/// across find-or-create and append, which serializes concurrent upserts for
/// the same pair (the duplicate-conversation race cannot occur).
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<PairKey, Conversation>,
}

impl MemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn find_by_participant(&self, user: &str) -> Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .filter(|entry| entry.participants.iter().any(|p| p == user))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_by_pair(&self, a: &str, b: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(&PairKey::new(a, b)).map(|entry| entry.value().clone()))
    }

    async fn upsert_message(&self, a: &str, b: &str, message: Message) -> Result<()> {
        self.conversations
            .entry(PairKey::new(a, b))
            .or_insert_with(|| Conversation::new(a, b))
            .messages
            .push(message);
        Ok(())
    }

    async fn mark_read(&self, reader: &str, other: &str) -> Result<bool> {
        let mut changed = false;
        if let Some(mut entry) = self.conversations.get_mut(&PairKey::new(reader, other)) {
            for message in &mut entry.messages {
                if message.from == other && !message.read {
                    message.read = true;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    async fn delete_by_pair(&self, a: &str, b: &str) -> Result<()> {
        self.conversations.remove(&PairKey::new(a, b));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
