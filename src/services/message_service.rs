use crate::domain::conversation::Conversation;
use crate::domain::message::{Message, MessageKind};
use crate::domain::preview::Preview;
use crate::error::{AppError, Result};
use crate::services::profiles::ProfileDirectory;
use crate::storage::ConversationStore;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    history_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            sent_total: meter
                .u64_counter("parley_messages_sent_total")
                .with_description("Total messages accepted for storage")
                .build(),
            history_size: meter
                .u64_histogram("parley_history_size")
                .with_description("Number of messages returned by a history lookup")
                .build(),
        }
    }
}

/// Message body as submitted by a sender, before validation.
#[derive(Debug, Clone, Default)]
pub struct OutgoingContent {
    pub text: Option<String>,
    pub kind: MessageKind,
    pub attachment_location: Option<String>,
    pub original_name: Option<String>,
}

/// Validates and appends messages, tracks read state, and computes derived
/// conversation views. All store calls run under a bounded timeout.
#[derive(Clone, Debug)]
pub struct MessageService {
    store: Arc<dyn ConversationStore>,
    profiles: Arc<dyn ProfileDirectory>,
    store_timeout: Duration,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        profiles: Arc<dyn ProfileDirectory>,
        store_timeout: Duration,
    ) -> Self {
        Self { store, profiles, store_timeout, metrics: Metrics::new() }
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T>> + Send) -> Result<T> {
        tokio::time::timeout(self.store_timeout, op).await.map_err(|_| AppError::StorageTimeout)?
    }

    /// Validates `content` and appends it to the pair's conversation,
    /// creating the conversation on first contact. Returns the stored message.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for an empty text message or an
    /// attachment kind without a location, and a storage error if the
    /// append fails.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content),
        fields(sender = %sender, target = %target)
    )]
    pub async fn send(&self, sender: &str, target: &str, content: OutgoingContent) -> Result<Message> {
        if sender.trim().is_empty() || target.trim().is_empty() {
            return Err(AppError::Validation("User required".to_string()));
        }

        match content.kind {
            MessageKind::Text => {
                if content.text.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    return Err(AppError::Validation("Message empty".to_string()));
                }
            }
            MessageKind::Image | MessageKind::File => {
                if content.attachment_location.as_deref().is_none_or(|l| l.trim().is_empty()) {
                    return Err(AppError::Validation("Attachment required".to_string()));
                }
            }
        }

        let message = Message {
            id: Uuid::new_v4(),
            from: sender.to_string(),
            text: content.text,
            kind: content.kind,
            attachment_location: content.attachment_location,
            original_name: content.original_name,
            read: false,
            created_at: OffsetDateTime::now_utc(),
        };

        match self.bounded(self.store.upsert_message(sender, target, message.clone())).await {
            Ok(()) => {
                tracing::debug!(message_id = %message.id, "Message stored");
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Full message list for the pair, in creation order. An absent
    /// conversation yields an empty list, not an error.
    ///
    /// # Errors
    /// Returns a storage error if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user = %user, target = %target))]
    pub async fn history(&self, user: &str, target: &str) -> Result<Vec<Message>> {
        let messages = self
            .bounded(self.store.find_by_pair(user, target))
            .await?
            .map_or_else(Vec::new, |convo| convo.messages);

        self.metrics.history_size.record(messages.len() as u64, &[]);
        Ok(messages)
    }

    /// One preview per conversation containing `user`, sorted by last-message
    /// timestamp descending. Conversations with no messages sort last.
    ///
    /// # Errors
    /// Returns a storage error if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user = %user))]
    pub async fn list_previews(&self, user: &str) -> Result<Vec<Preview>> {
        let conversations = self.bounded(self.store.find_by_participant(user)).await?;

        let mut previews = Vec::with_capacity(conversations.len());
        for convo in &conversations {
            previews.push(self.preview_of(convo, user).await);
        }

        // Stable sort keeps store order on equal timestamps; None (no
        // messages yet) compares lowest and lands at the end.
        previews.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(previews)
    }

    async fn preview_of(&self, convo: &Conversation, viewer: &str) -> Preview {
        let partner = convo.partner_of(viewer);
        let last = convo.messages.last();
        Preview {
            username: partner.to_string(),
            last_message: last.map(Message::preview_text).unwrap_or_default(),
            timestamp: last.map(|m| m.created_at),
            unread_count: convo.unread_count_for(viewer),
            avatar: self.profiles.avatar_for(partner).await,
        }
    }

    /// Flags every unread message from `target` as read. Returns whether
    /// anything changed, which drives whether a notification fires.
    ///
    /// # Errors
    /// Returns a storage error if the update fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user = %user, target = %target))]
    pub async fn mark_read(&self, user: &str, target: &str) -> Result<bool> {
        self.bounded(self.store.mark_read(user, target)).await
    }

    /// Removes the conversation and all its messages. Idempotent.
    ///
    /// # Errors
    /// Returns a storage error if the delete fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user = %user, target = %target))]
    pub async fn delete_conversation(&self, user: &str, target: &str) -> Result<()> {
        self.bounded(self.store.delete_by_pair(user, target)).await
    }
}
