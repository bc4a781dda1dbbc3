use crate::domain::message::Message;
use serde::{Deserialize, Serialize};

/// Events pushed to a user's room. Fields that depend on the point of view
/// (`conversation_partner`, `partner`) are computed per recipient before
/// publishing, so every room receives its own rendition of the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    MessageReceived { message: Message, conversation_partner: String },
    #[serde(rename_all = "camelCase")]
    ReadStateChanged { read_by: String },
    #[serde(rename_all = "camelCase")]
    ConversationDeleted { deleted_by: String, partner: String },
}
