use crate::domain::message::Message;
use serde::{Deserialize, Serialize};

/// Canonical key for the unordered participant pair. Both orderings of the
/// same two identifiers map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    lo: String,
    hi: String,
}

impl PairKey {
    #[must_use]
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { lo: a.to_string(), hi: b.to_string() }
        } else {
            Self { lo: b.to_string(), hi: a.to_string() }
        }
    }

    #[must_use]
    pub fn lo(&self) -> &str {
        &self.lo
    }

    #[must_use]
    pub fn hi(&self) -> &str {
        &self.hi
    }
}

/// The persistent thread of messages between exactly two participants.
/// Message order is creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub participants: [String; 2],
    pub messages: Vec<Message>,
}

impl Conversation {
    #[must_use]
    pub fn new(a: &str, b: &str) -> Self {
        Self { participants: [a.to_string(), b.to_string()], messages: Vec::new() }
    }

    /// The participant that is not `user`. Falls back to `user` for a
    /// self-conversation, mirroring the list-display contract.
    #[must_use]
    pub fn partner_of<'a>(&'a self, user: &'a str) -> &'a str {
        self.participants.iter().find(|p| *p != user).map_or(user, String::as_str)
    }

    #[must_use]
    pub fn unread_count_for(&self, viewer: &str) -> usize {
        self.messages.iter().filter(|m| m.from != viewer && !m.read).count()
    }
}
