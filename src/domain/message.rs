use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Closed set of message payloads. Attachment kinds carry a blob location
/// instead of (or in addition to) text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

impl MessageKind {
    /// Fixed label rendered in conversation lists instead of the raw body.
    /// `None` means the message text itself is the preview.
    #[must_use]
    pub const fn preview_label(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("📷 Image"),
            Self::File => Some("📎 File"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub text: Option<String>,
    pub kind: MessageKind,
    pub attachment_location: Option<String>,
    pub original_name: Option<String>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// One-line text for list display.
    #[must_use]
    pub fn preview_text(&self) -> String {
        self.kind
            .preview_label()
            .map_or_else(|| self.text.clone().unwrap_or_default(), str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: MessageKind, text: Option<&str>) -> Message {
        Message {
            id: Uuid::new_v4(),
            from: "alice".to_string(),
            text: text.map(str::to_string),
            kind,
            attachment_location: None,
            original_name: None,
            read: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn text_preview_is_the_body() {
        assert_eq!(message(MessageKind::Text, Some("hi")).preview_text(), "hi");
    }

    #[test]
    fn attachment_previews_use_fixed_labels() {
        assert_eq!(message(MessageKind::Image, None).preview_text(), "📷 Image");
        assert_eq!(message(MessageKind::File, Some("ignored")).preview_text(), "📎 File");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MessageKind::Image).expect("serialize"), "\"image\"");
        let kind: MessageKind = serde_json::from_str("\"file\"").expect("deserialize");
        assert_eq!(kind, MessageKind::File);
    }
}
