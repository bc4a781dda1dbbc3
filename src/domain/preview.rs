use serde::Serialize;
use time::OffsetDateTime;

/// Derived, read-only summary of one conversation for list display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub username: String,
    pub last_message: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub unread_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}
