use crate::domain::message::{Message, MessageKind};
use crate::domain::preview::Preview;
use crate::services::message_service::OutgoingContent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub kind: MessageKind,
    pub attachment_location: Option<String>,
    pub original_name: Option<String>,
}

impl From<SendMessageRequest> for OutgoingContent {
    fn from(body: SendMessageRequest) -> Self {
        Self {
            text: body.text,
            kind: body.kind,
            attachment_location: body.attachment_location,
            original_name: body.original_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub ok: bool,
    pub conversations: Vec<Preview>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}
