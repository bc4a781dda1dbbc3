use crate::api::AppState;
use crate::api::dto::{
    ConversationsResponse, HistoryResponse, OkResponse, SendMessageRequest, SendMessageResponse,
};
use crate::api::middleware::Identity;
use crate::domain::event::ChatEvent;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

/// Lists conversation previews for the caller, most recent first.
///
/// # Errors
/// Returns a storage error if the lookup fails.
pub async fn list_conversations(
    Identity(user): Identity,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let conversations = state.message_service.list_previews(&user).await?;
    Ok(Json(ConversationsResponse { ok: true, conversations }))
}

/// Full message history with `target`. An absent conversation yields an
/// empty list, not a 404.
///
/// # Errors
/// Returns a storage error if the lookup fails.
pub async fn get_history(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.history(&user, &target).await?;
    Ok(Json(HistoryResponse { ok: true, messages }))
}

/// Sends a message to `target`, then pushes `message_received` to both
/// participants' rooms. The publish is fire-and-forget: the write has already
/// succeeded, so publish failures never change the response.
///
/// # Errors
/// Returns `AppError::Validation` for an empty message without an attachment,
/// and a storage error if the append fails.
pub async fn send_message(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(target): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.message_service.send(&user, &target, body.into()).await?;

    // The partner field is from each recipient's point of view.
    state.realtime.publish(
        &target,
        ChatEvent::MessageReceived { message: message.clone(), conversation_partner: user.clone() },
    );
    state.realtime.publish(
        &user,
        ChatEvent::MessageReceived { message: message.clone(), conversation_partner: target },
    );

    Ok(Json(SendMessageResponse { ok: true, message }))
}

/// Marks all of `target`'s messages in this conversation as read. Notifies
/// `target` only when something actually changed.
///
/// # Errors
/// Returns a storage error if the update fails.
pub async fn mark_read(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<impl IntoResponse> {
    let changed = state.message_service.mark_read(&user, &target).await?;
    if changed {
        state.realtime.publish(&target, ChatEvent::ReadStateChanged { read_by: user });
    }
    Ok(Json(OkResponse { ok: true }))
}

/// Deletes the conversation with `target` and notifies both rooms. Idempotent:
/// deleting an absent conversation succeeds and still publishes.
///
/// # Errors
/// Returns a storage error if the delete fails.
pub async fn delete_conversation(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<impl IntoResponse> {
    state.message_service.delete_conversation(&user, &target).await?;

    state.realtime.publish(
        &user,
        ChatEvent::ConversationDeleted { deleted_by: user.clone(), partner: target.clone() },
    );
    state.realtime.publish(
        &target,
        ChatEvent::ConversationDeleted { deleted_by: user.clone(), partner: user },
    );

    Ok(Json(OkResponse { ok: true }))
}
