use crate::config::Config;
use crate::services::message_service::MessageService;
use crate::services::realtime::RealtimeChannel;
use crate::storage::ConversationStore;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod chats;
pub mod dto;
pub mod gateway;
pub mod health;
pub mod middleware;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub message_service: MessageService,
    pub realtime: RealtimeChannel,
    pub store: Arc<dyn ConversationStore>,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

/// Configures and returns the application router.
pub fn app_router(
    config: Config,
    message_service: MessageService,
    realtime: RealtimeChannel,
    store: Arc<dyn ConversationStore>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
    let state = AppState { config, message_service, realtime, store, shutdown_rx };

    let api_routes = Router::new()
        .route("/chats", get(chats::list_conversations))
        .route(
            "/chats/{target}",
            get(chats::get_history).post(chats::send_message).delete(chats::delete_conversation),
        )
        .route("/chats/{target}/read", axum::routing::put(chats::mark_read))
        .route("/gateway", get(gateway::websocket_handler));

    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuid,
        ))
        .with_state(state)
}
