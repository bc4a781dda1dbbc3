use crate::api::AppState;
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use opentelemetry::global;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{Instrument, warn};
use uuid::Uuid;

/// First frame a client must send after connecting: the identifier of the
/// room it joins, which is its own username.
#[derive(Debug, Deserialize)]
struct JoinFrame {
    join: String,
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let join_timeout = Duration::from_secs(state.config.websocket.join_timeout_secs);
    let Some(user) = await_join(&mut socket, join_timeout).await else {
        let _ = socket.close().await;
        return;
    };

    let span = tracing::info_span!(
        "websocket_session",
        user = %user,
        otel.kind = "server",
        ws.session_id = %Uuid::new_v4()
    );

    async move {
        let meter = global::meter("parley-server");
        let active_connections = meter
            .i64_up_down_counter("parley_ws_active_connections")
            .with_description("Number of active WebSocket sessions")
            .build();
        active_connections.add(1, &[]);

        tracing::info!("WebSocket connected");
        let mut rx = state.realtime.subscribe(&user);

        let (mut ws_sink, mut ws_stream) = socket.split();
        let mut shutdown_rx = state.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                        // Clients only announce once; anything else inbound is ignored.
                        Some(Ok(_)) => {}
                    }
                }

                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            match serde_json::to_string(&event) {
                                Ok(json) => {
                                    if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "Failed to encode event frame");
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Best-effort delivery: the client reconciles on its next poll.
                            warn!(missed, "Session lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
    .instrument(span)
    .await;
}

/// Waits for the join announcement. Returns `None` on timeout, disconnect, or
/// a malformed first text frame.
async fn await_join(socket: &mut WebSocket, timeout: Duration) -> Option<String> {
    let announced = tokio::time::timeout(timeout, async {
        while let Some(Ok(frame)) = socket.recv().await {
            if let WsMessage::Text(text) = frame {
                match serde_json::from_str::<JoinFrame>(&text) {
                    Ok(JoinFrame { join }) => {
                        let user = join.trim().to_string();
                        if user.is_empty() {
                            warn!("Join announcement with empty identifier");
                            return None;
                        }
                        return Some(user);
                    }
                    Err(e) => {
                        warn!(error = %e, "Invalid join announcement");
                        return None;
                    }
                }
            }
            // Pings and other control frames may arrive first.
        }
        None
    })
    .await;

    match announced {
        Ok(user) => user,
        Err(_) => {
            warn!("WebSocket joined no room before the handshake timeout");
            None
        }
    }
}
