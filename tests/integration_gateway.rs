use serde_json::json;
use std::time::Duration;

mod common;

use common::next_event;

#[tokio::test]
async fn message_event_reaches_both_rooms_with_per_recipient_partner() {
    let app = common::TestApp::spawn().await;

    let mut alice_ws = app.connect_ws("alice").await;
    let mut bob_ws = app.connect_ws("bob").await;

    app.send_message("alice", "bob", json!({"text": "hello bob"})).await;

    let event = next_event(&mut bob_ws, Duration::from_secs(5)).await.expect("bob event");
    assert_eq!(event["event"], "message_received");
    assert_eq!(event["conversationPartner"], "alice");
    assert_eq!(event["message"]["text"], "hello bob");
    assert_eq!(event["message"]["from"], "alice");

    let event = next_event(&mut alice_ws, Duration::from_secs(5)).await.expect("alice event");
    assert_eq!(event["event"], "message_received");
    assert_eq!(event["conversationPartner"], "bob");
}

#[tokio::test]
async fn read_event_fires_once_and_only_to_the_other_room() {
    let app = common::TestApp::spawn().await;

    app.send_message("alice", "bob", json!({"text": "unread"})).await;

    let mut alice_ws = app.connect_ws("alice").await;
    let mut bob_ws = app.connect_ws("bob").await;

    // Bob reads; only Alice's room is notified.
    app.mark_read("bob", "alice").await;

    let event = next_event(&mut alice_ws, Duration::from_secs(5)).await.expect("alice event");
    assert_eq!(event["event"], "read_state_changed");
    assert_eq!(event["readBy"], "bob");

    assert!(
        next_event(&mut bob_ws, Duration::from_millis(300)).await.is_none(),
        "the reader's own room must not be notified"
    );

    // A second mark with nothing left to flip publishes nothing.
    app.mark_read("bob", "alice").await;
    assert!(next_event(&mut alice_ws, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn delete_event_reaches_both_rooms() {
    let app = common::TestApp::spawn().await;

    app.send_message("alice", "bob", json!({"text": "doomed"})).await;

    let mut alice_ws = app.connect_ws("alice").await;
    let mut bob_ws = app.connect_ws("bob").await;

    app.delete_chat("alice", "bob").await;

    let event = next_event(&mut alice_ws, Duration::from_secs(5)).await.expect("alice event");
    assert_eq!(event["event"], "conversation_deleted");
    assert_eq!(event["deletedBy"], "alice");
    assert_eq!(event["partner"], "bob");

    let event = next_event(&mut bob_ws, Duration::from_secs(5)).await.expect("bob event");
    assert_eq!(event["event"], "conversation_deleted");
    assert_eq!(event["deletedBy"], "alice");
    assert_eq!(event["partner"], "alice");
}

#[tokio::test]
async fn session_that_never_joins_is_closed() {
    let mut config = common::get_test_config();
    config.websocket.join_timeout_secs = 1;
    let app = common::TestApp::spawn_with_config(config).await;

    let (mut ws, _) =
        tokio_tungstenite::connect_async(app.ws_url.as_str()).await.expect("Failed to connect WS");

    // No join announcement: the server should drop the socket at the deadline.
    assert!(next_event(&mut ws, Duration::from_secs(3)).await.is_none());
}

#[tokio::test]
async fn disconnected_client_simply_misses_events() {
    let app = common::TestApp::spawn().await;

    let bob_ws = app.connect_ws("bob").await;
    drop(bob_ws);

    // Publishing into the torn-down room must not fail the write.
    let resp = app.send_message("alice", "bob", json!({"text": "into the void"})).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    // Reconciliation happens on the next poll.
    let body: serde_json::Value = app.history("bob", "alice").await.json().await.unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}
