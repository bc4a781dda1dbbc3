use serde_json::{Value, json};
use std::sync::Arc;

mod common;

// Two sides racing their first messages must converge on a single
// conversation document, never two divergent ones.
#[tokio::test]
async fn concurrent_first_sends_create_exactly_one_conversation() {
    let app = Arc::new(common::TestApp::spawn().await);

    let message_count = 24;
    let mut handles = Vec::new();
    for i in 0..message_count {
        let app = Arc::clone(&app);
        let (from, to) = if i % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
        handles.push(tokio::spawn(async move {
            let resp = app.send_message(from, to, json!({"text": format!("race {i}")})).await;
            assert_eq!(resp.status(), reqwest::StatusCode::OK);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for user in ["alice", "bob"] {
        let body: Value = app.list_chats(user).await.json().await.unwrap();
        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1, "{user} must see exactly one conversation");
    }

    let body: Value = app.history("alice", "bob").await.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), message_count, "no message may be lost to the upsert race");
}
