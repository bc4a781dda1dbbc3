use futures::{SinkExt, StreamExt};
use parley_server::api::app_router;
use parley_server::config::{
    Config, LogFormat, RealtimeConfig, ServerConfig, StorageConfig, TelemetryConfig, WsConfig,
};
use parley_server::services::message_service::MessageService;
use parley_server::services::profiles::NoProfileDirectory;
use parley_server::services::realtime::RealtimeChannel;
use parley_server::storage::ConversationStore;
use parley_server::storage::memory::MemoryConversationStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("parley_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

#[allow(dead_code)]
pub fn get_test_config() -> Config {
    Config {
        database_url: None,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // 0 means let OS choose
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        },
        storage: StorageConfig { max_connections: 5, store_timeout_ms: 5000 },
        realtime: RealtimeConfig { room_channel_capacity: 64, room_gc_interval_secs: 60 },
        websocket: WsConfig { join_timeout_secs: 5 },
        telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
    }
}

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestApp {
    pub server_url: String,
    pub ws_url: String,
    pub client: reqwest::Client,
    // Keeps the shutdown channel open for the lifetime of the test server.
    _shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    #[allow(dead_code)]
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
        let realtime = RealtimeChannel::new(&config.realtime);
        let message_service = MessageService::new(
            Arc::clone(&store),
            Arc::new(NoProfileDirectory),
            Duration::from_millis(config.storage.store_timeout_ms),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = app_router(config, message_service, realtime, store, shutdown_rx);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_url = format!("http://{}", addr);
        let ws_url = format!("ws://{}/api/gateway", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { server_url, ws_url, client: reqwest::Client::new(), _shutdown_tx: shutdown_tx }
    }

    #[allow(dead_code)]
    pub async fn list_chats(&self, user: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/chats", self.server_url))
            .header("x-user", user)
            .send()
            .await
            .unwrap()
    }

    #[allow(dead_code)]
    pub async fn history(&self, user: &str, target: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/chats/{}", self.server_url, target))
            .header("x-user", user)
            .send()
            .await
            .unwrap()
    }

    pub async fn send_message(&self, user: &str, target: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/chats/{}", self.server_url, target))
            .header("x-user", user)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    #[allow(dead_code)]
    pub async fn mark_read(&self, user: &str, target: &str) -> reqwest::Response {
        self.client
            .put(format!("{}/api/chats/{}/read", self.server_url, target))
            .header("x-user", user)
            .send()
            .await
            .unwrap()
    }

    #[allow(dead_code)]
    pub async fn delete_chat(&self, user: &str, target: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}/api/chats/{}", self.server_url, target))
            .header("x-user", user)
            .send()
            .await
            .unwrap()
    }

    /// Connects a WebSocket session and announces `user` as its room.
    #[allow(dead_code)]
    pub async fn connect_ws(&self, user: &str) -> WsClient {
        let (mut ws, _) = connect_async(self.ws_url.as_str()).await.expect("Failed to connect WS");
        ws.send(WsMessage::Text(json!({ "join": user }).to_string().into()))
            .await
            .expect("Failed to send join announcement");
        // Give the server a beat to register the room before events fire.
        tokio::time::sleep(Duration::from_millis(50)).await;
        ws
    }
}

/// Next JSON event frame from the session, or `None` on timeout/disconnect.
#[allow(dead_code)]
pub async fn next_event(ws: &mut WsClient, timeout: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => {
                return serde_json::from_str(&text).ok();
            }
            Ok(Some(Ok(WsMessage::Close(_))) | None) => return None,
            Ok(Some(Ok(_))) => {} // ping/pong
            Ok(Some(Err(_))) | Err(_) => return None,
        }
    }
}
