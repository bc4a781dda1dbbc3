use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Postgres connection URL; when omitted, conversations are kept in process memory
    #[arg(long, env = "PARLEY_DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub realtime: RealtimeConfig,

    #[command(flatten)]
    pub websocket: WsConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PARLEY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Whole-request timeout in seconds
    #[arg(long, env = "PARLEY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "PARLEY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// Maximum Postgres connections in the pool
    #[arg(long, env = "PARLEY_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Bounded timeout applied to every store operation, in milliseconds
    #[arg(long, env = "PARLEY_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RealtimeConfig {
    /// Buffered events per user room before slow subscribers start lagging
    #[arg(long, env = "PARLEY_ROOM_CHANNEL_CAPACITY", default_value_t = 64)]
    pub room_channel_capacity: usize,

    /// Interval between room registry GC cycles, in seconds
    #[arg(long, env = "PARLEY_ROOM_GC_INTERVAL_SECS", default_value_t = 60)]
    pub room_gc_interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct WsConfig {
    /// How long a new socket may idle before sending its join announcement, in seconds
    #[arg(long, env = "PARLEY_WS_JOIN_TIMEOUT_SECS", default_value_t = 10)]
    pub join_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces and metrics; export is disabled when omitted
    #[arg(long, env = "PARLEY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "PARLEY_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}
