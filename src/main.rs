#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use parley_server::config::Config;
use parley_server::services::message_service::MessageService;
use parley_server::services::profiles::NoProfileDirectory;
use parley_server::services::realtime::RealtimeChannel;
use parley_server::storage::{self, ConversationStore};
use parley_server::{api, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (listener, app_router, shutdown_tx, shutdown_rx, realtime) = async {
        // Phase 1: Storage
        let store: Arc<dyn ConversationStore> = match &config.database_url {
            Some(url) => {
                let pool = storage::init_pool(url, config.storage.max_connections).await?;
                storage::run_migrations(&pool).await?;
                Arc::new(storage::postgres::PgConversationStore::new(pool))
            }
            None => {
                tracing::warn!("No database URL configured, conversations are kept in process memory");
                Arc::new(storage::memory::MemoryConversationStore::new())
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Services
        let realtime = RealtimeChannel::new(&config.realtime);
        let message_service = MessageService::new(
            Arc::clone(&store),
            Arc::new(NoProfileDirectory),
            Duration::from_millis(config.storage.store_timeout_ms),
        );

        // Phase 3: Router and listener
        let app_router = api::app_router(
            config.clone(),
            message_service,
            realtime.clone(),
            store,
            shutdown_rx.clone(),
        );

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        tracing::info!(address = %addr, "listening");
        let listener = tokio::net::TcpListener::bind(addr).await?;

        Ok::<_, anyhow::Error>((listener, app_router, shutdown_tx, shutdown_rx, realtime))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Runtime
    let gc_task = tokio::spawn(realtime.run_gc(config.realtime.room_gc_interval_secs, shutdown_rx.clone()));

    let mut serve_rx = shutdown_rx;
    let server = axum::serve(listener, app_router).with_graceful_shutdown(async move {
        let _ = serve_rx.wait_for(|&stopping| stopping).await;
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful shutdown
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = gc_task => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
