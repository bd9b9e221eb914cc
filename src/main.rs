use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use canvas_assist::assistants::{
    AssistantManager, AssistantStore, DatabaseAssistantStore, FileAssistantStore,
    MemoryAssistantStore,
};
use canvas_assist::config::{ServerConfig, StoreBackend};
use canvas_assist::error::DatabaseError;
use canvas_assist::server::app_router;
use canvas_assist::store::{Database, LibSqlBackend};
use canvas_assist::transcription::{HttpTranscriber, Transcriber};

/// Stderr logging, plus a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "canvas-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn open_store(
    backend: &StoreBackend,
) -> Result<Arc<dyn AssistantStore>, DatabaseError> {
    let store: Arc<dyn AssistantStore> = match backend {
        StoreBackend::Sqlite { path } => {
            let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(path).await?);
            Arc::new(DatabaseAssistantStore::new(db))
        }
        StoreBackend::File { path } => Arc::new(FileAssistantStore::new(path.clone())),
        StoreBackend::Memory => Arc::new(MemoryAssistantStore::new()),
    };
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🎨 Canvas Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {:?}", config.store);
    eprintln!("   API: http://0.0.0.0:{}/api/assistants", config.port);
    eprintln!("   WS: ws://0.0.0.0:{}/ws/assistants", config.port);
    eprintln!("   Transcription: http://0.0.0.0:{}/api/whisper/audio", config.port);

    let store = open_store(&config.store)
        .await
        .with_context(|| format!("failed to open assistant store {:?}", config.store))?;
    let manager = AssistantManager::new(store);

    match manager.get_or_create_assistant().await {
        Ok(selected) => info!(
            assistant_id = %selected.assistant_id,
            name = %selected.name,
            "Assistant session started"
        ),
        // Clients can retry through /api/assistants/bootstrap.
        Err(e) => warn!(error = %e, "Assistant bootstrap failed"),
    }

    if config.transcription.api_key.is_none() {
        warn!("GROQ_API_KEY not set; transcription requests will fail");
    }
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(HttpTranscriber::new(config.transcription.clone()));

    let app = app_router(Arc::clone(&manager), transcriber);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.end_session().await;
    Ok(())
}
