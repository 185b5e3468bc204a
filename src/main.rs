use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use quiz_engine::{
    api::{AppState, create_router},
    assistant::AssistantProxy,
    catalog::QuizCatalog,
    config::{Config, LoggingConfig},
    database::SqliteStore,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = setup_logging(&config.logging)?;
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting quiz engine server");

    let catalog = QuizCatalog::load(&config.catalog.path).await?;
    let issues = catalog.validate();
    for issue in &issues {
        tracing::warn!(issue = %issue, "Catalog authoring issue");
    }

    // Provision the durable store shared by quiz engines on this host
    let store = SqliteStore::new(&config.store.url)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.url))?;
    info!(stored_keys = store.keys().await?.len(), "Store ready");

    let state = AppState {
        catalog: Arc::new(catalog),
        assistant: AssistantProxy::from_config(&config.assistant),
    };
    let app = create_router(state);

    let addr = config.server_address();
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info,quiz_engine=debug"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    let mut guard = None;
    let file_layer = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create log directory {}: {}", config.log_directory, e);
        });

        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "quiz-engine.log");
        let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        Some(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking_file),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        file_enabled = config.file_enabled,
        log_directory = %config.log_directory,
        "Logging initialized"
    );

    Ok(guard)
}
