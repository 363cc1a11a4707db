// Main entry point for the JUNI proxy

use juni_proxy::api::{create_router, AppState};
use juni_proxy::config::Config;
use juni_proxy::guard::PiiGuardClient;
use juni_proxy::metrics::Metrics;
use juni_proxy::proxy::RagClient;

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load and validate configuration first (before any logging)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing subscriber with config values
    init_tracing(&config)?;

    info!("Starting JUNI proxy");
    info!(
        bind_address = %config.bind_address,
        port = config.port,
        rag_base_url = %config.rag.base_url,
        guard_url = %config.guard.base_url,
        guard_fail_mode = ?config.guard_fail_mode,
        "Configuration loaded"
    );

    // 3. Metrics registry
    let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);

    // 4. Upstream clients
    let gate = Arc::new(
        PiiGuardClient::from_config(&config, metrics.clone())
            .context("Failed to create PII guard client")?,
    );
    info!("PII guard client initialized");

    let rag = Arc::new(RagClient::from_config(&config).context("Failed to create RAG client")?);
    info!("RAG client initialized");

    // 5. Shared state and router
    let config = Arc::new(config);
    let app_state = AppState::new(config.clone(), gate, rag, metrics);
    let router = create_router(app_state).context("Failed to build router")?;

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %addr, "Failed to bind to address");
            e
        })
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, "Server listening on {}", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // Create filter from RUST_LOG env var or config
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
