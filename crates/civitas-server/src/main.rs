//! Civitas Server
//!
//! Hate-speech moderation API. Text is classified by a BERT model; uncertain
//! results are escalated to Gemini and every decision is persisted.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use civitas_server::{cors_layer, create_router, AppState, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "civitas-server")]
#[command(about = "Civitas moderation API server", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CIVITAS_CONFIG", default_value = "civitas.yaml")]
    config: String,

    /// Listen address
    #[arg(short = 'l', long, env = "CIVITAS_LISTEN", default_value = "0.0.0.0")]
    listen: String,

    /// Listen port
    #[arg(short = 'P', long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "CIVITAS_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed flags
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    info!("Starting Civitas server");

    let config = ServiceConfig::load(&cli.config)?;
    info!("Configuration loaded successfully");
    info!("Store backend: {:?}", config.store.backend);
    info!("Reddit access: {:?}", config.reddit.auth);

    let metrics_handle = init_metrics()?;

    info!("Initializing application state...");
    let state = AppState::from_config(&config, metrics_handle).await?;
    info!("Application state initialized successfully");

    let app = create_router(state, cors_layer(&config.cors_origins)?);

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("civitas=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("civitas=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "civitas_requests_total",
        "Total number of texts evaluated"
    );
    metrics::describe_counter!(
        "civitas_decisions_total",
        "Moderation decisions by action"
    );
    metrics::describe_counter!(
        "civitas_escalation_failures_total",
        "Escalations that degraded to a sentinel assessment, by kind"
    );
    metrics::describe_counter!(
        "civitas_records_stored_total",
        "Moderation records persisted"
    );
    metrics::describe_histogram!(
        "civitas_pipeline_latency_us",
        metrics::Unit::Microseconds,
        "Pipeline evaluation latency in microseconds"
    );
    metrics::describe_histogram!(
        "civitas_primary_latency_us",
        metrics::Unit::Microseconds,
        "Primary classifier latency in microseconds"
    );
    metrics::describe_counter!("civitas_errors_total", "Total number of errors by stage");

    info!("Metrics exporter initialized");
    Ok(handle)
}
