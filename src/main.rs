//! Credit Flywheel Service - Main Entry Point
//!
//! Serves approval scoring, dealer next-action recommendations and
//! monitoring over HTTP.

use anyhow::{Context, Result};
use credit_flywheel::{
    api::{create_router, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.logging)?;
    info!("Starting Credit Flywheel Service");
    info!(
        bind_addr = %config.server.bind_addr,
        threshold = config.models.decision_threshold,
        arms = ?config.bandit.default_arms,
        reward_policy = ?config.bandit.reward_policy,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config)?;
    if !state.classifier.is_loaded() {
        warn!(
            path = %config.models.approval_model_path,
            "Serving without an approval model; /predict/approval will return 503"
        );
    }
    info!(
        features = state.classifier.extractor().feature_count(),
        dealers = state.bandit.dealer_count(),
        "Components initialized"
    );

    // Start metrics reporter
    if config.monitoring.report_interval_secs > 0 {
        let reporter =
            MetricsReporter::new(state.monitoring.clone(), config.monitoring.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let monitoring = state.monitoring.clone();
    let app = create_router(state).layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Service shutting down...");
    monitoring.log_summary();

    Ok(())
}

/// Initialize tracing from the logging section; `RUST_LOG` takes precedence
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "credit_flywheel={},tower_http=info",
            logging.level
        ))
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
