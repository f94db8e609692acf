//! SLA triage service - SLA tracking and case triage for support agents

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sla_triage::clock::SystemClock;
use sla_triage::config::{Config, LogFormat};
use sla_triage::routes::{self, ws};
use sla_triage::state::AppState;
use sla_triage::tasks::escalation_sweep;

#[tokio::main]
async fn main() {
    // Configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sla_triage=info,tower_http=info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr;
    info!(
        "SLA triage v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        listen_addr
    );
    info!(
        warning_pct = config.thresholds.warning_pct,
        resolution_critical_pct = config.thresholds.resolution_critical_pct,
        response_critical_pct = config.thresholds.response_critical_pct,
        "SLA thresholds"
    );
    info!("Event buffer capacity: {}", config.event_buffer_capacity);
    info!("Sweep interval: {}s", config.sweep_interval.as_secs());

    // Create application state
    let state = AppState::new(config, Arc::new(SystemClock::new()));

    // Spawn background tasks
    // 1. Broadcast task - forwards SLA events to WebSocket subscribers
    let broadcast_state = state.clone();
    tokio::spawn(async move {
        ws::broadcast_task(broadcast_state).await;
    });

    // 2. Escalation sweep - re-evaluates SLAs and escalates fresh breaches
    let sweep_state = state.clone();
    tokio::spawn(async move {
        escalation_sweep::escalation_sweep_task(sweep_state).await;
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
