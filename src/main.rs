use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use checkout_api::config::{init_tracing, load_config};
use checkout_api::db::{establish_connection, run_migrations};
use checkout_api::events::{process_events, EventSender};
use checkout_api::gateway::acquiring::AcquiringClient;
use checkout_api::gateway::PaymentGateway;
use checkout_api::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);

    info!(environment = %config.environment, "Starting checkout API");

    let db = Arc::new(
        establish_connection(&config)
            .await
            .context("failed to connect to the database")?,
    );
    if config.auto_migrate {
        run_migrations(&db)
            .await
            .context("failed to run migrations")?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(process_events(event_rx));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        AcquiringClient::new(config.gateway.clone())
            .map_err(|e| anyhow::anyhow!("failed to build acquiring client: {e}"))?,
    );

    let sweep_interval = Duration::from_secs(config.settlement.sweep_interval_secs);
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::new(db, config, gateway, event_sender);

    spawn_settlement_sweeper(state.clone(), sweep_interval);

    let app = app_router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Periodically reconciles pending orders against the payment gateway.
/// A failed sweep is logged and retried on the next tick.
fn spawn_settlement_sweeper(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.services.settlement.run_sweep().await {
                Ok(summary) => {
                    info!(
                        examined = summary.examined,
                        marked_paid = summary.marked_paid,
                        marked_canceled = summary.marked_canceled,
                        expired = summary.expired,
                        skipped = summary.skipped,
                        "Settlement sweep finished"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Settlement sweep failed");
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
