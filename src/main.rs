//! shm-core service entry point.
//!
//! One stream session per configured structure, plus the operator HTTP
//! surface. Sessions run fully independently; the model manager is loaded
//! once and shared read-only.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shm_core::config::Config;
use shm_core::logic::model::ModelManager;
use shm_core::logic::session::{run_session, SessionContext, StreamSession};
use shm_core::server::{create_router, AppState};
use shm_core::transport::TcpConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shm_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("shm-core starting...");
    tracing::info!("  model dir: {}", config.model_dir.display());
    tracing::info!(
        "  window: {:.1}s @ {:.0} Hz, {} sensors",
        config.window.window_secs,
        config.window.sample_rate_hz,
        config.window.expected_sensors.len()
    );

    let model = Arc::new(
        ModelManager::load(&config.model_dir, config.anomaly_threshold_override)
            .with_context(|| format!("loading model artifacts from {}", config.model_dir.display()))?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sessions = HashMap::new();
    let mut tasks = Vec::new();
    for gateway in &config.gateways {
        let (ctx, notify_rx) = SessionContext::new(gateway.structure_id.clone());
        let session = StreamSession::new(ctx.clone(), model.clone(), &config);
        let connector = Box::new(TcpConnector::new(gateway.addr.clone()));

        tracing::info!(
            structure = %gateway.structure_id,
            gateway = %gateway.addr,
            "starting session"
        );
        tasks.push(tokio::spawn(run_session(
            session,
            connector,
            notify_rx,
            shutdown_rx.clone(),
        )));
        sessions.insert(gateway.structure_id.clone(), ctx);
    }

    let state = AppState {
        model,
        sessions: Arc::new(sessions),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("operator surface listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("http server")?;

    // Stop sessions: no further samples accepted, partial windows released
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("shm-core stopped");
    Ok(())
}
