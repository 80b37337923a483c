use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::core::{app_state::AppState, config};

/// Requests that outlive this window are answered with 408.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Builds the shared state, attaches the ambient layers and serves the app
/// until ctrl-c / SIGTERM.
pub async fn serve(service_name: &str, app: Router<AppState>) -> Result<()> {
    let config = config::load()?;
    let state = AppState::init(&config).await?;

    let app = app.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
    );

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .context("Failed to bind listener")?;
    tracing::info!(
        "{} listening on {}",
        service_name,
        listener.local_addr().context("Failed to read local addr")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install ctrl-c handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!("Failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
