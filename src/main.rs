use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use tree_dashboard::{router, AppState, DashboardConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = DashboardConfig::from_env()?;
    info!(
        path = %config.data_path.display(),
        separator = ?config.load.separator,
        missing_coordinates = ?config.load.missing_coordinates,
        grid_selection = ?config.grid_selection,
        "starting tree dashboard"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config);

    // warm the cache; failures are reported again on every page load
    if let Err(err) = state
        .cache
        .get_or_load(&state.config.data_path, &state.config.load)
        .await
    {
        warn!("tree data not loaded at start-up: {err}");
    }

    let app = router(state);

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
}
