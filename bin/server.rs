// IsItOpen - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use isitopen::api::{build_router, AppState};
use isitopen::{init_tracing, Config, SqliteStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_json);
    config.log_rejected();

    let store = SqliteStore::open(&config.db_path)?;
    let places = store.count_places()?;
    info!(
        db = %config.db_path.display(),
        places,
        expiry_minutes = config.status_policy.expiry_window.num_minutes(),
        conflict_minutes = config.status_policy.conflict_window.num_minutes(),
        "database opened"
    );

    let app = build_router(AppState::new(store, &config));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
