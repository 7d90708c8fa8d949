use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classbook::cache::AvailabilityCache;
use classbook::http::{AppState, BASE_PATH, create_router};
use classbook::store::Database;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let metrics_port: Option<u16> = std::env::var("CLASSBOOK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    classbook::observability::init(metrics_port)?;

    let bind = std::env::var("CLASSBOOK_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = env_or("CLASSBOOK_PORT", 8080);
    let data_dir = std::env::var("CLASSBOOK_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = env_or("CLASSBOOK_COMPACT_THRESHOLD", 1000);

    std::fs::create_dir_all(&data_dir)?;
    let journal = PathBuf::from(&data_dir).join("classbook.wal");
    let db = Arc::new(Database::open(&journal)?);

    let state = AppState::from_database(db.clone(), Arc::new(AvailabilityCache::new()));
    state.scheduler.warm().await?;

    let compactor = tokio::spawn(classbook::compactor::run_compactor(
        db.clone(),
        compact_threshold,
        Duration::from_secs(30),
    ));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("classbook listening on http://{addr}{BASE_PATH}");
    info!("  journal: {}", journal.display());
    info!("  users: {}, classes: {}", db.user_count(), db.class_count());
    info!("  compact threshold: {compact_threshold} appends");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    compactor.abort();
    db.shutdown().await;
    info!("classbook stopped");
    Ok(())
}
