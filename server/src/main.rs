use std::sync::Arc;

use anyhow::Error as AnyhowError;
use thiserror::Error;
use todo_server::{AppState, MemoryStore, ServerConfig, StoreError, TodoStore};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = ServerConfig::from_env();

    let filter_string = format!(
        "warn,todo_server={level},todo_core={level},tower_http={level}",
        level = config.log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|e| AnyhowError::msg(format!("Failed to create tracing filter: {e}")))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let store = match MemoryStore::connect(config.store) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "Failed to connect to the todo store");
            return Err(err.into());
        }
    };
    tracing::info!(
        pool_size = config.store.pool_size,
        "Connected to the todo store"
    );

    let listener = TcpListener::bind(config.bind_addr()).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Server running on http://{addr}");

    let state = AppState::new(store.clone());
    let served = todo_server::run(listener, state, shutdown_signal()).await;

    store.close().await;
    served?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
