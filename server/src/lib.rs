//! HTTP service for per-user todos.
//!
//! # Overview
//! `/api/todos` is the authenticated todo collection, `/api/users` registers
//! callers and `/health` reports liveness. Every body uses the
//! `ApiResponse` envelope.
//!
//! # Design
//! - Handlers make one repository call per step and shape the envelope.
//! - `TodoRepository` turns filters and ownership rules into predicates for
//!   the `TodoStore` persistence client.
//! - The store is constructed once at startup, shared through `AppState`, and
//!   closed on shutdown.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod repository;
pub mod response;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use error::ApiError;
pub use repository::{RepositoryError, TodoRepository};
pub use response::ApiResponse;
pub use store::{MemoryStore, StoreConfig, StoreError, TodoStore};

#[derive(Clone)]
pub struct AppState {
    pub repo: TodoRepository,
}

impl AppState {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self {
            repo: TodoRepository::new(store),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/users", routes::users::router())
        .nest("/api/todos", routes::todos::router(&state))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
