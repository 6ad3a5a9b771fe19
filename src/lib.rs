// Library root - exports for the binary and tests

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{LedgerError, StoreError};
pub use services::{LedgerStore, MemoryLedgerStore, OperationEngine, PgLedgerStore};

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState<S: LedgerStore> {
    pub engine: Arc<OperationEngine<S>>,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            engine: Arc::new(OperationEngine::new(store)),
        }
    }
}

/// All HTTP routes, bound to one storage backend.
pub fn router<S: LedgerStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet::<S>),
        )
        .route("/api/v1/wallets/:id", get(handlers::get_wallet::<S>))
        .route("/api/v1/wallets/:id/operation", post(handlers::apply_operation::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
