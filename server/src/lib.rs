//! Todo list HTTP API.
//!
//! # Overview
//! Two resources: todo items under `/api/items` and the numeric values each
//! item owns under `/api/items/{itemId}/values`. List endpoints accept
//! OData-style query options (`$filter`, `$orderby`, `$top`, `$skip`,
//! `$count`, `$select`, `$expand`).
//!
//! # Design
//! - `Store` holds the tables for the process lifetime; each request gets its
//!   own `TodoContext` through an extractor.
//! - Deleting an item removes its values in the same storage operation.
//! - The sample item is seeded once per store, guarded by `Initializer`.
//! - Handlers convert every failure into a 4xx `ApiError`; nothing is left
//!   for a global error handler.

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod query;
pub mod seed;

pub use config::ServerConfig;
pub use context::{Store, TodoContext};
pub use error::ApiError;
pub use model::{TodoItem, TodoValue};

use handlers::{items, values};
use seed::Initializer;

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    store: Store,
    initializer: Arc<Initializer>,
}

impl AppState {
    pub fn new(seed: bool) -> Self {
        Self {
            store: Store::new(),
            initializer: Arc::new(Initializer::new(seed)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl FromRef<AppState> for Store {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<Initializer> {
    fn from_ref(state: &AppState) -> Self {
        state.initializer.clone()
    }
}

/// Router over a fresh, seeding store.
pub fn app() -> Router {
    router(AppState::new(true))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/items", get(items::list_all).post(items::create))
        .route(
            "/api/items/{id}",
            get(items::get_by_id).put(items::update).delete(items::delete),
        )
        .route(
            "/api/items/{id}/values",
            get(values::list_values)
                .post(values::add_value)
                .put(values::update_value)
                .delete(values::delete_all_values),
        )
        .route(
            "/api/items/{id}/values/{value_id}",
            get(values::get_value).delete(values::delete_value),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: &ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, router(AppState::new(config.seed))).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
