//! HTTP server that confirms todo changes made optimistically by clients.
//!
//! Keeps the authoritative todo list in a [`record_store::Store`] and
//! exposes it as a small REST API, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use record_store::{Store, observer};
use todos::Todo;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::todos::AppState;

/// Name under which the server's store reports logs and metrics.
pub const STORE_NAME: &str = "todos";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/stats", get(routes::todos::stats))
        .route(
            "/todos",
            get(routes::todos::list).post(routes::todos::create),
        )
        .route(
            "/todos/{id}",
            get(routes::todos::get)
                .patch(routes::todos::update)
                .delete(routes::todos::delete),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over `store` with tracing and metrics observers attached.
pub fn create_state(store: Store<Todo>) -> Arc<AppState> {
    let observers = vec![
        observer::attach_tracing(&store, STORE_NAME),
        observer::attach_metrics(&store, STORE_NAME),
    ];
    Arc::new(AppState { store, observers })
}

/// Creates application state over an empty store.
pub fn create_default_state() -> Arc<AppState> {
    create_state(Store::new())
}
