//! Emberstone Storefront library.
//!
//! Cart store, Tebex basket reconciliation, and package catalog loading for
//! the Emberstone Minecraft store, plus the HTTP API that exposes them. The
//! binary in `main.rs` adds Sentry, rate limiting, and the listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod basket;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;
pub mod tebex;

use axum::{Router, body::Body, http::Request, routing::get};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router: health check, the static category
/// manifest, and the JSON API, with request IDs and tracing.
pub fn router(state: AppState) -> Router {
    let manifest = state.config().static_dir.join("store-categories.json");

    Router::new()
        .route("/health", get(health))
        .route_service("/store-categories.json", ServeFile::new(manifest))
        .merge(routes::routes())
        .fallback(not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

async fn not_found(uri: axum::http::Uri) -> error::AppError {
    error::AppError::NotFound(uri.path().to_string())
}
