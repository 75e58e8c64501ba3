//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Health check
//! GET  /store-categories.json               - Category manifest (static file)
//!
//! # Catalog
//! GET  /api/catalog                         - Categorized packages
//! GET  /api/catalog/categories              - Normalized categories
//! POST /api/catalog/refresh                 - Cache-busting category refresh
//! GET  /api/catalog/default-categories      - Manifest derived from packages
//!
//! # Carts
//! GET    /api/carts/{cart_id}               - Cart view
//! DELETE /api/carts/{cart_id}               - Clear cart
//! POST   /api/carts/{cart_id}/items         - Add item
//! GET    /api/carts/{cart_id}/items/{id}    - Is the item in the cart
//! DELETE /api/carts/{cart_id}/items/{id}    - Remove item
//! POST   /api/carts/{cart_id}/open          - Show cart
//! POST   /api/carts/{cart_id}/close         - Hide cart
//! POST   /api/carts/{cart_id}/player        - Set the player username
//! POST   /api/carts/{cart_id}/sync          - Replace cart from basket
//! POST   /api/carts/{cart_id}/reconcile     - Run a basket pass now
//! ```

pub mod cart;
pub mod catalog;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/categories", get(catalog::categories))
        .route("/refresh", post(catalog::refresh))
        .route("/default-categories", get(catalog::default_categories))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/{cart_id}", get(cart::show).delete(cart::clear))
        .route("/{cart_id}/items", post(cart::add))
        .route(
            "/{cart_id}/items/{item_id}",
            get(cart::item_status).delete(cart::remove),
        )
        .route("/{cart_id}/open", post(cart::open))
        .route("/{cart_id}/close", post(cart::close))
        .route("/{cart_id}/player", post(cart::identify))
        .route("/{cart_id}/sync", post(cart::sync))
        .route("/{cart_id}/reconcile", post(cart::reconcile))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/catalog", catalog_routes())
        .nest("/api/carts", cart_routes())
}
