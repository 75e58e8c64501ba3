//! Catalog route handlers.

use axum::{Json, extract::State};
use emberstone_core::{CategorizedCatalog, CategoryManifest};
use tracing::instrument;

use crate::catalog::create_default_categories;
use crate::state::AppState;

/// Packages sorted into display buckets.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Json<CategorizedCatalog> {
    Json(state.catalog().load_catalog().await)
}

/// Normalized category manifest.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Json<CategoryManifest> {
    let categories = state.catalog().fetch_categories().await;
    Json(CategoryManifest {
        categories: categories.to_vec(),
    })
}

/// Re-read the category manifest past every cache.
#[instrument(skip(state))]
pub async fn refresh(State(state): State<AppState>) -> Json<CategoryManifest> {
    let categories = state.catalog().refresh_categories().await;
    tracing::info!(count = categories.len(), "Categories refreshed");
    Json(CategoryManifest {
        categories: categories.to_vec(),
    })
}

/// A starter manifest derived from the packages' own category labels.
#[instrument(skip(state))]
pub async fn default_categories(State(state): State<AppState>) -> Json<CategoryManifest> {
    let packages = state.catalog().fetch_packages().await;
    Json(create_default_categories(&packages))
}
