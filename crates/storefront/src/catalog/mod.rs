//! Package catalog loading.
//!
//! # Architecture
//!
//! - Category manifest (`store-categories.json`) and package list fetched
//!   over HTTP with `reqwest`
//! - In-memory caching via `moka`, default 5 minute TTL
//! - Shaping (normalization, bucketing, default manifests) lives in
//!   [`categorize`] and never touches the network
//!
//! Fetch failures are logged and surface as empty lists; the store page
//! then shows whatever is left rather than an error.

mod categorize;

pub use categorize::{
    categorize_packages, create_default_categories, normalize_categories, package_refs,
};

use std::sync::Arc;

use emberstone_core::{CategorizedCatalog, Category, Package};
use moka::future::Cache;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CatalogConfig;

/// Errors that can occur while fetching catalog documents.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Source answered with a non-success status.
    #[error("Failed to fetch {url}: {status}")]
    Status { url: String, status: u16 },

    /// Body was not JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Packages(Arc<Vec<Package>>),
}

const CATEGORIES_KEY: &str = "categories";
const PACKAGES_KEY: &str = "packages";

/// Loads and caches the store's categories and packages.
#[derive(Clone)]
pub struct CatalogLoader {
    inner: Arc<CatalogLoaderInner>,
}

struct CatalogLoaderInner {
    client: reqwest::Client,
    categories_url: String,
    packages_url: Option<String>,
    cache: Cache<&'static str, CacheValue>,
}

impl std::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogLoader")
            .field("categories_url", &self.inner.categories_url)
            .field("packages_url", &self.inner.packages_url)
            .finish_non_exhaustive()
    }
}

impl CatalogLoader {
    /// Create a loader for the configured sources.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("emberstone-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CatalogLoaderInner {
                client,
                categories_url: config.categories_url.clone(),
                packages_url: config.packages_url.clone(),
                cache,
            }),
        })
    }

    /// Get the category manifest, normalized and sorted by `order`.
    ///
    /// Returns an empty list when the manifest is unreachable or malformed.
    #[instrument(skip(self))]
    pub async fn fetch_categories(&self) -> Arc<Vec<Category>> {
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(CATEGORIES_KEY).await
        {
            debug!("Cache hit for categories");
            return categories;
        }

        self.load_categories(&self.inner.categories_url).await
    }

    /// Fetch the manifest again, bypassing both this cache and any HTTP
    /// cache in between, and store the result.
    #[instrument(skip(self))]
    pub async fn refresh_categories(&self) -> Arc<Vec<Category>> {
        let millis = chrono::Utc::now().timestamp_millis();
        let separator = if self.inner.categories_url.contains('?') {
            '&'
        } else {
            '?'
        };
        let url = format!("{}{separator}cb={millis}", self.inner.categories_url);

        self.inner.cache.invalidate(CATEGORIES_KEY).await;
        self.load_categories(&url).await
    }

    async fn load_categories(&self, url: &str) -> Arc<Vec<Category>> {
        let document = match self.get_json(url).await {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, "Error fetching categories");
                return Arc::new(Vec::new());
            }
        };

        let categories = Arc::new(normalize_categories(&document));
        self.inner
            .cache
            .insert(CATEGORIES_KEY, CacheValue::Categories(Arc::clone(&categories)))
            .await;
        categories
    }

    /// Get the package list.
    ///
    /// The source may answer with `{ "data": [...] }` or a bare array.
    /// Returns an empty list when no source is configured or the fetch fails.
    #[instrument(skip(self))]
    pub async fn fetch_packages(&self) -> Arc<Vec<Package>> {
        if let Some(CacheValue::Packages(packages)) = self.inner.cache.get(PACKAGES_KEY).await {
            debug!("Cache hit for packages");
            return packages;
        }

        let Some(url) = self.inner.packages_url.as_deref() else {
            info!("No package source configured");
            return Arc::new(Vec::new());
        };

        let document = match self.get_json(url).await {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, "Error fetching packages");
                return Arc::new(Vec::new());
            }
        };

        let packages = Arc::new(packages_from_document(document));
        self.inner
            .cache
            .insert(PACKAGES_KEY, CacheValue::Packages(Arc::clone(&packages)))
            .await;
        packages
    }

    /// Fetch packages and categories together and sort them into buckets.
    pub async fn load_catalog(&self) -> CategorizedCatalog {
        let (packages, categories) = tokio::join!(self.fetch_packages(), self.fetch_categories());
        categorize_packages(&packages, &categories)
    }

    async fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        let response = self
            .inner
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull the package array out of either accepted response shape.
fn packages_from_document(document: Value) -> Vec<Package> {
    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!("Unexpected packages format");
                return Vec::new();
            }
        },
        _ => {
            warn!("Unexpected packages format");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Package>(entry) {
            Ok(package) => Some(package),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable package entry");
                None
            }
        })
        .collect()
}
