//! Integration tests for Emberstone.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emberstone-integration-tests
//! ```
//!
//! Tests drive the storefront router in-process with `tower::ServiceExt`.
//! Tebex and the catalog sources are `wiremock` servers, and carts are
//! written to a temporary data directory.
//!
//! # Test Categories
//!
//! - `storefront_carts` - Cart API
//! - `storefront_catalog` - Catalog API and the static manifest
//! - `basket_sync` - Background reconciliation against a mock Tebex

use std::collections::HashMap;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use emberstone_storefront::config::StorefrontConfig;
use emberstone_storefront::state::AppState;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

/// Public token the mock Tebex account answers to.
pub const TEBEX_TOKEN: &str = "test-token";

/// A storefront wired to mock upstreams.
pub struct TestContext {
    pub app: Router,
    /// Mock Tebex Headless API.
    pub tebex: MockServer,
    /// Mock host for `store-categories.json` and the package list.
    pub catalog: MockServer,
    pub data_dir: TempDir,
}

impl TestContext {
    /// Build a storefront with Tebex enabled.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or application state cannot be set up.
    pub async fn new() -> Self {
        let tebex = MockServer::start().await;
        let catalog = MockServer::start().await;
        let data_dir = tempfile::tempdir().expect("create temp dir");

        let static_dir = data_dir.path().join("static");
        std::fs::create_dir_all(&static_dir).expect("create static dir");
        std::fs::write(
            static_dir.join("store-categories.json"),
            r#"{"categories":[{"id":"vip","name":"VIP","packages":["1"],"order":1}]}"#,
        )
        .expect("write manifest");

        let vars: HashMap<&str, String> = HashMap::from([
            ("STOREFRONT_BASE_URL", "http://localhost:3000".to_string()),
            ("STOREFRONT_DATA_DIR", data_dir.path().display().to_string()),
            ("STOREFRONT_STATIC_DIR", static_dir.display().to_string()),
            (
                "STORE_CATEGORIES_URL",
                format!("{}/store-categories.json", catalog.uri()),
            ),
            ("STORE_PACKAGES_URL", format!("{}/packages", catalog.uri())),
            ("TEBEX_PUBLIC_TOKEN", TEBEX_TOKEN.to_string()),
            ("TEBEX_API_URL", tebex.uri()),
        ]);
        let config = StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
            .expect("valid test configuration");
        let state = AppState::new(config).expect("application state");

        Self {
            app: emberstone_storefront::router(state),
            tebex,
            catalog,
            data_dir,
        }
    }

    /// Send a request and return the status and decoded body.
    ///
    /// Non-JSON bodies come back as a JSON string.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.app.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Wait until the mock Tebex server has seen a request for `path`.
    ///
    /// Background reconciliation runs on spawned tasks, so tests poll for
    /// its effects. Returns whether the request arrived within two seconds.
    pub async fn wait_for_tebex(&self, method: &str, path: &str) -> bool {
        for _ in 0..100 {
            let seen = self
                .tebex
                .received_requests()
                .await
                .unwrap_or_default()
                .iter()
                .any(|r| r.method.as_str() == method && r.url.path() == path);
            if seen {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
