//! Tebex Headless API client.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`; every response body is a `{ "data": ... }`
//!   envelope
//! - Webstore public token in the path, optional private key as HTTP basic
//!   auth for authorized requests
//! - [`TebexBasket`] adapts the client to the [`Basket`](crate::basket::Basket)
//!   contract for one player
//!
//! # Endpoints
//!
//! ```text
//! POST /accounts/{token}/baskets              create basket
//! GET  /accounts/{token}/baskets/{ident}      get basket
//! POST /baskets/{ident}/packages              add package
//! POST /baskets/{ident}/packages/remove       remove package
//! GET  /accounts/{token}/packages             list packages
//! ```

mod basket;

pub use basket::{TebexBasket, TebexConnector};

use std::sync::Arc;

use emberstone_core::PackageId;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::basket::{BasketData, BasketError};
use crate::config::TebexConfig;

/// Errors that can occur when interacting with the Tebex Headless API.
#[derive(Debug, Error)]
pub enum TebexError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Tebex.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<TebexError> for BasketError {
    fn from(err: TebexError) -> Self {
        Self::Provider(Box::new(err))
    }
}

/// Response envelope used by every Tebex Headless endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the Tebex Headless API.
#[derive(Clone)]
pub struct TebexClient {
    inner: Arc<TebexClientInner>,
}

struct TebexClientInner {
    client: reqwest::Client,
    api_url: String,
    public_token: String,
    private_key: Option<SecretString>,
    complete_url: String,
    cancel_url: String,
}

impl std::fmt::Debug for TebexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TebexClient")
            .field("api_url", &self.inner.api_url)
            .field("public_token", &self.inner.public_token)
            .finish_non_exhaustive()
    }
}

impl TebexClient {
    /// Create a new Tebex Headless client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &TebexConfig) -> Result<Self, TebexError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("emberstone-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(TebexClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                public_token: config.public_token.clone(),
                private_key: config.private_key.clone(),
                complete_url: config.complete_url.clone(),
                cancel_url: config.cancel_url.clone(),
            }),
        })
    }

    /// URL of the webstore's package listing.
    #[must_use]
    pub fn packages_url(&self) -> String {
        format!(
            "{}/accounts/{}/packages",
            self.inner.api_url, self.inner.public_token
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.inner.private_key {
            Some(key) => request.basic_auth(&self.inner.public_token, Some(key.expose_secret())),
            None => request,
        }
    }

    /// Send a request and unwrap the `data` envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TebexError> {
        let response = self
            .authorize(request)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(TebexError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Tebex API returned non-success status"
            );
            return Err(TebexError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Tebex response"
            );
            e
        })?;
        Ok(envelope.data)
    }

    /// Create a basket for `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_basket(&self, username: &str) -> Result<BasketData, TebexError> {
        let url = format!(
            "{}/accounts/{}/baskets",
            self.inner.api_url, self.inner.public_token
        );
        let body = serde_json::json!({
            "complete_url": self.inner.complete_url,
            "cancel_url": self.inner.cancel_url,
            "complete_auto_redirect": true,
            "username": username,
        });

        let basket: BasketData = self.send(self.inner.client.post(&url).json(&body)).await?;
        debug!(basket = ?basket.ident, "Basket created");
        Ok(basket)
    }

    /// Get a basket by ident.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_basket(&self, ident: &str) -> Result<BasketData, TebexError> {
        let url = format!(
            "{}/accounts/{}/baskets/{ident}",
            self.inner.api_url, self.inner.public_token
        );
        self.send(self.inner.client.get(&url)).await
    }

    /// Add `quantity` of a package to a basket.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn add_package(
        &self,
        ident: &str,
        package_id: &PackageId,
        quantity: u32,
    ) -> Result<BasketData, TebexError> {
        let url = format!("{}/baskets/{ident}/packages", self.inner.api_url);
        let body = serde_json::json!({
            "package_id": package_id_json(package_id),
            "quantity": quantity,
        });
        self.send(self.inner.client.post(&url).json(&body)).await
    }

    /// Remove a package from a basket.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn remove_package(
        &self,
        ident: &str,
        package_id: &PackageId,
    ) -> Result<BasketData, TebexError> {
        let url = format!("{}/baskets/{ident}/packages/remove", self.inner.api_url);
        let body = serde_json::json!({ "package_id": package_id_json(package_id) });
        self.send(self.inner.client.post(&url).json(&body)).await
    }
}

/// Tebex package ids are numeric; send them as numbers when they are.
fn package_id_json(package_id: &PackageId) -> serde_json::Value {
    package_id
        .as_str()
        .parse::<u64>()
        .map_or_else(|_| serde_json::Value::from(package_id.as_str()), serde_json::Value::from)
}

/// Pull the `error_message` / `message` field out of an error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error_message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("detail"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
