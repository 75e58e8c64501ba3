//! External checkout basket contract and cart reconciliation.
//!
//! # Architecture
//!
//! - [`Basket`] is the collaborator the cart syncs against: one player's
//!   server-side basket with the checkout provider
//! - [`BasketConnector`] hands out `Basket` handles; the composition root
//!   injects one (Tebex when configured, nothing otherwise)
//! - [`Reconciler`] drains the cart's pending operations into the basket
//!
//! Nothing in this module knows about a concrete provider. Implementations
//! live elsewhere (see `crate::tebex`) and convert their errors into
//! [`BasketError`].

mod reconciler;

pub use reconciler::{ReconcileOutcome, Reconciler};

use async_trait::async_trait;
use emberstone_core::{CartItem, PackageId, format_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a basket provider can report.
#[derive(Debug, Error)]
pub enum BasketError {
    /// No basket session exists yet for this handle.
    #[error("No basket has been created")]
    NoBasket,

    /// The provider rejected the request.
    #[error("Basket provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Snapshot of a remote basket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasketData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,
    /// `None` when the provider sent no package list at all.
    #[serde(default)]
    pub packages: Option<Vec<BasketPackage>>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl BasketData {
    /// Whether the basket already holds `package_id`.
    #[must_use]
    pub fn contains(&self, package_id: &PackageId) -> bool {
        self.packages
            .as_ref()
            .is_some_and(|packages| packages.iter().any(|p| &p.id == package_id))
    }
}

/// A package line inside a remote basket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasketPackage {
    #[serde(default)]
    pub id: PackageId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_basket: Option<InBasket>,
}

/// Quantity and price of a package line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InBasket {
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<serde_json::Value>,
}

impl BasketPackage {
    /// Display price: a string price is used verbatim, a numeric one is
    /// rendered as dollars.
    #[must_use]
    pub fn display_price(&self) -> String {
        let raw = self
            .price
            .as_ref()
            .or_else(|| self.in_basket.as_ref().and_then(|b| b.price.as_ref()));

        match raw {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n
                .to_string()
                .parse::<Decimal>()
                .map_or_else(|_| n.to_string(), |d| format!("${}", format_amount(d))),
            _ => String::new(),
        }
    }

    /// Category label: a plain string, or the `name` of a category object.
    #[must_use]
    pub fn category_name(&self) -> Option<String> {
        match self.category.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(map) => map
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            _ => None,
        }
    }

    /// Map the basket line to a local cart item.
    #[must_use]
    pub fn to_cart_item(&self) -> CartItem {
        CartItem {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.display_price(),
            description: self.description.clone(),
            category: self.category_name(),
            image: self.image.clone(),
            url: self.url.clone(),
            extra: serde_json::Map::new(),
        }
    }
}

/// One player's basket with the checkout provider.
///
/// Handles are stateful: they remember the basket ident they created and the
/// last snapshot they saw.
#[async_trait]
pub trait Basket: Send + Sync {
    /// Player the basket belongs to.
    fn username(&self) -> Option<&str>;

    /// Provider-side basket identifier, once one exists.
    fn basket_ident(&self) -> Option<&str>;

    /// Most recent basket snapshot, if any was loaded.
    fn basket_data(&self) -> Option<&BasketData>;

    /// Whether a basket session has been set up for this handle.
    fn has_initialized_basket(&self) -> bool;

    /// Return the basket ident for `username`, creating a basket if needed.
    ///
    /// `Ok(None)` means the provider gave no basket back.
    async fn get_or_create_basket(&mut self, username: &str)
    -> Result<Option<String>, BasketError>;

    /// Load the current contents of basket `ident`.
    async fn fetch_basket(&mut self, ident: &str) -> Result<BasketData, BasketError>;

    async fn add_package_to_basket(
        &mut self,
        package_id: &PackageId,
        quantity: u32,
    ) -> Result<(), BasketError>;

    async fn remove_package_from_basket(&mut self, package_id: &PackageId)
    -> Result<(), BasketError>;
}

/// Source of basket handles.
///
/// Returns `None` while no provider is available; the reconciler asks again
/// on its next pass.
pub trait BasketConnector: Send + Sync {
    fn connect(&self, username: Option<&str>) -> Option<Box<dyn Basket>>;
}

/// Connector for deployments without a checkout provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl BasketConnector for Disconnected {
    fn connect(&self, _username: Option<&str>) -> Option<Box<dyn Basket>> {
        None
    }
}
