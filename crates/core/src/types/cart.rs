//! Cart line items and queued basket operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::id::PackageId;

/// An item in the locally visible cart.
///
/// Stored as-is in the `shoppingCart` storage key, so every field except
/// `id` tolerates being absent. A missing `id` deserializes to the empty
/// id and is rejected by the cart store. Fields this type does not name
/// (`features`, `popular`, ...) are kept in `extra` and written back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub id: PackageId,
    #[serde(default)]
    pub name: String,
    /// Display price as shown to the player, e.g. `"$9.99"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CartItem {
    /// Create a cart item with just an id, name and display price.
    #[must_use]
    pub fn new(id: impl Into<PackageId>, name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: price.into(),
            ..Self::default()
        }
    }
}

/// Accept strings, numbers and `null` for display fields.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Kind of a queued basket mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Remove,
}

/// A cart mutation waiting to be replayed against the external basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub item_id: PackageId,
    pub timestamp: DateTime<Utc>,
}

impl PendingOperation {
    /// Queue an add of `item_id`, stamped now.
    #[must_use]
    pub fn add(item_id: PackageId) -> Self {
        Self {
            kind: OperationKind::Add,
            item_id,
            timestamp: Utc::now(),
        }
    }

    /// Queue a removal of `item_id`, stamped now.
    #[must_use]
    pub fn remove(item_id: PackageId) -> Self {
        Self {
            kind: OperationKind::Remove,
            item_id,
            timestamp: Utc::now(),
        }
    }
}
