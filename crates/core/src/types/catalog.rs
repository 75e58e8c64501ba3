//! Store catalog records: packages, categories, and categorized output.

use serde::{Deserialize, Serialize};

use super::id::PackageId;

/// Id of the catch-all bucket for packages no category claims.
pub const UNCATEGORIZED_ID: &str = "uncategorized";

/// A purchasable package as returned by the store backend.
///
/// Only the id is interpreted; every other field is carried through
/// untouched so display code sees exactly what the backend sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub id: PackageId,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Package {
    /// Create a package with the given id and no other fields.
    #[must_use]
    pub fn new(id: impl Into<PackageId>) -> Self {
        Self {
            id: id.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Look up a pass-through field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// The package's own category label, when it carries a string one.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.field("category").and_then(serde_json::Value::as_str)
    }
}

/// A named grouping of packages, as listed in `store-categories.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Member package ids, in manifest order.
    #[serde(default)]
    pub packages: Vec<PackageId>,
    #[serde(default)]
    pub order: f64,
}

/// The `store-categories.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryManifest {
    pub categories: Vec<Category>,
}

/// One bucket of categorized packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    pub packages: Vec<Package>,
}

impl CategoryGroup {
    /// Whether this is the catch-all bucket.
    #[must_use]
    pub fn is_uncategorized(&self) -> bool {
        self.id == UNCATEGORIZED_ID
    }
}

/// Packages sorted into display buckets.
///
/// Named categories come first in manifest order; the `uncategorized`
/// bucket, when present, is always last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorizedCatalog {
    groups: Vec<CategoryGroup>,
}

impl CategorizedCatalog {
    /// Wrap already-ordered groups.
    #[must_use]
    pub const fn new(groups: Vec<CategoryGroup>) -> Self {
        Self { groups }
    }

    /// Find a bucket by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// All buckets, in display order.
    #[must_use]
    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn into_groups(self) -> Vec<CategoryGroup> {
        self.groups
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_package_keeps_extra_fields() {
        let json = r#"{"id": 5, "name": "Fly Pass", "price": "$7.99", "category": "game-boosts"}"#;
        let package: Package = serde_json::from_str(json).unwrap();
        assert_eq!(package.id.as_str(), "5");
        assert_eq!(package.category(), Some("game-boosts"));

        let back = serde_json::to_value(&package).unwrap();
        assert_eq!(back["id"], "5");
        assert_eq!(back["price"], "$7.99");
    }

    #[test]
    fn test_package_non_string_category_ignored() {
        let package = Package::new("1").with_field("category", 12);
        assert_eq!(package.category(), None);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = CategorizedCatalog::new(vec![CategoryGroup {
            id: UNCATEGORIZED_ID.to_string(),
            name: "All Packages".to_string(),
            description: "All available packages".to_string(),
            order: None,
            packages: vec![Package::new("1")],
        }]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(UNCATEGORIZED_ID).unwrap().is_uncategorized());
        assert!(catalog.get("vip").is_none());
    }
}
