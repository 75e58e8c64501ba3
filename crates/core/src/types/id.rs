//! Identifier types for packages and carts.
//!
//! Package ids come from the store backend as either JSON numbers or
//! strings. They are always compared in their string form, so [`PackageId`]
//! normalizes both on the way in.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a purchasable package.
///
/// Deserializes from a JSON string or number; `null` and a missing value
/// (via `#[serde(default)]`) become the empty id, which callers treat as
/// "no id".
///
/// ```
/// use emberstone_core::PackageId;
///
/// let from_number: PackageId = serde_json::from_str("3307111").unwrap();
/// let from_string: PackageId = serde_json::from_str("\"3307111\"").unwrap();
/// assert_eq!(from_number, from_string);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Create a package id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is missing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the id and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Normalize an arbitrary JSON value into an id.
    ///
    /// Strings are taken verbatim, numbers are stringified, objects
    /// contribute their `id` field. Anything else yields `None`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(number_to_string(n))),
            serde_json::Value::Object(map) => map.get("id").and_then(Self::from_json),
            _ => None,
        }
    }
}

/// Stringify a JSON number the way a browser would (`5.0` becomes `"5"`).
fn number_to_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string())
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(s)) => Self(s),
            Some(Raw::Number(n)) => Self(number_to_string(&n)),
            None => Self::default(),
        })
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PackageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for PackageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Errors that can occur when parsing a [`CartId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartIdError {
    /// The input string is empty.
    #[error("cart id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("cart id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("cart id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identifier of a browser cart.
///
/// Cart ids name a storage directory, so they are restricted to ASCII
/// letters, digits, `_` and `-`.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Characters: `[A-Za-z0-9_-]`
///
/// ## Examples
///
/// ```
/// use emberstone_core::CartId;
///
/// assert!(CartId::parse("b7f1c0de-guest").is_ok());
/// assert!(CartId::parse("").is_err());
/// assert!(CartId::parse("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CartId(String);

impl CartId {
    /// Maximum length of a cart id.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `CartId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 64 characters, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(s: &str) -> Result<Self, CartIdError> {
        if s.is_empty() {
            return Err(CartIdError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(CartIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(CartIdError::InvalidCharacter(c));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the cart id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CartId {
    type Error = CartIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CartId> for String {
    fn from(id: CartId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_from_number_and_string() {
        let a: PackageId = serde_json::from_str("42").unwrap();
        let b: PackageId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn test_package_id_null_is_empty() {
        let id: PackageId = serde_json::from_str("null").unwrap();
        assert!(id.is_empty());
    }

    #[test]
    fn test_package_id_integral_float() {
        let id: PackageId = serde_json::from_str("7.0").unwrap();
        assert_eq!(id.as_str(), "7");
    }

    #[test]
    fn test_package_id_from_json_object() {
        let value = serde_json::json!({ "id": 3307111, "name": "VIP" });
        assert_eq!(
            PackageId::from_json(&value),
            Some(PackageId::from("3307111"))
        );
        assert_eq!(PackageId::from_json(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_package_id_serializes_as_string() {
        let id = PackageId::from(12_u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"12\"");
    }

    #[test]
    fn test_cart_id_valid() {
        let id = CartId::parse("guest_01-abc").unwrap();
        assert_eq!(id.as_str(), "guest_01-abc");
        assert_eq!(id.to_string(), "guest_01-abc");
    }

    #[test]
    fn test_cart_id_empty() {
        assert_eq!(CartId::parse(""), Err(CartIdError::Empty));
    }

    #[test]
    fn test_cart_id_too_long() {
        let long = "a".repeat(CartId::MAX_LENGTH + 1);
        assert!(matches!(
            CartId::parse(&long),
            Err(CartIdError::TooLong { max: 64 })
        ));
    }

    #[test]
    fn test_cart_id_rejects_path_separators() {
        assert_eq!(
            CartId::parse("../cart"),
            Err(CartIdError::InvalidCharacter('.'))
        );
        assert_eq!(
            CartId::parse("a/b"),
            Err(CartIdError::InvalidCharacter('/'))
        );
    }

    #[test]
    fn test_cart_id_deserialize_validates() {
        assert!(serde_json::from_str::<CartId>("\"ok-id\"").is_ok());
        assert!(serde_json::from_str::<CartId>("\"bad id\"").is_err());
    }
}
