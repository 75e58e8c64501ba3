//! Core types for the Emberstone store.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod price;

pub use cart::{CartItem, OperationKind, PendingOperation};
pub use catalog::{
    CategorizedCatalog, Category, CategoryGroup, CategoryManifest, Package, UNCATEGORIZED_ID,
};
pub use id::{CartId, CartIdError, PackageId};
pub use price::{format_amount, parse_display_price};
