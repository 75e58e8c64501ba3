//! Emberstone Core - Shared types library.
//!
//! This crate provides common types used across the Emberstone store:
//! - `storefront` - Cart, basket sync, and catalog service
//! - `integration-tests` - End-to-end tests against the storefront API
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Package and cart IDs, cart items, catalog records, price parsing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
