//! Charge Cart Core - Shared types library.
//!
//! This crate provides the domain types used across all Charge Cart components:
//! - `storefront` - Cart store, bundle resolver and Shopify client
//! - `cli` - Command-line client for browsing bundles and managing the cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Shopify id newtypes, money, catalog enums and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
