//! Core types for Charge Cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod money;

pub use cart::{CartLineItem, ProductRef, SelectedOption};
pub use catalog::{BundleTier, CableType, ParseCatalogError, ProductCategory};
pub use id::*;
pub use money::{CurrencyCode, Money};
