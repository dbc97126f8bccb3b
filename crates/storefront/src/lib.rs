//! Charge Cart Storefront library.
//!
//! The client-side core of the storefront: a cart store that mirrors a
//! Shopify cart, the bundle catalog resolver, upsell classification helpers
//! and the Shopify Storefront API client they run against.
//!
//! # Modules
//!
//! - [`cart`] - Cart store, reconciliation, persistence, remote contract
//! - [`catalog`] - Bundle tier resolution with a short-TTL cache
//! - [`upsell`] - Pure classification helpers over cart lines
//! - [`shopify`] - Storefront API client
//! - [`events`] - Domain event bus
//! - [`services`] - Analytics sink

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod shopify;
pub mod upsell;
