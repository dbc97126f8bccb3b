//! CLI command implementations.

pub mod bundles;
pub mod cart;

use chargecart_core::{BundleTier, CableType};
use chargecart_storefront::cart::{CartStore, JsonFileStorage, RemoteError};
use chargecart_storefront::catalog::BundleResolver;
use chargecart_storefront::config::ConfigError;
use chargecart_storefront::error::CartError;
use chargecart_storefront::services::AnalyticsError;
use chargecart_storefront::shopify::{ShopifyError, StorefrontClient};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shopify client could not be built.
    #[error("Shopify client error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Analytics sink could not be built.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] RemoteError),

    /// No product for a handle.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Bundle tier did not resolve.
    #[error("{tier} bundle is not available for {cable} cables")]
    BundleUnavailable { cable: CableType, tier: BundleTier },

    /// Nothing to check out.
    #[error("Checkout unavailable: the cart is empty or has not reached Shopify yet")]
    CheckoutUnavailable,
}

/// Everything a command can touch.
pub struct Context {
    pub client: StorefrontClient,
    pub store: CartStore<StorefrontClient, JsonFileStorage>,
    pub resolver: BundleResolver<StorefrontClient>,
    pub free_accessory_handle: String,
}
