//! Contract between the cart store and the remote catalog/checkout service.
//!
//! The cart store and bundle resolver only see these traits, so tests can
//! swap Shopify for an in-memory fake.

use std::future::Future;
use std::time::Duration;

use chargecart_core::{CartId, LineId, Money, ProductRef, SelectedOption, VariantId};
use thiserror::Error;

/// Errors returned by remote backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The referenced remote cart no longer exists.
    #[error("remote cart not found: {0}")]
    NotFound(String),

    /// Network failure or non-success response.
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured timeout.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Whether this error means the remote cart has expired.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A purchasable variant in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogVariant {
    pub id: VariantId,
    pub title: String,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub available_for_sale: bool,
    pub selected_options: Vec<SelectedOption>,
}

/// A product with its variants, as returned by a handle lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub product: ProductRef,
    pub variants: Vec<CatalogVariant>,
}

impl CatalogProduct {
    /// The variant bundles sell: the first one listed.
    #[must_use]
    pub fn first_variant(&self) -> Option<&CatalogVariant> {
        self.variants.first()
    }
}

/// One line of a remote cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLine {
    pub id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Effective unit price after line-level discounts.
    pub unit_price: Money,
    /// What the remote cart charges for the whole line.
    pub line_total: Money,
    pub available_for_sale: bool,
    pub variant_title: String,
    pub product: ProductRef,
    pub selected_options: Vec<SelectedOption>,
}

/// Authoritative snapshot of a remote cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCart {
    pub id: CartId,
    pub checkout_url: String,
    pub lines: Vec<RemoteLine>,
}

/// Variant and quantity to send to the remote cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Product lookups used by the bundle resolver.
pub trait CatalogSource: Send + Sync + 'static {
    /// Fetch a product by handle. `Ok(None)` when the handle is unknown.
    fn fetch_product_by_handle(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<Option<CatalogProduct>, RemoteError>> + Send;
}

/// Remote cart operations used by the cart store.
pub trait CartBackend: Send + Sync + 'static {
    /// Create a cart seeded with `lines` (empty for a bare cart).
    fn create_cart(
        &self,
        lines: &[LineInput],
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Add lines; quantities add to existing lines for the same variant.
    fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineInput],
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Set the quantity of an existing line.
    fn update_line(
        &self,
        cart_id: &CartId,
        line_id: &LineId,
        quantity: u32,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Remove a line.
    fn remove_line(
        &self,
        cart_id: &CartId,
        line_id: &LineId,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Fetch the current snapshot. `RemoteError::NotFound` when expired.
    fn get_cart(
        &self,
        cart_id: &CartId,
    ) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;
}
