//! Cart line types.
//!
//! A [`CartLineItem`] is the local, denormalized view of one purchasable
//! variant in the cart. It carries enough product metadata to render the
//! cart without re-fetching the catalog.

use serde::{Deserialize, Serialize};

use super::catalog::{BundleTier, ProductCategory};
use super::id::{LineId, ProductId, VariantId};
use super::money::Money;

/// Selected option on a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    /// Option name (e.g., "Length", "Connector").
    pub name: String,
    /// Selected value (e.g., "2m", "USB-C").
    pub value: String,
}

/// Product metadata captured when a line is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Shopify product id.
    pub id: ProductId,
    /// URL handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Featured image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Structured bundle tier, when the catalog tags the product with one.
    #[serde(default)]
    pub tier: Option<BundleTier>,
    /// Structured category, when the catalog tags the product with one.
    #[serde(default)]
    pub category: Option<ProductCategory>,
}

/// One line in the local cart, keyed by variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Purchasable variant; unique within a cart.
    pub variant_id: VariantId,
    /// Product snapshot.
    pub product: ProductRef,
    /// Variant label, possibly a local promotional override.
    pub variant_title: String,
    /// Effective unit price.
    pub price: Money,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Variant option selections (display only).
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    /// Remote cart line mirroring this line; `None` until the remote cart
    /// has confirmed it.
    #[serde(default)]
    pub remote_line_id: Option<LineId>,
    /// Last known remote availability.
    #[serde(default = "default_available")]
    pub available_for_sale: bool,
    /// Units added locally that the remote line has not confirmed yet.
    /// Always zero on pending lines, which send their whole quantity.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unsynced_quantity: u32,
    /// Line total as charged by the remote cart, valid for the quantity it
    /// last confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_total: Option<Money>,
}

const fn default_available() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl CartLineItem {
    /// Line total.
    ///
    /// The remote cart's own total while the line matches what it last
    /// confirmed, otherwise unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        match self.remote_total {
            Some(total) if !self.is_pending() && self.unsynced_quantity == 0 => total,
            _ => self.price.times(self.quantity),
        }
    }

    /// Set the quantity locally. The remote total no longer applies.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.unsynced_quantity = 0;
        self.remote_total = None;
    }

    /// Add units locally, tracking what the remote line has not seen.
    pub fn add_quantity(&mut self, quantity: u32) {
        self.quantity = self.quantity.saturating_add(quantity);
        if !self.is_pending() {
            self.unsynced_quantity = self.unsynced_quantity.saturating_add(quantity);
        }
        self.remote_total = None;
    }

    /// Whether the remote cart has never confirmed this line.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.remote_line_id.is_none()
    }

    /// Handle and title, lowercased, for text classification.
    #[must_use]
    pub fn search_text(&self) -> String {
        format!("{} {}", self.product.handle, self.product.title).to_lowercase()
    }
}
