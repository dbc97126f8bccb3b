//! Domain types for Shopify Storefront API.
//!
//! These types provide a clean, ergonomic API separate from the raw GraphQL
//! response shapes in `storefront::queries`.

use chargecart_core::{
    BundleTier, CartId, LineId, Money, ProductCategory, ProductId, ProductRef, SelectedOption,
    VariantId,
};
use serde::{Deserialize, Serialize};

/// Tag prefix carrying the structured bundle tier (e.g. `tier:family`).
pub const TIER_TAG_PREFIX: &str = "tier:";

/// Tag prefix carrying the structured category (e.g. `category:accessory`).
pub const CATEGORY_TAG_PREFIX: &str = "category:";

// =============================================================================
// Image Types
// =============================================================================

/// Product or variant image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Alt text for accessibility.
    pub alt_text: Option<String>,
}

// =============================================================================
// Product Types
// =============================================================================

/// A product variant (specific combination of options).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Variant ID.
    pub id: VariantId,
    /// Variant title (combination of option values).
    pub title: String,
    /// Whether this variant is available for sale.
    pub available_for_sale: bool,
    /// Current price.
    pub price: Money,
    /// Compare-at price (original price if on sale).
    pub compare_at_price: Option<Money>,
    /// Selected options for this variant.
    pub selected_options: Vec<SelectedOption>,
    /// Variant image.
    pub image: Option<Image>,
}

/// A product in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// URL handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Plain text description.
    pub description: String,
    /// Product type/category.
    pub product_type: String,
    /// Product tags.
    pub tags: Vec<String>,
    /// Featured image.
    pub featured_image: Option<Image>,
    /// Product variants.
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Structured bundle tier from a `tier:<tier>` tag.
    #[must_use]
    pub fn tier(&self) -> Option<BundleTier> {
        tier_from_tags(&self.tags)
    }

    /// Structured category from a `category:<category>` tag, falling back
    /// to the product type.
    #[must_use]
    pub fn category(&self) -> Option<ProductCategory> {
        category_from_tags(&self.tags).or_else(|| self.product_type.parse().ok())
    }

    /// Snapshot used by cart lines.
    #[must_use]
    pub fn to_ref(&self) -> ProductRef {
        ProductRef {
            id: self.id.clone(),
            handle: self.handle.clone(),
            title: self.title.clone(),
            image_url: self.featured_image.as_ref().map(|i| i.url.clone()),
            tier: self.tier(),
            category: self.category(),
        }
    }
}

/// Read the first parseable `tier:` tag.
#[must_use]
pub fn tier_from_tags(tags: &[String]) -> Option<BundleTier> {
    tags.iter()
        .filter_map(|t| t.strip_prefix(TIER_TAG_PREFIX))
        .find_map(|v| v.parse().ok())
}

/// Read the first parseable `category:` tag.
#[must_use]
pub fn category_from_tags(tags: &[String]) -> Option<ProductCategory> {
    tags.iter()
        .filter_map(|t| t.strip_prefix(CATEGORY_TAG_PREFIX))
        .find_map(|v| v.parse().ok())
}

// =============================================================================
// Cart Types
// =============================================================================

/// Simplified product info for cart merchandise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandiseProduct {
    /// Product ID.
    pub id: ProductId,
    /// Product handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Product tags.
    pub tags: Vec<String>,
    /// Featured image.
    pub featured_image: Option<Image>,
}

/// Merchandise in a cart line (simplified product variant info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandise {
    /// Variant ID.
    pub id: VariantId,
    /// Variant title.
    pub title: String,
    /// Whether available for sale.
    pub available_for_sale: bool,
    /// Current catalog price.
    pub price: Money,
    /// Selected options.
    pub selected_options: Vec<SelectedOption>,
    /// Variant image.
    pub image: Option<Image>,
    /// Parent product info.
    pub product: CartMerchandiseProduct,
}

impl CartMerchandise {
    /// Product snapshot for a cart line built from remote data.
    #[must_use]
    pub fn product_ref(&self) -> ProductRef {
        ProductRef {
            id: self.product.id.clone(),
            handle: self.product.handle.clone(),
            title: self.product.title.clone(),
            image_url: self
                .product
                .featured_image
                .as_ref()
                .or(self.image.as_ref())
                .map(|i| i.url.clone()),
            tier: tier_from_tags(&self.product.tags),
            category: category_from_tags(&self.product.tags),
        }
    }
}

/// Cost for a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineCost {
    /// Price per unit before line-level discounts.
    pub amount_per_quantity: Money,
    /// Total (after discounts).
    pub total_amount: Money,
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID.
    pub id: LineId,
    /// Quantity.
    pub quantity: i64,
    /// Line cost.
    pub cost: CartLineCost,
    /// Product variant.
    pub merchandise: CartMerchandise,
}

/// Cart cost summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCost {
    /// Subtotal before tax/shipping.
    pub subtotal: Money,
    /// Total amount.
    pub total: Money,
}

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Checkout URL.
    pub checkout_url: String,
    /// Total item quantity.
    pub total_quantity: i64,
    /// Cart cost summary.
    pub cost: CartCost,
    /// Cart lines.
    pub lines: Vec<CartLine>,
}

/// Input for adding a line to cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineInput {
    /// Product variant ID.
    pub merchandise_id: VariantId,
    /// Quantity to add.
    pub quantity: i64,
}

/// Input for updating a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineUpdateInput {
    /// Cart line ID.
    pub id: LineId,
    /// New quantity.
    pub quantity: i64,
}

/// User error from cart mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUserError {
    /// Error code.
    pub code: Option<String>,
    /// Field path that caused the error.
    pub field: Option<Vec<String>>,
    /// Human-readable error message.
    pub message: String,
}

impl CartUserError {
    /// Whether the error reports that the referenced cart no longer exists.
    #[must_use]
    pub fn is_missing_cart(&self) -> bool {
        let on_cart_id = self
            .field
            .as_ref()
            .is_some_and(|f| f.iter().any(|p| p == "cartId"));
        let message = self.message.to_lowercase();
        on_cart_id && (message.contains("does not exist") || message.contains("not found"))
    }
}
