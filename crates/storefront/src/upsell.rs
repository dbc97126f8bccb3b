//! Bundle and accessory classification over cart lines.
//!
//! These drive promotional behavior only (e.g. the free accessory that comes
//! with the family pack). Pricing always comes from the remote cart.
//!
//! Structured catalog attributes (`tier:`/`category:` product tags) win when
//! present; handle and title text matching is the fallback for products
//! without them.

use chargecart_core::{
    BundleTier, CartLineItem, CurrencyCode, Money, ProductCategory, ProductRef, SelectedOption,
    VariantId,
};

use crate::cart::AddItemInput;
use crate::cart::remote::{CatalogProduct, CatalogSource, RemoteError};

/// Bundle tier implied by the cart contents.
///
/// The first line with a structured tier or a text marker decides;
/// `family`/`3x` is checked before `duo`/`2x`. Defaults to `Single`.
#[must_use]
pub fn detect_bundle_tier(items: &[CartLineItem]) -> BundleTier {
    items.iter().find_map(line_tier).unwrap_or_default()
}

fn line_tier(item: &CartLineItem) -> Option<BundleTier> {
    if let Some(tier) = item.product.tier {
        return Some(tier);
    }

    let text = item.search_text();
    if text.contains("family") || text.contains("3x") {
        Some(BundleTier::Family)
    } else if text.contains("duo") || text.contains("2x") {
        Some(BundleTier::Duo)
    } else {
        None
    }
}

/// Whether a line matching `marker` (case-insensitive, handle or title) is
/// in the cart. Lines categorized as cables never match.
#[must_use]
pub fn has_accessory_in_cart(items: &[CartLineItem], marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    if marker.is_empty() {
        return false;
    }

    items.iter().any(|item| {
        item.product.category != Some(ProductCategory::Cable) && item.search_text().contains(&marker)
    })
}

/// The line added last.
#[must_use]
pub fn most_recently_added(items: &[CartLineItem]) -> Option<&CartLineItem> {
    items.last()
}

// =============================================================================
// Free accessory
// =============================================================================

/// The accessory given away with the family pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeAccessory {
    pub product: ProductRef,
    pub variant_id: VariantId,
    pub selected_options: Vec<SelectedOption>,
    pub currency: CurrencyCode,
}

impl FreeAccessory {
    /// Build from the accessory's catalog product, using its first variant.
    #[must_use]
    pub fn from_catalog(product: &CatalogProduct) -> Option<Self> {
        let variant = product.first_variant()?;

        let mut product_ref = product.product.clone();
        product_ref.category = Some(ProductCategory::Accessory);

        Some(Self {
            product: product_ref,
            variant_id: variant.id.clone(),
            selected_options: variant.selected_options.clone(),
            currency: variant.price.currency_code,
        })
    }

    /// Look the accessory up by handle.
    ///
    /// # Errors
    ///
    /// Returns the catalog error when the lookup fails.
    pub async fn load<C: CatalogSource>(source: &C, handle: &str) -> Result<Option<Self>, RemoteError> {
        Ok(source
            .fetch_product_by_handle(handle)
            .await?
            .as_ref()
            .and_then(Self::from_catalog))
    }

    /// Text used to detect the accessory in the cart.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.product.handle
    }

    /// Promotional line label, e.g. "Wall Charger (FREE with Family Pack)".
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} (FREE with Family Pack)", self.product.title)
    }
}

/// The free accessory to add, when the cart holds a family pack and the
/// accessory is not already there.
#[must_use]
pub fn free_accessory_offer(items: &[CartLineItem], accessory: &FreeAccessory) -> Option<AddItemInput> {
    if detect_bundle_tier(items) != BundleTier::Family {
        return None;
    }
    if has_accessory_in_cart(items, accessory.marker()) {
        return None;
    }

    Some(AddItemInput {
        product: accessory.product.clone(),
        variant_id: accessory.variant_id.clone(),
        variant_title: accessory.label(),
        price: Money::zero(accessory.currency),
        quantity: 1,
        selected_options: accessory.selected_options.clone(),
    })
}
