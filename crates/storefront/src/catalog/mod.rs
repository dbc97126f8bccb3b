//! Bundle catalog resolver.
//!
//! Maps a cable type onto the three purchasable bundle tiers by fetching
//! each tier's product from the catalog and pairing it with the static tier
//! table. Resolutions are cached per cable type; once older than the TTL
//! they are still served while a background refresh runs.

pub mod tiers;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chargecart_core::{
    BundleTier, CableType, Money, ProductCategory, ProductRef, SelectedOption, VariantId,
};
use moka::future::Cache;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::cart::AddItemInput;
use crate::cart::remote::{CatalogProduct, CatalogSource};

/// Default freshness window for resolved bundles.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(300);

/// Entries unused for this long are evicted outright.
const CATALOG_IDLE_EVICTION: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// BundleOption
// =============================================================================

/// A purchasable bundle tier for one cable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOption {
    pub tier: BundleTier,
    pub cable_type: CableType,
    pub name: &'static str,
    /// Current price from Shopify.
    pub price: Money,
    /// Pre-discount reference price.
    pub compare_price: Money,
    pub variant_id: VariantId,
    pub product: ProductRef,
    pub variant_title: String,
    pub badge: Option<&'static str>,
    /// Cables in the bundle.
    pub units: u32,
    pub available: bool,
    pub selected_options: Vec<SelectedOption>,
}

impl BundleOption {
    /// Build the option for `tier` from its catalog product.
    ///
    /// `None` when the product has no variants.
    #[must_use]
    pub fn from_catalog(cable_type: CableType, tier: BundleTier, product: &CatalogProduct) -> Option<Self> {
        let variant = product.first_variant()?;
        let spec = tiers::spec(tier);

        let mut product_ref = product.product.clone();
        product_ref.tier = product_ref.tier.or(Some(tier));
        product_ref.category = product_ref.category.or(Some(ProductCategory::Cable));

        Some(Self {
            tier,
            cable_type,
            name: spec.name,
            price: variant.price,
            compare_price: Money::from_cents(spec.compare_at_cents, variant.price.currency_code),
            variant_id: variant.id.clone(),
            product: product_ref,
            variant_title: variant.title.clone(),
            badge: spec.badge,
            units: tier.units(),
            available: variant.available_for_sale,
            selected_options: variant.selected_options.clone(),
        })
    }

    /// Amount saved against the reference price, never negative.
    #[must_use]
    pub fn savings(&self) -> Money {
        let saved = (self.compare_price.amount - self.price.amount).max(Decimal::ZERO);
        Money::new(saved, self.price.currency_code)
    }

    /// Discount against the reference price, rounded to a whole percent.
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        if self.compare_price.amount <= Decimal::ZERO {
            return 0;
        }
        (self.savings().amount * Decimal::ONE_HUNDRED / self.compare_price.amount)
            .round()
            .to_u32()
            .unwrap_or(0)
    }

    /// Cart input adding `quantity` of this bundle.
    #[must_use]
    pub fn to_add_input(&self, quantity: u32) -> AddItemInput {
        AddItemInput {
            product: self.product.clone(),
            variant_id: self.variant_id.clone(),
            variant_title: self.variant_title.clone(),
            price: self.price,
            quantity,
            selected_options: self.selected_options.clone(),
        }
    }
}

/// Result of resolving one cable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleResolution {
    pub cable_type: CableType,
    /// Resolved options, always in single, duo, family order.
    pub options: Vec<BundleOption>,
    /// Tiers whose product could not be resolved.
    pub missing: Vec<BundleTier>,
}

impl BundleResolution {
    /// Whether every tier resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Option for `tier`, if it resolved.
    #[must_use]
    pub fn option(&self, tier: BundleTier) -> Option<&BundleOption> {
        self.options.iter().find(|o| o.tier == tier)
    }
}

// =============================================================================
// BundleResolver
// =============================================================================

#[derive(Clone)]
struct CachedResolution {
    resolution: BundleResolution,
    fetched_at: Instant,
}

/// Resolves bundle options with a stale-while-revalidate cache.
pub struct BundleResolver<C> {
    inner: Arc<BundleResolverInner<C>>,
}

struct BundleResolverInner<C> {
    source: C,
    ttl: Duration,
    cache: Cache<CableType, CachedResolution>,
    refreshing: Mutex<HashSet<CableType>>,
}

impl<C> Clone for BundleResolver<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CatalogSource> BundleResolver<C> {
    /// Create a resolver serving entries for `ttl` before refreshing them.
    pub fn new(source: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_idle(CATALOG_IDLE_EVICTION)
            .build();

        Self {
            inner: Arc::new(BundleResolverInner {
                source,
                ttl,
                cache,
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Bundle options for `cable_type`.
    ///
    /// Never fails: unresolvable tiers are listed in
    /// [`BundleResolution::missing`].
    #[instrument(skip(self), fields(cable_type = %cable_type))]
    pub async fn resolve(&self, cable_type: CableType) -> BundleResolution {
        if let Some(entry) = self.inner.cache.get(&cable_type).await {
            if entry.fetched_at.elapsed() < self.inner.ttl {
                debug!("Cache hit for bundle options");
            } else {
                debug!("Serving stale bundle options while refreshing");
                self.spawn_refresh(cable_type);
            }
            return entry.resolution;
        }

        // Concurrent misses share one fetch; an empty resolution comes back
        // as the error so it is handed to every waiter without being cached
        let entry = self
            .inner
            .cache
            .try_get_with(cable_type, async {
                let resolution = self.fetch(cable_type).await;
                if resolution.options.is_empty() {
                    Err(resolution)
                } else {
                    Ok(CachedResolution {
                        resolution,
                        fetched_at: Instant::now(),
                    })
                }
            })
            .await;

        match entry {
            Ok(entry) => entry.resolution,
            Err(empty) => Arc::unwrap_or_clone(empty),
        }
    }

    /// Drop the cached resolution for `cable_type`.
    pub async fn invalidate(&self, cable_type: CableType) {
        self.inner.cache.invalidate(&cable_type).await;
    }

    /// Refresh in the background unless a refresh is already running.
    fn spawn_refresh(&self, cable_type: CableType) {
        let started = self
            .inner
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cable_type);
        if !started {
            return;
        }

        let resolver = self.clone();
        tokio::spawn(async move {
            let resolution = resolver.fetch(cable_type).await;
            resolver.store(&resolution).await;
            resolver
                .inner
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&cable_type);
        });
    }

    /// Cache a resolution unless it is empty.
    async fn store(&self, resolution: &BundleResolution) {
        if resolution.options.is_empty() {
            return;
        }
        self.inner
            .cache
            .insert(
                resolution.cable_type,
                CachedResolution {
                    resolution: resolution.clone(),
                    fetched_at: Instant::now(),
                },
            )
            .await;
    }

    async fn fetch(&self, cable_type: CableType) -> BundleResolution {
        let [single, duo, family] = BundleTier::ALL.map(|tier| tiers::handle_for(cable_type, tier));
        let source = &self.inner.source;

        let results = tokio::join!(
            source.fetch_product_by_handle(&single),
            source.fetch_product_by_handle(&duo),
            source.fetch_product_by_handle(&family),
        );
        let results = [
            (&single, results.0),
            (&duo, results.1),
            (&family, results.2),
        ];

        let mut options = Vec::with_capacity(3);
        let mut missing = Vec::new();

        for (tier, (handle, result)) in BundleTier::ALL.into_iter().zip(results) {
            let option = match result {
                Ok(Some(product)) => {
                    let option = BundleOption::from_catalog(cable_type, tier, &product);
                    if option.is_none() {
                        warn!(handle = %handle, tier = %tier, "Bundle product has no variants");
                    }
                    option
                }
                Ok(None) => {
                    warn!(handle = %handle, tier = %tier, "Bundle product not found");
                    None
                }
                Err(e) => {
                    warn!(handle = %handle, tier = %tier, error = %e, "Bundle product fetch failed");
                    None
                }
            };

            match option {
                Some(option) => options.push(option),
                None => missing.push(tier),
            }
        }

        BundleResolution {
            cable_type,
            options,
            missing,
        }
    }
}
