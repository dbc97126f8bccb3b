//! Integration tests for bundle resolution and the family pack promotion.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chargecart_core::{BundleTier, CableType};
use chargecart_integration_tests::{FakeShopify, usd};
use chargecart_storefront::cart::{CartOptions, CartStore, MemoryStorage};
use chargecart_storefront::catalog::{BundleResolver, DEFAULT_CATALOG_TTL, tiers};
use chargecart_storefront::events::EventBus;
use chargecart_storefront::upsell::{
    FreeAccessory, detect_bundle_tier, free_accessory_offer, has_accessory_in_cart,
};

fn resolver(fake: &FakeShopify) -> BundleResolver<FakeShopify> {
    BundleResolver::new(fake.clone(), DEFAULT_CATALOG_TTL)
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_resolves_all_tiers_in_order() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolution = resolver(&fake).resolve(CableType::Usbc).await;

    assert!(resolution.is_complete());
    let tiers: Vec<_> = resolution.options.iter().map(|o| o.tier).collect();
    assert_eq!(tiers, BundleTier::ALL);

    let family = resolution.option(BundleTier::Family).unwrap();
    assert_eq!(family.price, usd(4990));
    assert_eq!(family.compare_price, usd(14970));
    assert_eq!(family.units, 3);
    assert_eq!(family.badge, Some("Best Value"));
    assert_eq!(family.product.tier, Some(BundleTier::Family));
}

#[tokio::test]
async fn test_missing_tier_degrades_to_fewer_options() {
    let fake = FakeShopify::with_bundles(CableType::Lightning);
    fake.remove_product(&tiers::handle_for(CableType::Lightning, BundleTier::Duo));

    let resolution = resolver(&fake).resolve(CableType::Lightning).await;

    let tiers: Vec<_> = resolution.options.iter().map(|o| o.tier).collect();
    assert_eq!(tiers, [BundleTier::Single, BundleTier::Family]);
    assert_eq!(resolution.missing, [BundleTier::Duo]);
}

#[tokio::test]
async fn test_unknown_cable_catalog_resolves_empty() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolution = resolver(&fake).resolve(CableType::Lightning).await;

    assert!(resolution.options.is_empty());
    assert_eq!(resolution.missing, BundleTier::ALL);
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_fresh_resolution_is_served_from_cache() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolver = resolver(&fake);

    let first = resolver.resolve(CableType::Usbc).await;
    let second = resolver.resolve(CableType::Usbc).await;

    assert_eq!(first, second);
    assert_eq!(fake.product_calls(), 3);
}

#[tokio::test]
async fn test_failed_resolution_is_not_cached() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolver = resolver(&fake);

    fake.set_unavailable(true);
    assert!(resolver.resolve(CableType::Usbc).await.options.is_empty());

    fake.set_unavailable(false);
    assert!(resolver.resolve(CableType::Usbc).await.is_complete());
    assert_eq!(fake.product_calls(), 6);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolver = resolver(&fake);

    resolver.resolve(CableType::Usbc).await;
    resolver.invalidate(CableType::Usbc).await;
    resolver.resolve(CableType::Usbc).await;

    assert_eq!(fake.product_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cold_resolves_share_one_fetch() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    fake.set_delay(Duration::from_millis(100));
    let resolver = resolver(&fake);

    let (first, second) = tokio::join!(
        resolver.resolve(CableType::Usbc),
        resolver.resolve(CableType::Usbc)
    );

    assert_eq!(first, second);
    assert!(first.is_complete());
    assert_eq!(fake.product_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stale_resolution_is_served_while_refreshing() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    let resolver = BundleResolver::new(fake.clone(), Duration::from_secs(60));
    let duo = tiers::handle_for(CableType::Usbc, BundleTier::Duo);

    resolver.resolve(CableType::Usbc).await;
    fake.set_product_price(&duo, 3490);
    tokio::time::advance(Duration::from_secs(61)).await;

    // Stale value comes back immediately
    let stale = resolver.resolve(CableType::Usbc).await;
    assert_eq!(stale.option(BundleTier::Duo).unwrap().price, usd(3990));

    for _ in 0..50 {
        if fake.product_calls() == 6 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Let the refresh store its result
    tokio::time::sleep(Duration::from_millis(10)).await;

    let fresh = resolver.resolve(CableType::Usbc).await;
    assert_eq!(fresh.option(BundleTier::Duo).unwrap().price, usd(3490));
    assert_eq!(fake.product_calls(), 6);
}

// =============================================================================
// Family pack promotion
// =============================================================================

#[tokio::test]
async fn test_family_pack_earns_free_accessory_once() {
    let fake = FakeShopify::with_bundles(CableType::Usbc);
    fake.add_product("wall-charger", "Wall Charger", 1500);
    let store = CartStore::hydrate(
        fake.clone(),
        MemoryStorage::new(),
        EventBus::default(),
        CartOptions::default(),
    );

    let resolution = resolver(&fake).resolve(CableType::Usbc).await;
    let family = resolution.option(BundleTier::Family).unwrap();
    store.add_item(family.to_add_input(1)).await.unwrap();

    let accessory = FreeAccessory::load(&fake, "wall-charger")
        .await
        .unwrap()
        .unwrap();
    let offer = free_accessory_offer(&store.state().items, &accessory).unwrap();
    assert!(offer.price.is_zero());
    store.add_item(offer).await.unwrap();

    let items = store.state().items;
    assert_eq!(detect_bundle_tier(&items), BundleTier::Family);
    assert!(has_accessory_in_cart(&items, accessory.marker()));
    assert!(free_accessory_offer(&items, &accessory).is_none());
    assert_eq!(
        items[1].variant_title,
        "Wall Charger (FREE with Family Pack)"
    );
}

#[tokio::test]
async fn test_missing_accessory_product_loads_nothing() {
    let fake = FakeShopify::new();
    assert!(
        FreeAccessory::load(&fake, "wall-charger")
            .await
            .unwrap()
            .is_none()
    );
}
