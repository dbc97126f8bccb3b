//! Integration tests for the cart store.
//!
//! These run the store against [`FakeShopify`], covering the optimistic
//! update protocol, rollback, cart expiry and persistence.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chargecart_core::{CartId, VariantId};
use chargecart_integration_tests::{FakeShopify, product_ref, usd, variant_for};
use chargecart_storefront::cart::{
    AddItemInput, CartOptions, CartPhase, CartStore, MemoryStorage, RemoteError,
};
use chargecart_storefront::error::CartError;
use chargecart_storefront::events::{CartEvent, EventBus};

type Store = CartStore<FakeShopify, MemoryStorage>;

fn store(fake: &FakeShopify) -> Store {
    store_with(fake, MemoryStorage::new(), CartOptions::default())
}

fn store_with(fake: &FakeShopify, storage: MemoryStorage, options: CartOptions) -> Store {
    CartStore::hydrate(fake.clone(), storage, EventBus::default(), options)
}

fn input(variant: &str, quantity: u32) -> AddItemInput {
    AddItemInput {
        product: product_ref(variant, &format!("Cable {variant}")),
        variant_id: VariantId::new(variant),
        variant_title: "Default Title".to_string(),
        price: usd(2490),
        quantity,
        selected_options: vec![],
    }
}

fn quantity_of(store: &Store, variant: &str) -> Option<u32> {
    store
        .state()
        .find(&VariantId::new(variant))
        .map(|item| item.quantity)
}

fn remote_id(store: &Store) -> CartId {
    store.state().remote_cart_id.unwrap()
}

// =============================================================================
// Local invariants
// =============================================================================

#[tokio::test]
async fn test_adding_same_variant_merges_lines() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.add_item(input("A", 1)).await.unwrap();
    store.add_item(input("A", 2)).await.unwrap();

    let state = store.state();
    assert_eq!(state.items.len(), 1);
    assert_eq!(quantity_of(&store, "A"), Some(3));

    let remote = fake.cart_lines(&remote_id(&store)).unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].quantity, 3);
}

#[tokio::test]
async fn test_lines_keep_insertion_order() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    for variant in ["A", "B", "C"] {
        store.add_item(input(variant, 1)).await.unwrap();
    }
    store.update_quantity(&VariantId::new("A"), 4).await.unwrap();

    let order: Vec<_> = store
        .state()
        .items
        .iter()
        .map(|i| i.variant_id.as_str().to_string())
        .collect();
    assert_eq!(order, ["A", "B", "C"]);
}

#[tokio::test]
async fn test_zero_or_negative_quantity_removes_line() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.add_item(input("C", 5)).await.unwrap();
    store.add_item(input("D", 1)).await.unwrap();

    store.update_quantity(&VariantId::new("C"), 0).await.unwrap();
    store.update_quantity(&VariantId::new("D"), -3).await.unwrap();

    assert!(store.state().items.is_empty());
    assert!(fake.cart_lines(&remote_id(&store)).unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_is_rejected_without_remote_call() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    let err = store.add_item(input("A", 0)).await.unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    let err = store.add_item(input("  ", 1)).await.unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    let err = store
        .update_quantity(&VariantId::new("missing"), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    assert_eq!(fake.cart_calls(), 0);
    assert!(store.state().items.is_empty());
}

#[tokio::test]
async fn test_removing_absent_variant_is_noop() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.remove_item(&VariantId::new("nope")).await.unwrap();
    assert_eq!(fake.cart_calls(), 0);
}

// =============================================================================
// Remote reconciliation
// =============================================================================

#[tokio::test]
async fn test_remote_price_wins_and_local_title_survives() {
    let fake = FakeShopify::new();
    fake.set_cart_price(&VariantId::new("A"), 1990);
    let store = store(&fake);

    let mut promo = input("A", 1);
    promo.price = usd(9900);
    promo.variant_title = "Wall Charger (FREE with Family Pack)".to_string();
    store.add_item(promo).await.unwrap();

    let state = store.state();
    let line = state.find(&VariantId::new("A")).unwrap();
    assert_eq!(line.price, usd(1990));
    assert_eq!(line.variant_title, "Wall Charger (FREE with Family Pack)");
    assert!(!line.is_pending());
    assert_eq!(store.subtotal(), usd(1990));
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.add_item(input("A", 2)).await.unwrap();
    store.add_item(input("B", 1)).await.unwrap();

    store.sync_cart().await;
    let first = store.state();
    store.sync_cart().await;

    assert_eq!(store.state(), first);
    assert_eq!(store.phase(), CartPhase::Idle);
}

#[tokio::test]
async fn test_sync_without_remote_cart_does_nothing() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.sync_cart().await;
    assert_eq!(fake.cart_calls(), 0);
}

#[tokio::test]
async fn test_checkout_url_follows_cart_contents() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    assert!(store.checkout_url().is_none());

    store.add_item(input("A", 1)).await.unwrap();
    let url = store.checkout_url().unwrap();
    assert!(url.starts_with("https://charge.test/cart/c/"));
    assert_eq!(store.begin_checkout(), Some(url));

    store.remove_item(&VariantId::new("A")).await.unwrap();
    assert!(store.checkout_url().is_none());
    assert!(store.begin_checkout().is_none());
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_failed_update_restores_previous_quantity() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    store.add_item(input("A", 2)).await.unwrap();

    fake.set_unavailable(true);
    let err = store
        .update_quantity(&VariantId::new("A"), 5)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CartError::RemoteUnavailable(RemoteError::Unavailable(_))
    ));
    assert_eq!(quantity_of(&store, "A"), Some(2));
    assert!(!store.state().is_loading);
}

#[tokio::test]
async fn test_failed_remove_restores_line_in_place() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    for variant in ["A", "B", "C"] {
        store.add_item(input(variant, 1)).await.unwrap();
    }

    fake.set_unavailable(true);
    assert!(store.remove_item(&VariantId::new("B")).await.is_err());

    let state = store.state();
    assert_eq!(state.position(&VariantId::new("B")), Some(1));
    assert_eq!(state.items.len(), 3);
}

#[tokio::test]
async fn test_failed_add_keeps_pending_line_for_retry() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    fake.set_unavailable(true);
    let err = store.add_item(input("A", 1)).await.unwrap_err();
    assert!(matches!(err, CartError::RemoteUnavailable(_)));

    let state = store.state();
    let line = state.find(&VariantId::new("A")).unwrap();
    assert!(line.is_pending());
    assert!(state.checkout_url().is_none());

    // The next mutation carries the pending line along
    fake.set_unavailable(false);
    store.add_item(input("B", 1)).await.unwrap();

    let state = store.state();
    assert!(state.items.iter().all(|i| !i.is_pending()));
    let remote = fake.cart_lines(&remote_id(&store)).unwrap();
    assert_eq!(remote.len(), 2);
}

#[tokio::test]
async fn test_failed_add_to_confirmed_line_is_sent_with_next_add() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    store.add_item(input("A", 1)).await.unwrap();

    fake.set_unavailable(true);
    assert!(store.add_item(input("A", 2)).await.is_err());
    assert_eq!(quantity_of(&store, "A"), Some(3));

    // An unrelated sync must not undo the units still owed to the remote
    fake.set_unavailable(false);
    store.sync_cart().await;
    assert_eq!(quantity_of(&store, "A"), Some(3));

    store.add_item(input("B", 1)).await.unwrap();

    assert_eq!(quantity_of(&store, "A"), Some(3));
    let state = store.state();
    assert!(state.items.iter().all(|i| i.unsynced_quantity == 0));
    let remote = fake.cart_lines(&remote_id(&store)).unwrap();
    let quantities: Vec<_> = remote.iter().map(|l| (l.variant_id.as_str(), l.quantity)).collect();
    assert_eq!(quantities, [("A", 3), ("B", 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_add_applied_remotely_is_not_sent_twice() {
    let fake = FakeShopify::new();
    let options = CartOptions {
        remote_timeout: Duration::from_secs(1),
    };
    let store = store_with(&fake, MemoryStorage::new(), options);
    store.add_item(input("A", 1)).await.unwrap();

    // The remote applies the add, then answers too late
    fake.set_delay_after_apply(Duration::from_secs(5));
    let err = store.add_item(input("A", 2)).await.unwrap_err();
    assert!(matches!(
        err,
        CartError::RemoteUnavailable(RemoteError::Timeout(_))
    ));
    assert_eq!(fake.cart_lines(&remote_id(&store)).unwrap()[0].quantity, 3);

    fake.set_delay_after_apply(Duration::ZERO);
    store.add_item(input("B", 1)).await.unwrap();

    assert_eq!(quantity_of(&store, "A"), Some(3));
    let remote = fake.cart_lines(&remote_id(&store)).unwrap();
    let quantities: Vec<_> = remote.iter().map(|l| (l.variant_id.as_str(), l.quantity)).collect();
    assert_eq!(quantities, [("A", 3), ("B", 1)]);
    assert_eq!(
        fake.call_log(),
        ["create_cart", "add_lines", "get_cart", "add_lines"]
    );
}

#[tokio::test]
async fn test_sync_during_outage_keeps_lines() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    store.add_item(input("A", 1)).await.unwrap();
    store.add_item(input("B", 2)).await.unwrap();
    let before = store.state();
    let mut events = store.events().subscribe();

    fake.set_unavailable(true);
    store.sync_cart().await;

    let after = store.state();
    assert_eq!(after.items, before.items);
    assert_eq!(after.remote_cart_id, before.remote_cart_id);
    assert!(!after.is_syncing);
    assert_eq!(store.phase(), CartPhase::Idle);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_remote_times_out_and_clears_loading() {
    let fake = FakeShopify::new();
    let options = CartOptions {
        remote_timeout: Duration::from_millis(500),
    };
    let store = store_with(&fake, MemoryStorage::new(), options);

    fake.set_delay(Duration::from_secs(30));
    let err = store.add_item(input("A", 1)).await.unwrap_err();

    assert!(matches!(
        err,
        CartError::RemoteUnavailable(RemoteError::Timeout(_))
    ));
    assert!(!store.state().is_loading);
    assert_eq!(store.phase(), CartPhase::Idle);
    assert!(store.state().find(&VariantId::new("A")).is_some());
}

// =============================================================================
// Cart expiry
// =============================================================================

#[tokio::test]
async fn test_expired_cart_on_sync_is_forgotten_then_recreated() {
    let fake = FakeShopify::new();
    let store = store(&fake);

    store.add_item(input("A", 1)).await.unwrap();
    let old = remote_id(&store);
    fake.expire_cart(&old);

    store.sync_cart().await;
    let state = store.state();
    assert!(state.remote_cart_id.is_none());
    assert!(state.checkout_url.is_none());
    assert!(state.items.iter().all(|i| i.is_pending()));

    store.add_item(input("B", 1)).await.unwrap();
    let new = remote_id(&store);
    assert_ne!(new, old);

    let remote = fake.cart_lines(&new).unwrap();
    assert_eq!(remote.len(), 2);
    assert_eq!(fake.carts_created(), 2);
}

#[tokio::test]
async fn test_expired_cart_during_mutation_is_recreated() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    let mut events = store.events().subscribe();

    store.add_item(input("A", 2)).await.unwrap();
    let old = remote_id(&store);
    fake.expire_cart(&old);

    store
        .update_quantity(&VariantId::new("A"), 3)
        .await
        .unwrap();

    let new = remote_id(&store);
    assert_ne!(new, old);
    assert_eq!(fake.cart_lines(&new).unwrap()[0].quantity, 3);
    assert_eq!(quantity_of(&store, "A"), Some(3));

    let mut recreated = false;
    while let Ok(event) = events.try_recv() {
        recreated |= matches!(event, CartEvent::RemoteCartRecreated { .. });
    }
    assert!(recreated);
}

// =============================================================================
// Persistence and concurrency
// =============================================================================

#[tokio::test]
async fn test_cart_survives_rehydration() {
    let fake = FakeShopify::new();
    let storage = MemoryStorage::new();

    let first = store_with(&fake, storage.clone(), CartOptions::default());
    first.add_item(input("A", 2)).await.unwrap();
    let expected = first.state();
    drop(first);

    let second = store_with(&fake, storage, CartOptions::default());
    let state = second.state();
    assert_eq!(state.items, expected.items);
    assert_eq!(state.remote_cart_id, expected.remote_cart_id);
    assert_eq!(second.checkout_url(), expected.checkout_url().map(str::to_string));
}

#[tokio::test]
async fn test_corrupt_storage_hydrates_empty_cart() {
    let fake = FakeShopify::new();
    let store = store_with(
        &fake,
        MemoryStorage::with_payload("{not json"),
        CartOptions::default(),
    );

    assert!(store.state().items.is_empty());
    assert!(store.state().remote_cart_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_mutations_apply_in_order() {
    let fake = FakeShopify::new();
    fake.set_delay(Duration::from_millis(100));
    let store = store(&fake);

    let handles: Vec<_> = (1..=3)
        .map(|quantity| {
            let store = store.clone();
            tokio::spawn(async move { store.add_item(input("A", quantity)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(quantity_of(&store, "A"), Some(6));
    let remote = fake.cart_lines(&remote_id(&store)).unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].quantity, 6);
    assert_eq!(fake.carts_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sync_waits_for_in_flight_mutation() {
    let fake = FakeShopify::new();
    fake.set_delay(Duration::from_millis(100));
    let store = store(&fake);
    let mut states = store.subscribe();

    let adding = tokio::spawn({
        let store = store.clone();
        async move { store.add_item(input("A", 1)).await }
    });
    states.wait_for(|s| s.is_loading).await.unwrap();
    assert_eq!(store.phase(), CartPhase::Mutating);

    let syncing = tokio::spawn({
        let store = store.clone();
        async move { store.sync_cart().await }
    });
    tokio::task::yield_now().await;

    // Queued behind the add
    assert!(!store.state().is_syncing);
    assert_eq!(store.phase(), CartPhase::Mutating);

    states.wait_for(|s| s.is_syncing).await.unwrap();
    assert!(!store.state().is_loading);
    assert_eq!(store.phase(), CartPhase::Syncing);

    adding.await.unwrap().unwrap();
    syncing.await.unwrap();

    assert_eq!(store.phase(), CartPhase::Idle);
    assert_eq!(fake.call_log(), ["create_cart", "get_cart"]);
}

#[tokio::test]
async fn test_successful_mutations_publish_events() {
    let fake = FakeShopify::new();
    let store = store(&fake);
    let mut events = store.events().subscribe();

    store.add_item(input("A", 1)).await.unwrap();
    store.update_quantity(&VariantId::new("A"), 4).await.unwrap();
    store.begin_checkout().unwrap();

    let names: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.analytics_name())
        .collect();
    assert_eq!(names, ["add_to_cart", "update_cart", "checkout_start"]);
}

#[tokio::test]
async fn test_catalog_backed_line_matches_fake_product() {
    let fake = FakeShopify::new();
    fake.add_product("wall-charger", "Wall Charger", 1500);
    let store = store(&fake);

    let mut accessory = input("ignored", 1);
    accessory.variant_id = variant_for("wall-charger");
    store.add_item(accessory).await.unwrap();

    assert_eq!(store.subtotal(), usd(1500));
}
