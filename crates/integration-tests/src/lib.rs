//! Integration tests for Charge Cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p chargecart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Cart store behavior against an in-memory Shopify
//! - `bundle_resolver` - Bundle resolution and caching
//! - `storefront_client` - Storefront API client against a mock HTTP server
//!
//! [`FakeShopify`] stands in for the Storefront API in the first two. It
//! keeps carts in memory and can be told to fail, expire carts or respond
//! slowly, either before or after applying a change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chargecart_core::{
    BundleTier, CableType, CartId, CurrencyCode, LineId, Money, ProductId, ProductRef, VariantId,
};
use chargecart_storefront::cart::{
    CartBackend, CatalogProduct, CatalogSource, CatalogVariant, LineInput, RemoteCart, RemoteError,
    RemoteLine,
};
use chargecart_storefront::catalog::tiers;

/// Unit price for variants the fake has no product for.
pub const DEFAULT_UNIT_CENTS: i64 = 2490;

/// In-memory stand-in for the Shopify Storefront API.
///
/// Clones share state, so a test can keep one handle while the store under
/// test owns another.
#[derive(Clone, Default)]
pub struct FakeShopify {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    state: Mutex<FakeState>,
    unavailable: AtomicBool,
    cart_calls: AtomicUsize,
    product_calls: AtomicUsize,
}

#[derive(Default)]
struct FakeState {
    products: HashMap<String, CatalogProduct>,
    carts: HashMap<CartId, Vec<RemoteLine>>,
    prices: HashMap<VariantId, Money>,
    delay: Duration,
    delay_after_apply: Duration,
    calls: Vec<&'static str>,
    next_id: u64,
    created: usize,
}

impl FakeShopify {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store carrying every bundle tier for `cable`.
    #[must_use]
    pub fn with_bundles(cable: CableType) -> Self {
        let fake = Self::new();
        for (tier, cents) in BundleTier::ALL.into_iter().zip([2490, 3990, 4990]) {
            let title = format!("{} {}", cable.label(), tiers::spec(tier).name);
            fake.add_product(&tiers::handle_for(cable, tier), &title, cents);
        }
        fake
    }

    /// Register a single-variant product.
    pub fn add_product(&self, handle: &str, title: &str, cents: i64) {
        let product = catalog_product(handle, title, cents);
        self.lock().products.insert(handle.to_string(), product);
    }

    /// Drop a product from the catalog.
    pub fn remove_product(&self, handle: &str) {
        self.lock().products.remove(handle);
    }

    /// Change a product's price everywhere it is sold.
    pub fn set_product_price(&self, handle: &str, cents: i64) {
        let price = usd(cents);
        let mut state = self.lock();
        if let Some(product) = state.products.get_mut(handle) {
            for variant in &mut product.variants {
                variant.price = price;
            }
        }
    }

    /// Price charged by the remote cart for `variant_id`.
    pub fn set_cart_price(&self, variant_id: &VariantId, cents: i64) {
        self.lock().prices.insert(variant_id.clone(), usd(cents));
    }

    /// Make every call fail with `RemoteError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call before it touches the catalog or a cart.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Delay every cart call after its change is applied, like a server
    /// that commits and then answers slowly.
    pub fn set_delay_after_apply(&self, delay: Duration) {
        self.lock().delay_after_apply = delay;
    }

    /// Forget a cart, as Shopify does when one expires.
    pub fn expire_cart(&self, cart_id: &CartId) {
        self.lock().carts.remove(cart_id);
    }

    /// Lines of a remote cart.
    #[must_use]
    pub fn cart_lines(&self, cart_id: &CartId) -> Option<Vec<RemoteLine>> {
        self.lock().carts.get(cart_id).cloned()
    }

    /// Number of carts ever created.
    #[must_use]
    pub fn carts_created(&self) -> usize {
        self.lock().created
    }

    /// Cart calls received so far.
    #[must_use]
    pub fn cart_calls(&self) -> usize {
        self.inner.cart_calls.load(Ordering::SeqCst)
    }

    /// Product lookups received so far.
    #[must_use]
    pub fn product_calls(&self) -> usize {
        self.inner.product_calls.load(Ordering::SeqCst)
    }

    /// Names of the cart calls received so far, oldest first.
    #[must_use]
    pub fn call_log(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Common prologue of every cart call.
    async fn enter(&self, call: &'static str) -> Result<(), RemoteError> {
        self.inner.cart_calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut state = self.lock();
            state.calls.push(call);
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    /// Common epilogue of every cart call.
    async fn leave(&self, result: Result<RemoteCart, RemoteError>) -> Result<RemoteCart, RemoteError> {
        let delay = self.lock().delay_after_apply;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn with_cart(
        &self,
        cart_id: &CartId,
        change: impl FnOnce(&mut FakeState, &mut Vec<RemoteLine>),
    ) -> Result<RemoteCart, RemoteError> {
        let mut state = self.lock();
        let mut lines = state
            .carts
            .remove(cart_id)
            .ok_or_else(|| RemoteError::NotFound(cart_id.to_string()))?;
        change(&mut *state, &mut lines);
        state.carts.insert(cart_id.clone(), lines.clone());
        Ok(snapshot(cart_id, lines))
    }
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_line(&mut self, lines: &mut Vec<RemoteLine>, input: &LineInput) {
        if let Some(line) = lines.iter_mut().find(|l| l.variant_id == input.variant_id) {
            line.quantity += input.quantity;
            return;
        }

        let id = self.next_id();
        let (product, title) = self
            .products
            .values()
            .find_map(|p| {
                p.variants
                    .iter()
                    .find(|v| v.id == input.variant_id)
                    .map(|v| (p.product.clone(), v.title.clone()))
            })
            .unwrap_or_else(|| {
                let handle = input.variant_id.as_str();
                (product_ref(handle, handle), "Default Title".to_string())
            });
        let unit_price = self.price_of(&input.variant_id);

        lines.push(RemoteLine {
            id: LineId::new(format!("gid://shopify/CartLine/{id}")),
            variant_id: input.variant_id.clone(),
            quantity: input.quantity,
            unit_price,
            line_total: unit_price.times(input.quantity),
            available_for_sale: true,
            variant_title: title,
            product,
            selected_options: vec![],
        });
    }

    fn price_of(&self, variant_id: &VariantId) -> Money {
        if let Some(price) = self.prices.get(variant_id) {
            return *price;
        }
        self.products
            .values()
            .flat_map(|p| &p.variants)
            .find(|v| &v.id == variant_id)
            .map_or_else(|| usd(DEFAULT_UNIT_CENTS), |v| v.price)
    }
}

impl CatalogSource for FakeShopify {
    async fn fetch_product_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<CatalogProduct>, RemoteError> {
        self.inner.product_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.lock().products.get(handle).cloned())
    }
}

impl CartBackend for FakeShopify {
    async fn create_cart(&self, lines: &[LineInput]) -> Result<RemoteCart, RemoteError> {
        self.enter("create_cart").await?;

        let cart = {
            let mut state = self.lock();
            let id = CartId::new(format!("gid://shopify/Cart/c{}", state.next_id()));
            state.created += 1;
            let mut cart_lines = Vec::new();
            for input in lines {
                state.add_line(&mut cart_lines, input);
            }
            state.carts.insert(id.clone(), cart_lines.clone());
            snapshot(&id, cart_lines)
        };
        self.leave(Ok(cart)).await
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineInput],
    ) -> Result<RemoteCart, RemoteError> {
        self.enter("add_lines").await?;
        let result = self.with_cart(cart_id, |state, cart_lines| {
            for input in lines {
                state.add_line(cart_lines, input);
            }
        });
        self.leave(result).await
    }

    async fn update_line(
        &self,
        cart_id: &CartId,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<RemoteCart, RemoteError> {
        self.enter("update_line").await?;
        let result = self.with_cart(cart_id, |_, cart_lines| {
            if quantity == 0 {
                cart_lines.retain(|l| &l.id != line_id);
            } else if let Some(line) = cart_lines.iter_mut().find(|l| &l.id == line_id) {
                line.quantity = quantity;
            }
        });
        self.leave(result).await
    }

    async fn remove_line(&self, cart_id: &CartId, line_id: &LineId) -> Result<RemoteCart, RemoteError> {
        self.enter("remove_line").await?;
        let result = self.with_cart(cart_id, |_, cart_lines| {
            cart_lines.retain(|l| &l.id != line_id);
        });
        self.leave(result).await
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, RemoteError> {
        self.enter("get_cart").await?;
        let result = self.with_cart(cart_id, |_, _| {});
        self.leave(result).await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A USD amount.
#[must_use]
pub fn usd(cents: i64) -> Money {
    Money::from_cents(cents, CurrencyCode::USD)
}

/// Variant id used by the fake for a product handle.
#[must_use]
pub fn variant_for(handle: &str) -> VariantId {
    VariantId::new(format!("gid://shopify/ProductVariant/{handle}"))
}

/// A product reference with no tier or category.
#[must_use]
pub fn product_ref(handle: &str, title: &str) -> ProductRef {
    ProductRef {
        id: ProductId::new(format!("gid://shopify/Product/{handle}")),
        handle: handle.to_string(),
        title: title.to_string(),
        image_url: None,
        tier: None,
        category: None,
    }
}

/// A single-variant catalog product priced at `cents`.
#[must_use]
pub fn catalog_product(handle: &str, title: &str, cents: i64) -> CatalogProduct {
    CatalogProduct {
        product: product_ref(handle, title),
        variants: vec![CatalogVariant {
            id: variant_for(handle),
            title: "Default Title".to_string(),
            price: usd(cents),
            compare_at_price: None,
            available_for_sale: true,
            selected_options: vec![],
        }],
    }
}

fn snapshot(cart_id: &CartId, mut lines: Vec<RemoteLine>) -> RemoteCart {
    for line in &mut lines {
        line.line_total = line.unit_price.times(line.quantity);
    }
    RemoteCart {
        id: cart_id.clone(),
        checkout_url: format!(
            "https://charge.test/cart/c/{}",
            cart_id.as_str().rsplit('/').next().unwrap_or_default()
        ),
        lines,
    }
}
