//! Cart store mirroring one Shopify cart.
//!
//! # Architecture
//!
//! - Local state is the user's intent; Shopify is the source of truth for
//!   prices, availability and checkout
//! - Every mutation is applied locally first, persisted, then pushed to the
//!   remote cart; the remote snapshot is reconciled back in
//! - Operations run one at a time through a fair queue, so syncs never
//!   overlap mutations and same-variant mutations apply in issue order
//! - Subscribers observe state through a `watch` channel; domain events go
//!   out on the [`EventBus`]
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::hydrate(client, JsonFileStorage::new(".chargecart"), bus, CartOptions::default());
//! store.add_item(option.to_add_input(1)).await?;
//! if let Some(url) = store.begin_checkout() {
//!     println!("{url}");
//! }
//! ```

pub mod persist;
pub mod remote;
pub mod state;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chargecart_core::{CartId, CartLineItem, LineId, Money, ProductRef, SelectedOption, VariantId};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use crate::error::{CartError, Result, add_breadcrumb};
use crate::events::{CartEvent, EventBus};

pub use persist::{CartStorage, JsonFileStorage, MemoryStorage, STORAGE_KEY, StorageError};
pub use remote::{
    CartBackend, CatalogProduct, CatalogSource, CatalogVariant, LineInput, RemoteCart,
    RemoteError, RemoteLine,
};
pub use state::{CartState, PersistedCart, reconcile};

/// Default bound for each remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(8);

/// Input for [`CartStore::add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItemInput {
    pub product: ProductRef,
    pub variant_id: VariantId,
    pub variant_title: String,
    pub price: Money,
    pub quantity: u32,
    pub selected_options: Vec<SelectedOption>,
}

/// Store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartOptions {
    /// Upper bound for each remote call; exceeding it fails the operation.
    pub remote_timeout: Duration,
}

impl Default for CartOptions {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// What the store is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPhase {
    Idle,
    Mutating,
    Syncing,
}

/// What to do with local state when the remote half of a mutation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rollback {
    /// Leave the optimistic change visible and retryable.
    Keep,
    /// Put the previous lines back.
    Restore,
}

/// Remote half of a mutation, planned from the state after the local change.
#[derive(Debug)]
enum RemotePlan {
    /// Nothing to tell the remote cart.
    Skip,
    /// Push every outstanding unit, creating the remote cart when there is
    /// none.
    Add,
    Update { line_id: LineId, quantity: u32 },
    Remove(LineId),
}

/// Remote response to a pushed plan.
enum Pushed {
    /// Every outstanding unit was sent, so the snapshot settles them all.
    Outstanding(RemoteCart),
    /// A single line was changed.
    Line(RemoteCart),
}

struct Mutation {
    remote: RemotePlan,
    event: Option<CartEvent>,
}

// =============================================================================
// CartStore
// =============================================================================

/// Cart store over a remote backend `B` and storage `S`.
///
/// Cheap to clone; clones share the same state and queue.
pub struct CartStore<B, S> {
    inner: Arc<CartStoreInner<B, S>>,
}

struct CartStoreInner<B, S> {
    backend: B,
    storage: S,
    events: EventBus,
    options: CartOptions,
    state: watch::Sender<CartState>,
    queue: Mutex<()>,
    /// A remote call timed out and may still have been applied; fetch the
    /// remote cart before pushing outstanding lines again.
    needs_refresh: AtomicBool,
}

impl<B, S> Clone for CartStore<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CartBackend, S: CartStorage> CartStore<B, S> {
    /// Build a store and load the persisted cart.
    ///
    /// A missing, corrupt or incompatible persisted cart yields an empty one.
    pub fn hydrate(backend: B, storage: S, events: EventBus, options: CartOptions) -> Self {
        let state = persist::load(&storage)
            .map(CartState::from_persisted)
            .unwrap_or_default();

        info!(
            lines = state.items.len(),
            has_remote_cart = state.remote_cart_id.is_some(),
            "Cart hydrated"
        );

        Self {
            inner: Arc::new(CartStoreInner {
                backend,
                storage,
                events,
                options,
                state: watch::Sender::new(state),
                queue: Mutex::new(()),
                needs_refresh: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CartPhase {
        let state = self.inner.state.borrow();
        if state.is_loading {
            CartPhase::Mutating
        } else if state.is_syncing {
            CartPhase::Syncing
        } else {
            CartPhase::Idle
        }
    }

    /// Total units in the cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.state.borrow().item_count()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.inner.state.borrow().subtotal()
    }

    /// Checkout URL from the most recent remote response.
    ///
    /// `None` when the cart is empty or no remote cart exists.
    #[must_use]
    pub fn checkout_url(&self) -> Option<String> {
        self.inner.state.borrow().checkout_url().map(str::to_string)
    }

    /// Event bus this store publishes to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Add a variant, or increase its quantity when already present.
    ///
    /// When the remote call fails the added units stay in the cart as
    /// outstanding and the next add pushes them again.
    ///
    /// # Errors
    ///
    /// `CartError::Validation` for an empty variant id or zero quantity (no
    /// remote call is made); `CartError::RemoteUnavailable` when the remote
    /// cart could not be updated.
    #[instrument(skip(self, input), fields(variant_id = %input.variant_id, quantity = input.quantity))]
    pub async fn add_item(&self, input: AddItemInput) -> Result<()> {
        if input.variant_id.is_blank() {
            return Err(CartError::validation("variant id is empty"));
        }
        if input.quantity == 0 {
            return Err(CartError::validation("quantity must be at least 1"));
        }

        self.mutate("add_item", Rollback::Keep, move |state| {
            let quantity = input.quantity;
            let target = input.variant_id.clone();
            let event = CartEvent::ItemAdded {
                variant_id: target.clone(),
                product_handle: input.product.handle.clone(),
                quantity,
                unit_price: input.price,
            };

            match state.items.iter_mut().find(|i| i.variant_id == target) {
                Some(item) => item.add_quantity(quantity),
                None => state.items.push(new_line(input)),
            }

            Ok(Mutation {
                remote: RemotePlan::Add,
                event: Some(event),
            })
        })
        .await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// When the remote call fails the previous quantity is restored.
    ///
    /// # Errors
    ///
    /// `CartError::Validation` when the variant is not in the cart or the
    /// quantity is out of range; `CartError::RemoteUnavailable` when the
    /// remote cart could not be updated.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn update_quantity(&self, variant_id: &VariantId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return self.remove_item(variant_id).await;
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CartError::validation(format!("quantity {quantity} is too large")))?;

        let variant_id = variant_id.clone();
        self.mutate("update_quantity", Rollback::Restore, move |state| {
            let Some(item) = state.items.iter_mut().find(|i| i.variant_id == variant_id) else {
                return Err(CartError::validation(format!(
                    "variant {variant_id} is not in the cart"
                )));
            };
            let previous = item.quantity;
            item.set_quantity(quantity);
            let remote = match &item.remote_line_id {
                Some(line_id) => RemotePlan::Update {
                    line_id: line_id.clone(),
                    quantity,
                },
                None => RemotePlan::Add,
            };

            Ok(Mutation {
                remote,
                event: Some(CartEvent::QuantityChanged {
                    variant_id,
                    previous,
                    quantity,
                }),
            })
        })
        .await
    }

    /// Remove a line. Removing a variant that is not in the cart is a no-op.
    ///
    /// When the remote call fails the line is restored at its position.
    ///
    /// # Errors
    ///
    /// `CartError::RemoteUnavailable` when the remote cart could not be
    /// updated.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn remove_item(&self, variant_id: &VariantId) -> Result<()> {
        let variant_id = variant_id.clone();
        self.mutate("remove_item", Rollback::Restore, move |state| {
            let Some(index) = state.position(&variant_id) else {
                debug!("Variant not in cart; nothing to remove");
                return Ok(Mutation {
                    remote: RemotePlan::Skip,
                    event: None,
                });
            };

            let removed = state.items.remove(index);
            let remote = removed
                .remote_line_id
                .map_or(RemotePlan::Skip, RemotePlan::Remove);

            Ok(Mutation {
                remote,
                event: Some(CartEvent::ItemRemoved {
                    variant_id,
                    quantity: removed.quantity,
                }),
            })
        })
        .await
    }

    /// Refresh local lines from the remote cart.
    ///
    /// No-op without a remote cart. When the remote cart has expired, every
    /// reference to it is dropped so the next mutation creates a new one.
    /// Failures are logged, never returned.
    #[instrument(skip(self))]
    pub async fn sync_cart(&self) {
        let _queue = self.inner.queue.lock().await;

        let remote_cart_id = self.inner.state.borrow().remote_cart_id.clone();
        let Some(cart_id) = remote_cart_id else {
            debug!("No remote cart to sync");
            return;
        };

        self.inner.state.send_modify(|s| s.is_syncing = true);

        match self.bounded(self.inner.backend.get_cart(&cart_id)).await {
            Ok(remote) => {
                let line_count = remote.lines.len();
                self.inner.needs_refresh.store(false, Ordering::SeqCst);
                self.commit(|s| {
                    s.apply_snapshot(&remote);
                    s.is_syncing = false;
                });
                self.inner.events.publish(CartEvent::CartSynced {
                    cart_id: remote.id,
                    line_count,
                });
            }
            Err(RemoteError::NotFound(_)) => {
                info!(cart_id = %cart_id, "Remote cart expired; a new one will be created on the next change");
                self.commit(|s| {
                    s.forget_remote_cart();
                    s.is_syncing = false;
                });
            }
            Err(e) => {
                warn!(cart_id = %cart_id, error = %e, "Cart sync failed");
                self.inner.state.send_modify(|s| s.is_syncing = false);
            }
        }
    }

    /// Checkout URL plus a `CheckoutStarted` event when one is available.
    #[must_use]
    pub fn begin_checkout(&self) -> Option<String> {
        let state = self.state();
        let url = state.checkout_url()?.to_string();

        add_breadcrumb("cart", "Checkout started", Some(&[("checkout_url", url.as_str())]));
        self.inner.events.publish(CartEvent::CheckoutStarted {
            checkout_url: url.clone(),
            item_count: state.item_count(),
            subtotal: state.subtotal(),
        });

        Some(url)
    }

    /// Toggle the cart drawer. UI state only.
    pub fn set_is_open(&self, open: bool) {
        self.inner.state.send_modify(|s| s.is_open = open);
    }

    // =========================================================================
    // Optimistic mutation
    // =========================================================================

    /// Apply `change` locally, push its remote plan, then reconcile or roll
    /// back.
    async fn mutate<F>(&self, operation: &'static str, rollback: Rollback, change: F) -> Result<()>
    where
        F: FnOnce(&mut CartState) -> Result<Mutation>,
    {
        let _queue = self.inner.queue.lock().await;

        let before = self.state();
        let mut next = before.clone();
        let Mutation { remote, event } = change(&mut next)?;

        next.is_loading = true;
        self.commit(|s| *s = next);

        match self.push(remote).await {
            Ok(pushed) => {
                self.commit(|s| {
                    match &pushed {
                        Some(Pushed::Outstanding(remote)) => s.accept_snapshot(remote),
                        Some(Pushed::Line(remote)) => s.apply_snapshot(remote),
                        None => {}
                    }
                    s.is_loading = false;
                });
                if let Some(event) = event {
                    self.inner.events.publish(event);
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                warn!(operation, error = %message, "Remote cart update failed");
                add_breadcrumb(
                    "cart",
                    "Remote cart update failed",
                    Some(&[("operation", operation), ("error", message.as_str())]),
                );

                self.commit(|s| {
                    s.is_loading = false;
                    if rollback == Rollback::Restore {
                        s.items = before.items;
                        if s.remote_cart_id.is_none() {
                            s.forget_remote_cart();
                        }
                    }
                });
                Err(CartError::RemoteUnavailable(e))
            }
        }
    }

    /// Run a remote plan against the current state.
    ///
    /// An expired remote cart is replaced by one seeded with the local lines.
    async fn push(&self, plan: RemotePlan) -> std::result::Result<Option<Pushed>, RemoteError> {
        if matches!(plan, RemotePlan::Skip) {
            return Ok(None);
        }

        let remote_cart_id = self.inner.state.borrow().remote_cart_id.clone();
        let Some(cart_id) = remote_cart_id else {
            // Nothing to refresh without a cart id
            self.inner.needs_refresh.store(false, Ordering::SeqCst);
            return self.create_from_local().await;
        };

        let backend = &self.inner.backend;
        let result = match plan {
            RemotePlan::Skip => return Ok(None),
            RemotePlan::Add => self.add_outstanding(&cart_id).await.map(Pushed::Outstanding),
            RemotePlan::Update { line_id, quantity } => self
                .bounded(backend.update_line(&cart_id, &line_id, quantity))
                .await
                .map(Pushed::Line),
            RemotePlan::Remove(line_id) => self
                .bounded(backend.remove_line(&cart_id, &line_id))
                .await
                .map(Pushed::Line),
        };

        match result {
            Err(RemoteError::NotFound(_)) => {
                warn!(cart_id = %cart_id, "Remote cart expired; recreating from local lines");
                self.commit(CartState::forget_remote_cart);

                let created = self.create_from_local().await?;
                if let Some(Pushed::Outstanding(cart)) = &created {
                    self.inner.events.publish(CartEvent::RemoteCartRecreated {
                        cart_id: cart.id.clone(),
                    });
                }
                Ok(created)
            }
            Err(RemoteError::Timeout(limit)) => {
                self.inner.needs_refresh.store(true, Ordering::SeqCst);
                Err(RemoteError::Timeout(limit))
            }
            other => other.map(Some),
        }
    }

    /// Push pending lines and unsynced units to an existing remote cart.
    ///
    /// After a timed-out call the remote cart is fetched first, so units it
    /// already applied are not sent twice.
    async fn add_outstanding(&self, cart_id: &CartId) -> std::result::Result<RemoteCart, RemoteError> {
        let backend = &self.inner.backend;

        let mut refreshed = None;
        if self.inner.needs_refresh.load(Ordering::SeqCst) {
            let remote = self.bounded(backend.get_cart(cart_id)).await?;
            debug!(cart_id = %cart_id, "Refreshed remote cart after a timed-out call");
            self.commit(|s| s.apply_snapshot(&remote));
            self.inner.needs_refresh.store(false, Ordering::SeqCst);
            refreshed = Some(remote);
        }

        let lines = outstanding_lines(&self.inner.state.borrow());
        if lines.is_empty() {
            return match refreshed {
                Some(remote) => Ok(remote),
                None => self.bounded(backend.get_cart(cart_id)).await,
            };
        }

        self.bounded(backend.add_lines(cart_id, &lines)).await
    }

    /// Create a remote cart seeded with every local line.
    async fn create_from_local(&self) -> std::result::Result<Option<Pushed>, RemoteError> {
        let lines: Vec<LineInput> = self
            .inner
            .state
            .borrow()
            .items
            .iter()
            .map(pending_input)
            .collect();

        if lines.is_empty() {
            return Ok(None);
        }

        let cart = self.bounded(self.inner.backend.create_cart(&lines)).await?;
        info!(cart_id = %cart.id, lines = lines.len(), "Created remote cart");
        Ok(Some(Pushed::Outstanding(cart)))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, RemoteError>>,
    ) -> std::result::Result<T, RemoteError> {
        let limit = self.inner.options.remote_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(limit)))
    }

    /// Update state and write it through to storage.
    fn commit(&self, change: impl FnOnce(&mut CartState)) {
        self.inner.state.send_modify(change);
        let persisted = self.inner.state.borrow().to_persisted();
        persist::save(&self.inner.storage, &persisted);
    }
}

fn new_line(input: AddItemInput) -> CartLineItem {
    CartLineItem {
        variant_id: input.variant_id,
        product: input.product,
        variant_title: input.variant_title,
        price: input.price,
        quantity: input.quantity,
        selected_options: input.selected_options,
        remote_line_id: None,
        available_for_sale: true,
        unsynced_quantity: 0,
        remote_total: None,
    }
}

fn pending_input(item: &CartLineItem) -> LineInput {
    LineInput {
        variant_id: item.variant_id.clone(),
        quantity: item.quantity,
    }
}

/// Pending lines with their whole quantity, confirmed lines with the units
/// the remote cart has not seen.
fn outstanding_lines(state: &CartState) -> Vec<LineInput> {
    state
        .items
        .iter()
        .filter_map(|item| {
            if item.is_pending() {
                Some(pending_input(item))
            } else if item.unsynced_quantity > 0 {
                Some(LineInput {
                    variant_id: item.variant_id.clone(),
                    quantity: item.unsynced_quantity,
                })
            } else {
                None
            }
        })
        .collect()
}
