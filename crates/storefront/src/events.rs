//! Domain events emitted by the cart store.
//!
//! Events are published on an [`EventBus`] after an operation completes.
//! Subscribers (analytics, UI notifications) run independently; publishing
//! never blocks and never fails the operation that emitted the event.

use chargecart_core::{CartId, Money, VariantId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Something that happened to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded {
        variant_id: VariantId,
        product_handle: String,
        quantity: u32,
        unit_price: Money,
    },
    QuantityChanged {
        variant_id: VariantId,
        previous: u32,
        quantity: u32,
    },
    ItemRemoved {
        variant_id: VariantId,
        quantity: u32,
    },
    CartSynced {
        cart_id: CartId,
        line_count: usize,
    },
    /// The remote cart expired and a fresh one was created from local lines.
    RemoteCartRecreated {
        cart_id: CartId,
    },
    CheckoutStarted {
        checkout_url: String,
        item_count: u32,
        subtotal: Money,
    },
}

impl CartEvent {
    /// Event name used by the analytics backend.
    #[must_use]
    pub const fn analytics_name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "add_to_cart",
            Self::QuantityChanged { .. } => "update_cart",
            Self::ItemRemoved { .. } => "remove_from_cart",
            Self::CartSynced { .. } => "cart_synced",
            Self::RemoteCartRecreated { .. } => "cart_recreated",
            Self::CheckoutStarted { .. } => "checkout_start",
        }
    }
}

/// Broadcast channel for [`CartEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CartEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody is listening.
    pub fn publish(&self, event: CartEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!(event = event.analytics_name(), "No event subscribers");
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
