//! Cart state and reconciliation against remote snapshots.

use chargecart_core::{CartId, CartLineItem, CurrencyCode, Money, VariantId};
use serde::{Deserialize, Serialize};

use super::remote::{RemoteCart, RemoteLine};

/// State owned by a cart store.
///
/// `is_loading`, `is_syncing` and `is_open` are transient and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Lines in first-added order.
    pub items: Vec<CartLineItem>,
    /// Mirrored remote cart, absent until the first successful create.
    pub remote_cart_id: Option<CartId>,
    /// Checkout URL from the most recent remote response.
    pub checkout_url: Option<String>,
    /// A mutation is in flight.
    pub is_loading: bool,
    /// A sync is in flight.
    pub is_syncing: bool,
    /// Cart drawer visibility.
    pub is_open: bool,
}

impl CartState {
    /// Line for `variant_id`.
    #[must_use]
    pub fn find(&self, variant_id: &VariantId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| &i.variant_id == variant_id)
    }

    /// Index of the line for `variant_id`.
    #[must_use]
    pub fn position(&self, variant_id: &VariantId) -> Option<usize> {
        self.items.iter().position(|i| &i.variant_id == variant_id)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of line totals, in the currency of the first line.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        let currency = self
            .items
            .first()
            .map_or(CurrencyCode::default(), |i| i.price.currency_code);

        self.items
            .iter()
            .fold(Money::zero(currency), |acc, item| {
                Money::new(acc.amount + item.line_total().amount, currency)
            })
    }

    /// Checkout URL, or `None` when the cart is empty or has no remote cart.
    #[must_use]
    pub fn checkout_url(&self) -> Option<&str> {
        if self.items.is_empty() || self.remote_cart_id.is_none() {
            return None;
        }
        self.checkout_url.as_deref()
    }

    /// Merge a remote snapshot into local state.
    pub fn apply_snapshot(&mut self, remote: &RemoteCart) {
        self.items = reconcile(&self.items, &remote.lines);
        self.remote_cart_id = Some(remote.id.clone());
        self.checkout_url = Some(remote.checkout_url.clone());
    }

    /// Drop every reference to the remote cart. All lines become pending so
    /// the next mutation seeds a fresh cart with them.
    pub fn forget_remote_cart(&mut self) {
        self.remote_cart_id = None;
        self.checkout_url = None;
        for item in &mut self.items {
            item.remote_line_id = None;
            item.unsynced_quantity = 0;
            item.remote_total = None;
        }
    }

    /// Merge the snapshot returned for a push of every outstanding unit.
    ///
    /// Everything local was delivered, so the remote quantities stand even
    /// where the remote cart accepted fewer units than asked for.
    pub fn accept_snapshot(&mut self, remote: &RemoteCart) {
        for item in &mut self.items {
            item.unsynced_quantity = 0;
            if let Some(line) = remote.lines.iter().find(|l| l.variant_id == item.variant_id) {
                item.quantity = line.quantity;
            }
        }
        self.apply_snapshot(remote);
    }

    /// Durable subset of the state.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedCart {
        PersistedCart {
            items: self.items.clone(),
            remote_cart_id: self.remote_cart_id.clone(),
            checkout_url: self.checkout_url.clone(),
        }
    }

    /// Rebuild state from its durable subset; transient flags start cleared.
    #[must_use]
    pub fn from_persisted(persisted: PersistedCart) -> Self {
        Self {
            items: persisted.items,
            remote_cart_id: persisted.remote_cart_id,
            checkout_url: persisted.checkout_url,
            ..Self::default()
        }
    }
}

/// The persisted form of [`CartState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    pub remote_cart_id: Option<CartId>,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

/// Merge a remote snapshot into local lines.
///
/// - A local line with a matching remote variant takes the remote quantity,
///   price, availability and line id, and keeps its local `variant_title`.
///   Units not yet delivered (a pending line, or unsynced units on a
///   confirmed one) are kept on top of the remote quantity, less whatever
///   the remote line already holds of them.
/// - A confirmed local line absent remotely is dropped.
/// - A pending local line absent remotely is kept.
/// - Remote lines with no local counterpart are appended in remote order.
///
/// Applying the same snapshot twice yields the same lines.
#[must_use]
pub fn reconcile(local: &[CartLineItem], remote: &[RemoteLine]) -> Vec<CartLineItem> {
    let mut merged: Vec<CartLineItem> = local
        .iter()
        .filter_map(|item| {
            match remote.iter().find(|r| r.variant_id == item.variant_id) {
                Some(line) => {
                    let unsynced = if item.is_pending() || item.unsynced_quantity > 0 {
                        item.quantity.saturating_sub(line.quantity)
                    } else {
                        0
                    };
                    Some(CartLineItem {
                        quantity: line.quantity.saturating_add(unsynced),
                        price: line.unit_price,
                        available_for_sale: line.available_for_sale,
                        remote_line_id: Some(line.id.clone()),
                        unsynced_quantity: unsynced,
                        remote_total: Some(line.line_total),
                        ..item.clone()
                    })
                }
                None if item.is_pending() => Some(item.clone()),
                None => None,
            }
        })
        .collect();

    for line in remote {
        if !merged.iter().any(|i| i.variant_id == line.variant_id) {
            merged.push(line_from_remote(line));
        }
    }

    merged
}

fn line_from_remote(line: &RemoteLine) -> CartLineItem {
    CartLineItem {
        variant_id: line.variant_id.clone(),
        product: line.product.clone(),
        variant_title: line.variant_title.clone(),
        price: line.unit_price,
        quantity: line.quantity,
        selected_options: line.selected_options.clone(),
        remote_line_id: Some(line.id.clone()),
        available_for_sale: line.available_for_sale,
        unsynced_quantity: 0,
        remote_total: Some(line.line_total),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chargecart_core::{LineId, ProductId, ProductRef};

    use super::*;

    fn product(handle: &str) -> ProductRef {
        ProductRef {
            id: ProductId::new(format!("gid://shopify/Product/{handle}")),
            handle: handle.to_string(),
            title: handle.to_string(),
            image_url: None,
            tier: None,
            category: None,
        }
    }

    fn local(variant: &str, quantity: u32, line: Option<&str>) -> CartLineItem {
        CartLineItem {
            variant_id: VariantId::new(variant),
            product: product(variant),
            variant_title: format!("{variant} (local)"),
            price: Money::from_cents(2490, CurrencyCode::USD),
            quantity,
            selected_options: vec![],
            remote_line_id: line.map(LineId::new),
            available_for_sale: true,
            unsynced_quantity: 0,
            remote_total: None,
        }
    }

    fn remote(variant: &str, quantity: u32, line: &str, cents: i64) -> RemoteLine {
        RemoteLine {
            id: LineId::new(line),
            variant_id: VariantId::new(variant),
            quantity,
            unit_price: Money::from_cents(cents, CurrencyCode::USD),
            line_total: Money::from_cents(cents, CurrencyCode::USD).times(quantity),
            available_for_sale: false,
            variant_title: format!("{variant} (remote)"),
            product: product(variant),
            selected_options: vec![],
        }
    }

    #[test]
    fn test_remote_wins_for_price_and_quantity_local_wins_for_label() {
        let merged = reconcile(&[local("A", 1, None)], &[remote("A", 3, "l-a", 1990)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[0].price, Money::from_cents(1990, CurrencyCode::USD));
        assert!(!merged[0].available_for_sale);
        assert_eq!(merged[0].remote_line_id, Some(LineId::new("l-a")));
        assert_eq!(merged[0].variant_title, "A (local)");
    }

    #[test]
    fn test_confirmed_lines_missing_remotely_are_dropped() {
        let merged = reconcile(
            &[local("A", 1, Some("l-a")), local("B", 2, None)],
            &[],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].variant_id.as_str(), "B");
    }

    #[test]
    fn test_remote_only_lines_are_appended_in_order() {
        let merged = reconcile(
            &[local("B", 1, Some("l-b"))],
            &[remote("C", 1, "l-c", 990), remote("B", 1, "l-b", 2490)],
        );
        let order: Vec<_> = merged.iter().map(|i| i.variant_id.as_str()).collect();
        assert_eq!(order, ["B", "C"]);
        assert_eq!(merged[1].variant_title, "C (remote)");
    }

    #[test]
    fn test_reconcile_is_a_fixed_point() {
        let items = [local("A", 1, None), local("B", 1, Some("gone"))];
        let lines = [remote("A", 2, "l-a", 2490), remote("Z", 1, "l-z", 990)];

        let once = reconcile(&items, &lines);
        let twice = reconcile(&once, &lines);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unsynced_units_survive_a_stale_snapshot() {
        let mut item = local("A", 1, Some("l-a"));
        item.add_quantity(2);

        let lines = [remote("A", 1, "l-a", 2490)];
        let once = reconcile(&[item], &lines);
        assert_eq!(once[0].quantity, 3);
        assert_eq!(once[0].unsynced_quantity, 2);
        assert_eq!(reconcile(&once, &lines), once);
    }

    #[test]
    fn test_unsynced_units_already_applied_remotely_settle() {
        let mut item = local("A", 1, Some("l-a"));
        item.add_quantity(2);

        let merged = reconcile(&[item], &[remote("A", 3, "l-a", 2490)]);
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[0].unsynced_quantity, 0);
        assert_eq!(merged[0].line_total(), Money::from_cents(7470, CurrencyCode::USD));
    }

    #[test]
    fn test_pending_line_already_applied_remotely_is_confirmed() {
        let merged = reconcile(&[local("A", 2, None)], &[remote("A", 1, "l-a", 2490)]);
        assert_eq!(merged[0].quantity, 2);
        assert_eq!(merged[0].unsynced_quantity, 1);
        assert_eq!(merged[0].remote_line_id, Some(LineId::new("l-a")));
    }

    #[test]
    fn test_accepted_snapshot_settles_every_line() {
        let mut item = local("A", 1, Some("l-a"));
        item.add_quantity(4);
        let mut state = CartState {
            items: vec![item, local("B", 2, None)],
            ..CartState::default()
        };

        // Remote capped A at 3 units
        let remote = RemoteCart {
            id: CartId::new("c"),
            checkout_url: "u".to_string(),
            lines: vec![remote("A", 3, "l-a", 2490), remote("B", 2, "l-b", 990)],
        };
        state.accept_snapshot(&remote);

        let quantities: Vec<_> = state.items.iter().map(|i| (i.quantity, i.unsynced_quantity)).collect();
        assert_eq!(quantities, [(3, 0), (2, 0)]);
        assert_eq!(state.subtotal(), Money::from_cents(9450, CurrencyCode::USD));
    }

    #[test]
    fn test_checkout_url_requires_items_and_remote_cart() {
        let mut state = CartState {
            checkout_url: Some("https://shop.example/c/1".to_string()),
            ..CartState::default()
        };
        assert_eq!(state.checkout_url(), None);

        state.items.push(local("A", 1, None));
        assert_eq!(state.checkout_url(), None);

        state.remote_cart_id = Some(CartId::new("gid://shopify/Cart/1"));
        assert_eq!(state.checkout_url(), Some("https://shop.example/c/1"));
    }

    #[test]
    fn test_forget_remote_cart_marks_lines_pending() {
        let mut state = CartState {
            items: vec![local("A", 1, Some("l-a"))],
            remote_cart_id: Some(CartId::new("c")),
            checkout_url: Some("u".to_string()),
            ..CartState::default()
        };
        state.forget_remote_cart();

        assert!(state.remote_cart_id.is_none());
        assert!(state.checkout_url.is_none());
        assert!(state.items[0].is_pending());
    }

    #[test]
    fn test_subtotal_and_item_count() {
        let state = CartState {
            items: vec![local("A", 2, None), local("B", 1, None)],
            ..CartState::default()
        };
        assert_eq!(state.item_count(), 3);
        assert_eq!(state.subtotal(), Money::from_cents(7470, CurrencyCode::USD));
        assert_eq!(
            CartState::default().subtotal(),
            Money::zero(CurrencyCode::USD)
        );
    }

    #[test]
    fn test_persisted_round_trip_clears_transient_flags() {
        let state = CartState {
            items: vec![local("A", 1, Some("l-a"))],
            remote_cart_id: Some(CartId::new("c")),
            checkout_url: Some("u".to_string()),
            is_loading: true,
            is_syncing: true,
            is_open: true,
        };
        let restored = CartState::from_persisted(state.to_persisted());

        assert_eq!(restored.items, state.items);
        assert_eq!(restored.remote_cart_id, state.remote_cart_id);
        assert!(!restored.is_loading && !restored.is_syncing && !restored.is_open);
    }
}
