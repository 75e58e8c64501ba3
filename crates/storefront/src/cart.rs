//! Locally visible shopping cart.
//!
//! The cart is the player's view of what they intend to buy. It is the
//! source of truth for display and persists across reloads; the Tebex
//! basket is brought in line with it asynchronously by the
//! [`Reconciler`](crate::basket::Reconciler), fed by the pending-operation
//! queue kept here.

use std::sync::Arc;

use emberstone_core::{CartItem, PackageId, PendingOperation, parse_display_price};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, warn};

use crate::storage::{LocalStorage, SHOPPING_CART_KEY};

/// Result of [`CartStore::add_to_cart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Item appended and an add queued for the basket.
    Added,
    /// Item with that id was already in the cart; nothing changed.
    AlreadyPresent,
    /// Item had no id and was rejected.
    Invalid,
}

/// Cart items, the open flag, and the queue of basket mutations.
pub struct CartStore {
    items: Vec<CartItem>,
    pending: Vec<PendingOperation>,
    open: bool,
    storage: Arc<dyn LocalStorage>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .field("pending", &self.pending)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Load the cart persisted in `storage`.
    ///
    /// A missing entry is an empty cart. An unreadable or malformed entry is
    /// logged and also treated as empty.
    #[must_use]
    pub fn load(storage: Arc<dyn LocalStorage>) -> Self {
        let items = match storage.get_item(SHOPPING_CART_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartItem>>(&raw) {
                Ok(items) => dedupe(items),
                Err(e) => {
                    error!(error = %e, "Error parsing stored cart, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, "Error loading cart from storage");
                Vec::new()
            }
        };

        Self {
            items,
            pending: Vec::new(),
            open: false,
            storage,
        }
    }

    /// Add an item, queueing an add for the basket.
    ///
    /// Opens the cart unless the item is rejected.
    pub fn add_to_cart(&mut self, item: CartItem) -> AddOutcome {
        if item.id.is_empty() {
            error!(name = %item.name, "Cannot add invalid item to cart");
            return AddOutcome::Invalid;
        }

        let outcome = if self.is_in_cart(&item.id) {
            debug!(item_id = %item.id, "Item already in cart");
            AddOutcome::AlreadyPresent
        } else {
            self.pending.push(PendingOperation::add(item.id.clone()));
            self.items.push(item);
            self.persist();
            AddOutcome::Added
        };

        self.open = true;
        outcome
    }

    /// Remove an item, queueing a removal for the basket.
    ///
    /// The removal is queued even when the id is not in the local cart, since
    /// the basket may still hold it. Returns `false` only for an empty id.
    pub fn remove_from_cart(&mut self, item_id: &PackageId) -> bool {
        if item_id.is_empty() {
            error!("Cannot remove item without ID from cart");
            return false;
        }

        self.pending.push(PendingOperation::remove(item_id.clone()));

        let before = self.items.len();
        self.items.retain(|item| &item.id != item_id);
        if self.items.len() != before {
            self.persist();
        }
        true
    }

    /// Empty the local cart. The basket is left alone; checkout clears it.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Sum of the display prices of every item, to two decimal places.
    ///
    /// Prices are never negative, so a sum past `Decimal::MAX` is capped
    /// there.
    #[must_use]
    pub fn cart_total(&self) -> Decimal {
        let mut total = Decimal::ZERO;
        for item in &self.items {
            let price = parse_display_price(&item.price);
            match total.checked_add(price) {
                Some(sum) => total = sum,
                None => {
                    warn!(item_id = %item.id, "Cart total overflows, capping");
                    total = Decimal::MAX;
                    break;
                }
            }
        }
        total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    #[must_use]
    pub fn is_in_cart(&self, item_id: &PackageId) -> bool {
        self.items.iter().any(|item| &item.id == item_id)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub const fn open_cart(&mut self) {
        self.open = true;
    }

    pub const fn close_cart(&mut self) {
        self.open = false;
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Operations not yet handed to the reconciler, oldest first.
    #[must_use]
    pub fn pending_operations(&self) -> &[PendingOperation] {
        &self.pending
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the whole queue.
    pub fn take_pending(&mut self) -> Vec<PendingOperation> {
        std::mem::take(&mut self.pending)
    }

    /// Replace the cart contents wholesale (basket to cart sync).
    ///
    /// Items without an id are dropped, duplicates keep their first entry.
    /// No basket operations are queued.
    pub fn replace_items(&mut self, items: Vec<CartItem>) {
        self.items = dedupe(items.into_iter().filter(|i| !i.id.is_empty()).collect());
        self.persist();
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.items) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Error serializing cart");
                return;
            }
        };

        if let Err(e) = self.storage.set_item(SHOPPING_CART_KEY, &json) {
            error!(error = %e, "Error saving cart to storage");
        }
    }
}

/// Keep the first item for each id.
fn dedupe(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emberstone_core::OperationKind;

    use super::*;
    use crate::storage::{MemoryStorage, StorageError};

    fn store() -> (Arc<MemoryStorage>, CartStore) {
        let storage = Arc::new(MemoryStorage::new());
        let cart = CartStore::load(storage.clone());
        (storage, cart)
    }

    fn vip() -> CartItem {
        CartItem::new("3307111", "VIP Membership", "$9.99")
    }

    #[test]
    fn test_add_same_id_twice_keeps_one_entry() {
        let (_, mut cart) = store();
        assert_eq!(cart.add_to_cart(vip()), AddOutcome::Added);
        assert_eq!(cart.add_to_cart(vip()), AddOutcome::AlreadyPresent);

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.pending_operations().len(), 1);
    }

    #[test]
    fn test_add_opens_cart() {
        let (_, mut cart) = store();
        assert!(!cart.is_open());
        cart.add_to_cart(vip());
        assert!(cart.is_open());

        cart.close_cart();
        cart.add_to_cart(vip());
        assert!(cart.is_open(), "re-adding an existing item still opens the cart");
    }

    #[test]
    fn test_add_without_id_is_rejected() {
        let (_, mut cart) = store();
        let item = CartItem {
            name: "Mystery".to_string(),
            ..CartItem::default()
        };

        assert_eq!(cart.add_to_cart(item), AddOutcome::Invalid);
        assert_eq!(cart.item_count(), 0);
        assert!(!cart.has_pending());
        assert!(!cart.is_open());
    }

    #[test]
    fn test_remove_missing_id_leaves_items_unchanged() {
        let (_, mut cart) = store();
        cart.add_to_cart(vip());
        cart.take_pending();

        assert!(cart.remove_from_cart(&PackageId::from("does-not-exist")));
        assert_eq!(cart.items(), &[vip()]);

        let pending = cart.pending_operations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OperationKind::Remove);
    }

    #[test]
    fn test_remove_empty_id_does_nothing() {
        let (_, mut cart) = store();
        cart.add_to_cart(vip());
        cart.take_pending();

        assert!(!cart.remove_from_cart(&PackageId::default()));
        assert_eq!(cart.item_count(), 1);
        assert!(!cart.has_pending());
    }

    #[test]
    fn test_remove_queues_in_order() {
        let (_, mut cart) = store();
        cart.add_to_cart(vip());
        cart.remove_from_cart(&PackageId::from("3307111"));

        let kinds: Vec<_> = cart.pending_operations().iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Add, OperationKind::Remove]);
        assert!(!cart.is_in_cart(&PackageId::from("3307111")));
    }

    #[test]
    fn test_clear_keeps_pending_queue() {
        let (_, mut cart) = store();
        cart.add_to_cart(vip());
        cart.clear_cart();

        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.pending_operations().len(), 1);
    }

    #[test]
    fn test_cart_total() {
        let (_, mut cart) = store();
        cart.add_to_cart(vip());
        cart.add_to_cart(CartItem::new("2", "Starter Kit", "$4.99"));
        cart.add_to_cart(CartItem::new("3", "Gift", "free"));

        assert_eq!(cart.cart_total(), Decimal::new(1498, 2));
    }

    #[test]
    fn test_cart_total_caps_instead_of_overflowing() {
        let (_, mut cart) = store();
        let max = "79228162514264337593543950335";
        cart.add_to_cart(CartItem::new("1", "Whale", max));
        cart.add_to_cart(CartItem::new("2", "Whale again", max));
        cart.add_to_cart(CartItem::new("3", "Fly Pass", "$1.00"));

        assert_eq!(cart.cart_total(), Decimal::MAX);
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let (_, cart) = store();
        assert_eq!(cart.cart_total(), Decimal::ZERO);
    }

    #[test]
    fn test_cart_persists_across_reload() {
        let (storage, mut cart) = store();
        cart.add_to_cart(vip());
        cart.add_to_cart(CartItem::new("2", "Starter Kit", "$4.99"));
        cart.remove_from_cart(&PackageId::from("2"));

        let reloaded = CartStore::load(storage);
        assert_eq!(reloaded.items(), &[vip()]);
        assert!(!reloaded.has_pending(), "pending operations are not persisted");
        assert!(!reloaded.is_open());
    }

    #[test]
    fn test_malformed_storage_loads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(SHOPPING_CART_KEY, "{not json").unwrap();

        let cart = CartStore::load(storage);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_stored_duplicates_are_dropped() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(
                SHOPPING_CART_KEY,
                r#"[{"id":"1","name":"first"},{"id":1,"name":"second"}]"#,
            )
            .unwrap();

        let cart = CartStore::load(storage);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].name, "first");
    }

    struct BrokenStorage;

    impl LocalStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn test_storage_failures_are_not_fatal() {
        let mut cart = CartStore::load(Arc::new(BrokenStorage));
        assert_eq!(cart.add_to_cart(vip()), AddOutcome::Added);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_replace_items() {
        let (storage, mut cart) = store();
        cart.add_to_cart(vip());
        cart.take_pending();

        cart.replace_items(vec![
            CartItem::new("5", "Fly Pass", "$7.99"),
            CartItem::new("5", "Fly Pass again", "$7.99"),
            CartItem::default(),
        ]);

        assert_eq!(cart.item_count(), 1);
        assert!(cart.is_in_cart(&PackageId::from("5")));
        assert!(!cart.has_pending());
        assert_eq!(CartStore::load(storage).item_count(), 1);
    }
}
