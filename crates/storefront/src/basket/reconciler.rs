//! Replays queued cart operations against the player's basket.
//!
//! Delivery is best-effort: every operation is attempted once, and a failed
//! one is logged and dropped. The queue is taken before any basket call so
//! a concurrent pass never sees the same operation twice.

use std::sync::Arc;

use emberstone_core::{OperationKind, PendingOperation};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::{Basket, BasketConnector, BasketData};
use crate::cart::CartStore;

/// What a single reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing was queued.
    Idle,
    /// No basket handle could be obtained; the queue is kept.
    BasketUnavailable,
    /// The basket handle has no player name yet; the queue is kept.
    MissingUsername,
    /// No basket session could be created; the queue is kept.
    NoBasketSession,
    /// The queue was drained.
    Drained {
        applied: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Owns the basket handle for one cart and syncs the cart into it.
pub struct Reconciler {
    connector: Arc<dyn BasketConnector>,
    player: Option<String>,
    basket: Option<Box<dyn Basket>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("player", &self.player)
            .field("connected", &self.basket.is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler that discovers baskets through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn BasketConnector>) -> Self {
        Self {
            connector,
            player: None,
            basket: None,
        }
    }

    /// Player the cart belongs to, if known.
    #[must_use]
    pub fn player(&self) -> Option<&str> {
        self.player.as_deref()
    }

    /// Set the player identity.
    ///
    /// A different player invalidates the current basket handle; the next
    /// pass discovers one for the new identity. Returns whether anything
    /// changed.
    pub fn identify(&mut self, username: impl Into<String>) -> bool {
        let username = username.into();
        if self.player.as_deref() == Some(username.as_str()) {
            return false;
        }

        info!(player = %username, "Cart identified");
        self.player = Some(username);
        self.basket = None;
        true
    }

    /// Attach an explicit basket handle, replacing any current one.
    pub fn connect(&mut self, basket: Box<dyn Basket>) {
        self.basket = Some(basket);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.basket.is_some()
    }

    /// The connected basket handle.
    #[must_use]
    pub fn basket(&self) -> Option<&dyn Basket> {
        self.basket.as_deref()
    }

    /// Run one reconciliation pass.
    ///
    /// The cart lock is only held to inspect and to drain the queue, never
    /// across a basket call.
    #[instrument(skip_all, fields(player = ?self.player))]
    pub async fn reconcile(&mut self, cart: &Mutex<CartStore>) -> ReconcileOutcome {
        if !cart.lock().await.has_pending() {
            return ReconcileOutcome::Idle;
        }

        if self.basket.is_none() {
            match self.connector.connect(self.player.as_deref()) {
                Some(basket) => {
                    debug!("Basket handle connected");
                    self.basket = Some(basket);
                }
                None => {
                    debug!("Basket not yet available, will retry");
                    return ReconcileOutcome::BasketUnavailable;
                }
            }
        }
        let Some(basket) = self.basket.as_mut() else {
            return ReconcileOutcome::BasketUnavailable;
        };

        let Some(username) = basket
            .username()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            warn!("No username available for basket operations, will retry later");
            return ReconcileOutcome::MissingUsername;
        };

        if basket.basket_ident().is_none() && !basket.has_initialized_basket() {
            match basket.get_or_create_basket(&username).await {
                Ok(Some(ident)) => debug!(basket = %ident, "Basket ready"),
                Ok(None) => {
                    warn!("Could not create or get basket, will retry later");
                    return ReconcileOutcome::NoBasketSession;
                }
                Err(e) => {
                    error!(error = %e, "Error initializing basket");
                    return ReconcileOutcome::NoBasketSession;
                }
            }
        }

        let remote = current_basket(&mut **basket).await;
        let operations = cart.lock().await.take_pending();
        drain(&mut **basket, operations, remote.as_ref()).await
    }

    /// Replace the cart with the basket's contents.
    ///
    /// Does nothing unless a connected handle holds a snapshot with a
    /// package list. Returns whether the cart was replaced.
    pub async fn sync_from_basket(&self, cart: &Mutex<CartStore>) -> bool {
        let Some(packages) = self
            .basket
            .as_deref()
            .and_then(|basket| basket.basket_data())
            .and_then(|data| data.packages.as_ref())
        else {
            return false;
        };

        let items = packages.iter().map(super::BasketPackage::to_cart_item).collect();
        cart.lock().await.replace_items(items);
        info!(count = packages.len(), "Cart synchronized from basket");
        true
    }
}

/// Cached snapshot when it has a package list, otherwise a fresh fetch.
async fn current_basket(basket: &mut dyn Basket) -> Option<BasketData> {
    let ident = basket.basket_ident()?.to_owned();

    let cached = basket
        .basket_data()
        .filter(|data| data.packages.is_some())
        .cloned();
    if cached.is_some() {
        return cached;
    }

    match basket.fetch_basket(&ident).await {
        Ok(data) => Some(data),
        Err(e) => {
            error!(error = %e, basket = %ident, "Error fetching current basket data");
            None
        }
    }
}

async fn drain(
    basket: &mut dyn Basket,
    operations: Vec<PendingOperation>,
    remote: Option<&BasketData>,
) -> ReconcileOutcome {
    let (mut applied, mut skipped, mut failed) = (0, 0, 0);

    for op in operations {
        let result = match op.kind {
            OperationKind::Add => {
                if remote.is_some_and(|data| data.contains(&op.item_id)) {
                    debug!(item_id = %op.item_id, "Already in basket, skipping add");
                    skipped += 1;
                    continue;
                }
                basket.add_package_to_basket(&op.item_id, 1).await
            }
            OperationKind::Remove => basket.remove_package_from_basket(&op.item_id).await,
        };

        match result {
            Ok(()) => applied += 1,
            Err(e) => {
                failed += 1;
                error!(
                    error = %e,
                    operation = ?op.kind,
                    item_id = %op.item_id,
                    "Failed to process basket operation"
                );
            }
        }
    }

    info!(applied, skipped, failed, "Basket operations processed");
    ReconcileOutcome::Drained {
        applied,
        skipped,
        failed,
    }
}
