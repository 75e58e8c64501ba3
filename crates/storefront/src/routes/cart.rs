//! Cart route handlers.
//!
//! Every mutation answers with the updated cart view and schedules a basket
//! reconciliation pass in the background; the response never waits on
//! Tebex. `/reconcile` is the exception and runs a pass inline.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use emberstone_core::{CartId, CartItem, PackageId, PendingOperation, format_amount};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::basket::ReconcileOutcome;
use crate::cart::{AddOutcome, CartStore};
use crate::error::{AppError, Result, add_breadcrumb, set_sentry_user};
use crate::state::{AppState, CartSession};

/// JSON view of a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    /// Two-decimal total, e.g. `"19.98"`.
    pub total: String,
    pub item_count: usize,
    pub open: bool,
    pub pending_operations: Vec<PendingOperation>,
}

impl From<&CartStore> for CartView {
    fn from(cart: &CartStore) -> Self {
        Self {
            items: cart.items().to_vec(),
            total: format_amount(cart.cart_total()),
            item_count: cart.item_count(),
            open: cart.is_open(),
            pending_operations: cart.pending_operations().to_vec(),
        }
    }
}

/// Membership answer for a single item.
#[derive(Debug, Serialize)]
pub struct ItemStatus {
    pub item_id: PackageId,
    pub in_cart: bool,
}

/// Player identification request body.
#[derive(Debug, Deserialize)]
pub struct PlayerForm {
    pub username: String,
}

/// Player identification response.
#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub player: String,
    pub changed: bool,
}

/// Basket-to-cart sync response.
#[derive(Debug, Serialize)]
pub struct SyncView {
    pub synced: bool,
    pub cart: CartView,
}

// =============================================================================
// Helpers
// =============================================================================

async fn session(state: &AppState, cart_id: &str) -> Result<Arc<CartSession>> {
    let id = CartId::parse(cart_id)?;
    Ok(state.cart(&id).await)
}

async fn view(session: &CartSession) -> CartView {
    CartView::from(&*session.cart().lock().await)
}

// =============================================================================
// Handlers
// =============================================================================

/// Show a cart.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>> {
    let session = session(&state, &cart_id).await?;
    Ok(Json(view(&session).await))
}

/// Add an item.
///
/// `201` when the item was added, `200` when it was already there.
#[instrument(skip(state, item), fields(item_id = %item.id))]
pub async fn add(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    Json(item): Json<CartItem>,
) -> Result<(StatusCode, Json<CartView>)> {
    let session = session(&state, &cart_id).await?;
    let item_id = item.id.clone();

    let (outcome, cart) = {
        let mut cart = session.cart().lock().await;
        let outcome = cart.add_to_cart(item);
        (outcome, CartView::from(&*cart))
    };

    match outcome {
        AddOutcome::Added => {
            add_breadcrumb("cart", "Added to cart", Some(&[("item_id", item_id.as_str())]));
            session.trigger_reconcile();
            Ok((StatusCode::CREATED, Json(cart)))
        }
        AddOutcome::AlreadyPresent => Ok((StatusCode::OK, Json(cart))),
        AddOutcome::Invalid => Err(AppError::BadRequest("Item is missing an id".to_string())),
    }
}

/// Report whether an item is in the cart.
#[instrument(skip(state))]
pub async fn item_status(
    State(state): State<AppState>,
    Path((cart_id, item_id)): Path<(String, String)>,
) -> Result<Json<ItemStatus>> {
    let session = session(&state, &cart_id).await?;
    let item_id = PackageId::new(item_id);
    let in_cart = session.cart().lock().await.is_in_cart(&item_id);

    Ok(Json(ItemStatus { item_id, in_cart }))
}

/// Remove an item. The removal is forwarded to the basket even when the
/// item is not in the local cart.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path((cart_id, item_id)): Path<(String, String)>,
) -> Result<Json<CartView>> {
    let session = session(&state, &cart_id).await?;
    let item_id = PackageId::new(item_id);

    let cart = {
        let mut cart = session.cart().lock().await;
        if !cart.remove_from_cart(&item_id) {
            return Err(AppError::BadRequest("Item id is empty".to_string()));
        }
        CartView::from(&*cart)
    };

    add_breadcrumb("cart", "Removed from cart", Some(&[("item_id", item_id.as_str())]));
    session.trigger_reconcile();
    Ok(Json(cart))
}

/// Empty the local cart. The basket is left as it is.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>> {
    let session = session(&state, &cart_id).await?;
    let mut cart = session.cart().lock().await;
    cart.clear_cart();
    Ok(Json(CartView::from(&*cart)))
}

pub async fn open(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>> {
    let session = session(&state, &cart_id).await?;
    let mut cart = session.cart().lock().await;
    cart.open_cart();
    Ok(Json(CartView::from(&*cart)))
}

pub async fn close(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>> {
    let session = session(&state, &cart_id).await?;
    let mut cart = session.cart().lock().await;
    cart.close_cart();
    Ok(Json(CartView::from(&*cart)))
}

/// Tell the cart which player it belongs to.
#[instrument(skip(state, form), fields(player = %form.username))]
pub async fn identify(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    Json(form): Json<PlayerForm>,
) -> Result<Json<PlayerView>> {
    let username = form.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }

    let session = session(&state, &cart_id).await?;
    let changed = session.identify(username).await;
    set_sentry_user(username);

    Ok(Json(PlayerView {
        player: username.to_string(),
        changed,
    }))
}

/// Replace the cart with what the player's basket holds.
#[instrument(skip(state))]
pub async fn sync(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<SyncView>> {
    let session = session(&state, &cart_id).await?;
    let synced = session.sync_from_basket().await;

    Ok(Json(SyncView {
        synced,
        cart: view(&session).await,
    }))
}

/// Run a reconciliation pass now and report what it did.
#[instrument(skip(state))]
pub async fn reconcile(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<ReconcileOutcome>> {
    let session = session(&state, &cart_id).await?;
    Ok(Json(session.reconcile_now().await))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emberstone_core::CartItem;

    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_cart_view_total_and_queue() {
        let mut cart = CartStore::load(Arc::new(MemoryStorage::new()));
        cart.add_to_cart(CartItem::new("1", "VIP", "$9.99"));
        cart.add_to_cart(CartItem::new("2", "Fly Pass", "free"));

        let view = CartView::from(&cart);

        assert_eq!(view.total, "9.99");
        assert_eq!(view.item_count, 2);
        assert!(view.open);
        assert_eq!(view.pending_operations.len(), 2);
    }

    #[test]
    fn test_empty_cart_view() {
        let cart = CartStore::load(Arc::new(MemoryStorage::new()));
        let json = serde_json::to_value(CartView::from(&cart)).unwrap();

        assert_eq!(json["total"], "0.00");
        assert_eq!(json["item_count"], 0);
        assert_eq!(json["open"], false);
    }
}
