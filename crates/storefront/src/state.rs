//! Application state shared across handlers.

use std::sync::Arc;

use emberstone_core::CartId;
use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::basket::{BasketConnector, ReconcileOutcome, Reconciler};
use crate::cart::CartStore;
use crate::catalog::{CatalogError, CatalogLoader};
use crate::config::StorefrontConfig;
use crate::storage::{FileStorage, LocalStorage};
use crate::tebex::{TebexClient, TebexConnector, TebexError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog loader: {0}")]
    Catalog(#[from] CatalogError),
    #[error("tebex client: {0}")]
    Tebex(#[from] TebexError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the catalog loader and open carts.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogLoader,
    connector: Arc<dyn BasketConnector>,
    carts: Cache<CartId, Arc<CartSession>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Basket sync goes through Tebex when it is configured and is disabled
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let client = config.tebex.as_ref().map(TebexClient::new).transpose()?;
        Self::with_connector(config, Arc::new(TebexConnector::new(client)))
    }

    /// Create application state with an explicit basket connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog HTTP client fails to build.
    pub fn with_connector(
        config: StorefrontConfig,
        connector: Arc<dyn BasketConnector>,
    ) -> Result<Self, StateError> {
        let catalog = CatalogLoader::new(&config.catalog)?;
        let carts = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(config.cart_idle_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                connector,
                carts,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog loader.
    #[must_use]
    pub fn catalog(&self) -> &CatalogLoader {
        &self.inner.catalog
    }

    /// Get the session for a cart, loading it from disk on first use.
    pub async fn cart(&self, id: &CartId) -> Arc<CartSession> {
        let dir = self.inner.config.data_dir.join("carts").join(id.as_str());
        let connector = Arc::clone(&self.inner.connector);

        self.inner
            .carts
            .get_with_by_ref(id, async move {
                let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::new(dir));
                debug!(cart = %id, "Opening cart");
                Arc::new(CartSession::new(
                    CartStore::load(storage),
                    Reconciler::new(connector),
                ))
            })
            .await
    }
}

// =============================================================================
// CartSession
// =============================================================================

/// One open cart and the reconciler that keeps its basket in line.
///
/// The two locks are independent: handlers touch the cart without waiting
/// for a basket round-trip, and reconciliation passes for the same cart run
/// one at a time.
pub struct CartSession {
    cart: Arc<Mutex<CartStore>>,
    reconciler: Arc<Mutex<Reconciler>>,
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession").finish_non_exhaustive()
    }
}

impl CartSession {
    #[must_use]
    pub fn new(cart: CartStore, reconciler: Reconciler) -> Self {
        Self {
            cart: Arc::new(Mutex::new(cart)),
            reconciler: Arc::new(Mutex::new(reconciler)),
        }
    }

    /// The cart itself.
    #[must_use]
    pub fn cart(&self) -> &Mutex<CartStore> {
        &self.cart
    }

    /// Start a reconciliation pass in the background.
    pub fn trigger_reconcile(&self) {
        let cart = Arc::clone(&self.cart);
        let reconciler = Arc::clone(&self.reconciler);

        tokio::spawn(async move {
            let outcome = reconciler.lock().await.reconcile(&cart).await;
            debug!(?outcome, "Background reconciliation finished");
        });
    }

    /// Run a reconciliation pass and wait for it.
    #[instrument(skip(self))]
    pub async fn reconcile_now(&self) -> ReconcileOutcome {
        self.reconciler.lock().await.reconcile(&self.cart).await
    }

    /// Set the player for this cart; a new identity starts a pass.
    pub async fn identify(&self, username: &str) -> bool {
        let changed = self.reconciler.lock().await.identify(username);
        if changed {
            self.trigger_reconcile();
        }
        changed
    }

    /// Replace the cart with the connected basket's contents.
    pub async fn sync_from_basket(&self) -> bool {
        self.reconciler.lock().await.sync_from_basket(&self.cart).await
    }
}
