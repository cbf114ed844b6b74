//! Shopping cart store.
//!
//! Owns the cart contents for the current browsing session. Mutations go
//! through the store's operations only, derived values (count, subtotal)
//! are always computed from the line list, and every mutation persists the
//! full state synchronously before listeners are notified.
//!
//! Prices here are display data carried along from the catalog; the
//! order-creation backend call re-prices and validates stock
//! authoritatively, so the store deliberately does no stock checking.

pub mod storage;

pub use storage::{CART_KEY, CartStorage, FileStorage, MemoryStorage, StorageError};

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use seaglass_core::{Price, ProductId};

use crate::catalog::Product;
use crate::observe::{ListenerSet, Subscription};

/// One product's entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    /// Always at least 1; a decrement to 0 removes the line instead.
    pub quantity: u32,
    /// First catalog image, for the cart page thumbnail.
    pub image_url: Option<String>,
}

impl CartLine {
    /// Price × quantity for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// The cart contents: lines in insertion order (= display order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CartState {
    lines: Vec<CartLine>,
}

impl CartState {
    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Sum of quantities across all lines (the badge number, not the line
    /// count).
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of price × quantity across all lines. Tax and shipping are the
    /// caller's business (see [`crate::checkout::OrderTotals`]).
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The cart store.
///
/// Created once at application start with a storage backend; rehydrates
/// from storage, falling back to an empty cart on absence or corruption.
pub struct CartStore {
    state: Mutex<CartState>,
    storage: Box<dyn CartStorage>,
    listeners: ListenerSet<CartState>,
}

impl CartStore {
    /// Create the store, rehydrating persisted state if present.
    ///
    /// Corrupt or unreadable persisted data is logged and treated as an
    /// empty cart; it never surfaces to the user.
    #[must_use]
    pub fn new(storage: Box<dyn CartStorage>) -> Self {
        let state = match storage.load(CART_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<CartState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(error = %e, "persisted cart is corrupt, starting empty");
                    CartState::default()
                }
            },
            Ok(None) => CartState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted cart, starting empty");
                CartState::default()
            }
        };

        Self {
            state: Mutex::new(state),
            storage,
            listeners: ListenerSet::default(),
        }
    }

    /// Add `quantity` of a product. If the product is already in the cart
    /// its quantity is incremented; otherwise a new line is appended.
    ///
    /// A zero quantity is a no-op, as is a product with a negative price
    /// (a malformed catalog row must not distort the subtotal).
    pub fn add_item(&self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if product.price.is_negative() {
            tracing::warn!(product_id = %product.id, "refusing to add product with negative price");
            return;
        }
        self.mutate(|state| {
            if let Some(line) = state
                .lines
                .iter_mut()
                .find(|l| l.product_id == product.id)
            {
                line.quantity = line.quantity.saturating_add(quantity);
            } else {
                state.lines.push(CartLine {
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity,
                    image_url: product.images.first().cloned(),
                });
            }
        });
    }

    /// Remove a product's line. Absent ids are a no-op, not an error.
    pub fn remove_item(&self, product_id: ProductId) {
        self.mutate(|state| {
            state.lines.retain(|l| l.product_id != product_id);
        });
    }

    /// Set a line's quantity (absolute, not a delta). Zero removes the
    /// line; an unknown id is a no-op.
    pub fn set_quantity(&self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove_item(product_id);
            return;
        }
        self.mutate(|state| {
            if let Some(line) = state.lines.iter_mut().find(|l| l.product_id == product_id) {
                line.quantity = quantity;
            }
        });
    }

    /// Empty the cart (and persist the empty state).
    pub fn clear(&self) {
        self.mutate(|state| {
            state.lines.clear();
        });
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.lock().clone()
    }

    /// Sum of quantities, for the badge.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lock().count()
    }

    /// Sum of price × quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lock().subtotal()
    }

    /// Register a listener invoked synchronously after every mutation.
    pub fn subscribe(
        &self,
        listener: impl Fn(&CartState) + Send + Sync + 'static,
    ) -> Subscription<CartState> {
        self.listeners.subscribe(listener)
    }

    /// Apply a mutation, persist the result, then notify listeners.
    ///
    /// Persistence failures are logged and swallowed: the in-memory state
    /// stays authoritative for this session, durability is best-effort.
    fn mutate(&self, apply: impl FnOnce(&mut CartState)) {
        let snapshot = {
            let mut state = self.lock();
            apply(&mut state);
            self.persist(&state);
            state.clone()
        };
        self.listeners.notify(&snapshot);
    }

    fn persist(&self, state: &CartState) {
        match serde_json::to_string(state) {
            Ok(raw) => {
                if let Err(e) = self.storage.save(CART_KEY, &raw) {
                    tracing::error!(error = %e, "failed to persist cart");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize cart"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
