//! Checkout: order totals and order placement.
//!
//! Placement goes through a single backend RPC that inserts the order and
//! its items atomically, re-pricing against the catalog and decrementing
//! stock server-side. The cart is only cleared after the RPC succeeds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use seaglass_core::{OrderId, Price, ProductId};

use crate::backend::{BackendError, HostedBackend};
use crate::cart::{CartState, CartStore};

/// Flat sales tax rate applied at checkout: 10%.
const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// The money breakdown shown on the checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub tax: Price,
    pub total: Price,
}

impl OrderTotals {
    /// Totals for a given subtotal. Tax is the flat rate, total is the sum.
    #[must_use]
    pub fn from_subtotal(subtotal: Price) -> Self {
        let tax = subtotal.scaled_by(TAX_RATE);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }

    /// Totals for the current cart contents.
    #[must_use]
    pub fn for_cart(cart: &CartState) -> Self {
        Self::from_subtotal(cart.subtotal())
    }
}

/// Shipping address collected on the checkout form.
///
/// Serialized with camelCase keys, matching the shape the order RPC and
/// the order-history view expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

/// Why an order could not be placed.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Checkout requires a signed-in user.
    #[error("sign in to place an order")]
    NotSignedIn,

    /// There is nothing to order.
    #[error("the cart is empty")]
    EmptyCart,

    /// The backend rejected or failed the order RPC.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One line of the order RPC payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLineInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Order-creation capability.
pub trait OrderApi: Send + Sync {
    /// Create an order with its items atomically; returns the new order's
    /// id. The backend re-prices the items and validates stock.
    fn create_order(
        &self,
        items: &[OrderLineInput],
        shipping_address: &ShippingAddress,
    ) -> impl Future<Output = Result<OrderId, BackendError>> + Send;
}

impl OrderApi for HostedBackend {
    async fn create_order(
        &self,
        items: &[OrderLineInput],
        shipping_address: &ShippingAddress,
    ) -> Result<OrderId, BackendError> {
        let params = json!({
            "items_json": items,
            "shipping_address": shipping_address,
        });
        self.rest().rpc("create_order_with_items", &params).await
    }
}

/// Place an order for the cart's contents, then clear the cart.
///
/// Requires a signed-in user and a non-empty cart; the cart is left
/// untouched if the backend call fails so the user can retry.
///
/// # Errors
///
/// Returns `CheckoutError::NotSignedIn` or `CheckoutError::EmptyCart` when
/// the guards fail, and wraps any backend rejection of the order RPC.
pub async fn place_order<B: OrderApi>(
    backend: &B,
    cart: &CartStore,
    signed_in: bool,
    address: &ShippingAddress,
) -> Result<OrderId, CheckoutError> {
    if !signed_in {
        return Err(CheckoutError::NotSignedIn);
    }

    let state = cart.state();
    if state.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let items: Vec<OrderLineInput> = state
        .lines()
        .iter()
        .map(|line| OrderLineInput {
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect();

    let order_id = backend.create_order(&items, address).await?;
    tracing::info!(%order_id, "order placed");
    cart.clear();
    Ok(order_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use seaglass_core::ProductId;

    use crate::cart::MemoryStorage;
    use crate::catalog::Product;

    use super::*;

    #[test]
    fn test_totals_ten_percent_flat_tax() {
        let totals = OrderTotals::from_subtotal(Price::from_cents(2550));
        assert_eq!(totals.tax, Price::from_cents(255));
        assert_eq!(totals.total, Price::from_cents(2805));
    }

    #[test]
    fn test_totals_for_empty_cart_are_zero() {
        let totals = OrderTotals::for_cart(&CartState::default());
        assert_eq!(totals.subtotal, Price::ZERO);
        assert_eq!(totals.tax, Price::ZERO);
        assert_eq!(totals.total, Price::ZERO);
    }

    #[test]
    fn test_shipping_address_uses_camel_case_keys() {
        let address = ShippingAddress {
            full_name: "Ada Shore".to_owned(),
            address: "1 Beach Rd".to_owned(),
            city: "Tidewater".to_owned(),
            zip_code: "90210".to_owned(),
            country: "US".to_owned(),
        };

        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value["fullName"], "Ada Shore");
        assert_eq!(value["zipCode"], "90210");
    }

    struct FakeOrders {
        calls: Mutex<Vec<Vec<OrderLineInput>>>,
        fail: bool,
    }

    impl OrderApi for FakeOrders {
        async fn create_order(
            &self,
            items: &[OrderLineInput],
            _shipping_address: &ShippingAddress,
        ) -> Result<OrderId, BackendError> {
            if self.fail {
                return Err(BackendError::RowNotFound);
            }
            self.calls.lock().unwrap().push(items.to_vec());
            Ok(OrderId::generate())
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Shore".to_owned(),
            address: "1 Beach Rd".to_owned(),
            city: "Tidewater".to_owned(),
            zip_code: "90210".to_owned(),
            country: "US".to_owned(),
        }
    }

    fn cart_with_item() -> CartStore {
        let cart = CartStore::new(Box::new(MemoryStorage::default()));
        cart.add_item(
            &Product {
                id: ProductId::generate(),
                name: "Sea Glass Pendant".to_owned(),
                description: None,
                price: Price::from_cents(2450),
                stock: 3,
                images: vec![],
                category_id: None,
                created_at: chrono::Utc::now(),
            },
            1,
        );
        cart
    }

    #[tokio::test]
    async fn test_place_order_requires_sign_in() {
        let backend = FakeOrders {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        let cart = cart_with_item();

        let err = place_order(&backend, &cart, false, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotSignedIn));
        assert_eq!(cart.count(), 1);
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_cart() {
        let backend = FakeOrders {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        let cart = CartStore::new(Box::new(MemoryStorage::default()));

        let err = place_order(&backend, &cart, true, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_on_success() {
        let backend = FakeOrders {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        let cart = cart_with_item();

        place_order(&backend, &cart, true, &address()).await.unwrap();
        assert!(cart.state().is_empty());
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_keeps_cart_on_failure() {
        let backend = FakeOrders {
            calls: Mutex::new(vec![]),
            fail: true,
        };
        let cart = cart_with_item();

        let err = place_order(&backend, &cart, true, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Backend(_)));
        assert_eq!(cart.count(), 1);
    }
}
