//! Order history, as shown on the account's orders page.
//!
//! Orders come back from one embedded query: each order row carries its
//! items, and each item carries the product's name and images for display.
//! Row policies on the backend scope the result to the signed-in user.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use seaglass_core::{OrderId, OrderItemId, OrderStatus, Price};

use crate::backend::{BackendError, HostedBackend};
use crate::checkout::ShippingAddress;

/// Product display fields embedded in an order item.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemProduct {
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One line of a past order. `price` is the unit price paid at order time,
/// not the product's current price.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub quantity: u32,
    pub price: Price,
    /// `None` if the product has since been deleted from the catalog.
    #[serde(default)]
    pub products: Option<OrderItemProduct>,
}

/// A past order with its items.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total_amount: Price,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl HostedBackend {
    /// The signed-in user's orders, newest first, with items and product
    /// display data embedded.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on a non-success response.
    pub async fn order_history(&self) -> Result<Vec<Order>, BackendError> {
        self.rest()
            .collection("orders")
            .select("*, order_items(*, products(name, images))")
            .order("created_at", false)
            .fetch()
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserializes_embedded_rows() {
        let row = serde_json::json!({
            "id": "7f3c2c1a-9d8e-4b7a-a6c5-d4e3f2a1b0c9",
            "status": "shipped",
            "created_at": "2026-02-01T12:00:00Z",
            "total_amount": "28.05",
            "shipping_address": {
                "fullName": "Ada Shore",
                "address": "1 Beach Rd",
                "city": "Tidewater",
                "zipCode": "90210",
                "country": "US"
            },
            "order_items": [
                {
                    "id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
                    "quantity": 1,
                    "price": "25.50",
                    "products": {
                        "name": "Sea Glass Pendant",
                        "images": ["https://img.example.com/pendant.jpg"]
                    }
                }
            ]
        });

        let order: Order = serde_json::from_value(row).unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.total_amount, Price::from_cents(2805));
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(
            order.order_items[0].products.as_ref().unwrap().name,
            "Sea Glass Pendant"
        );
        assert_eq!(order.shipping_address.unwrap().zip_code, "90210");
    }

    #[test]
    fn test_order_item_survives_deleted_product() {
        let row = serde_json::json!({
            "id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
            "quantity": 2,
            "price": "10.00",
            "products": null
        });

        let item: OrderItem = serde_json::from_value(row).unwrap();
        assert!(item.products.is_none());
        assert_eq!(item.quantity, 2);
    }
}
