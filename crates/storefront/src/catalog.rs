//! Product catalog: read paths used by the storefront, plus the admin
//! mutations behind the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seaglass_core::{CategoryId, Price, ProductId};

use crate::backend::{BackendError, HostedBackend};

/// A catalog product, as stored in the `products` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    /// Units on hand. Display data only; the order RPC re-checks stock.
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Fields for creating a product. `id` and `created_at` are assigned by
/// the backend.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    pub stock: u32,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

/// Partial update for a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl HostedBackend {
    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on a non-success response.
    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.rest()
            .collection("products")
            .order("created_at", false)
            .fetch()
            .await
    }

    /// Products in one category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on a non-success response.
    pub async fn products_in_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<Product>, BackendError> {
        self.rest()
            .collection("products")
            .eq("category_id", category)
            .order("created_at", false)
            .fetch()
            .await
    }

    /// A single product by id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::RowNotFound` if it does not exist.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, BackendError> {
        self.rest()
            .collection("products")
            .eq("id", id)
            .fetch_one()
            .await
    }

    /// All categories, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on a non-success response.
    pub async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
        self.rest()
            .collection("categories")
            .order("name", true)
            .fetch()
            .await
    }

    /// Create a product (admin-only under the backend's row policies).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` when the platform rejects the row.
    pub async fn create_product(&self, product: &NewProduct) -> Result<(), BackendError> {
        let body = serde_json::to_value(product)?;
        self.rest().collection("products").insert(&body).await
    }

    /// Apply a partial update to a product (admin-only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` when the platform rejects the patch.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_value(patch)?;
        self.rest()
            .collection("products")
            .eq("id", id)
            .update(&body)
            .await
    }

    /// Delete a product (admin-only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` when the platform refuses.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.rest()
            .collection("products")
            .eq("id", id)
            .delete()
            .await
    }
}
