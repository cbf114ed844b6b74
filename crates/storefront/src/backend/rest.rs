//! Row-query client for the hosted platform's data API.
//!
//! A thin, typed wrapper over the platform's REST surface
//! (`/rest/v1/{collection}`): equality filters, ordering, limiting, single
//! row fetches, inserts, updates, deletes and RPC calls. Row-level security
//! is enforced server-side; this client just makes sure each request carries
//! the anon key and, when signed in, the session's bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! let products: Vec<Product> = backend
//!     .rest()
//!     .collection("products")
//!     .order("created_at", false)
//!     .fetch()
//!     .await?;
//! ```

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{BackendError, TokenStore};

/// `Accept` header that asks for exactly one row.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Client for the platform's row-query API.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    tokens: TokenStore,
}

impl RestClient {
    pub(crate) const fn new(
        http: reqwest::Client,
        base: Url,
        anon_key: SecretString,
        tokens: TokenStore,
    ) -> Self {
        Self {
            http,
            base,
            anon_key,
            tokens,
        }
    }

    /// Start a query against a named record collection.
    #[must_use]
    pub fn collection(&self, name: &str) -> QueryBuilder {
        QueryBuilder {
            client: self.clone(),
            collection: name.to_owned(),
            select: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Call a named server-side function.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` with the server's message on failure.
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &serde_json::Value,
    ) -> Result<T, BackendError> {
        let url = self.base.join(&format!("rest/v1/rpc/{function}"))?;
        let response = self.authed(self.http.post(url)).json(args).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Attach the anon key and the live session's bearer token (falling
    /// back to the anon key when signed out).
    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .tokens
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // The data API signals "asked for one row, got zero" with 406.
        if status == StatusCode::NOT_ACCEPTABLE {
            return Err(BackendError::RowNotFound);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, message })
    }
}

/// A query against one collection, built up method by method.
///
/// Terminal methods (`fetch`, `fetch_one`, `fetch_optional`, `insert`,
/// `update`, `delete`) consume the builder and perform the request.
#[must_use]
pub struct QueryBuilder {
    client: RestClient,
    collection: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<u32>,
}

impl QueryBuilder {
    /// Restrict the returned columns (comma-separated, supports the
    /// platform's embedded-resource syntax).
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_owned());
        self
    }

    /// Keep rows where `column` equals `value`.
    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters
            .push((column.to_owned(), format!("eq.{value}")));
        self
    }

    /// Order by `column`, ascending or descending.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{column}.{direction}"));
        self
    }

    /// Cap the number of returned rows.
    pub const fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Fetch all matching rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on a non-success response.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let (client, url) = self.into_request_url()?;
        let response = client.authed(client.http.get(url)).send().await?;
        let response = RestClient::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::RowNotFound` when no row matches.
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        let (client, url) = self.into_request_url()?;
        let response = client
            .authed(client.http.get(url))
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;
        let response = RestClient::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch at most one row, mapping "no row" to `None`.
    ///
    /// # Errors
    ///
    /// Returns other backend errors unchanged.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, BackendError> {
        match self.fetch_one().await {
            Ok(row) => Ok(Some(row)),
            Err(BackendError::RowNotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Insert one or more rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Status` on rejection (constraint violation,
    /// row-level security denial).
    pub async fn insert<T: Serialize + Sync>(self, rows: &T) -> Result<(), BackendError> {
        let (client, url) = self.into_request_url()?;
        let response = client
            .authed(client.http.post(url))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    /// Update all matching rows with the given patch.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnfilteredWrite` if no filters were applied;
    /// an accidental collection-wide update is never what the storefront
    /// means.
    pub async fn update<T: Serialize + Sync>(self, patch: &T) -> Result<(), BackendError> {
        if self.filters.is_empty() {
            return Err(BackendError::UnfilteredWrite(self.collection));
        }
        let (client, url) = self.into_request_url()?;
        let response = client
            .authed(client.http.request(Method::PATCH, url))
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    /// Delete all matching rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnfilteredWrite` if no filters were applied.
    pub async fn delete(self) -> Result<(), BackendError> {
        if self.filters.is_empty() {
            return Err(BackendError::UnfilteredWrite(self.collection));
        }
        let (client, url) = self.into_request_url()?;
        let response = client
            .authed(client.http.request(Method::DELETE, url))
            .send()
            .await?;
        RestClient::check(response).await?;
        Ok(())
    }

    fn into_request_url(self) -> Result<(RestClient, Url), BackendError> {
        let mut url = self
            .client
            .base
            .join(&format!("rest/v1/{}", self.collection))?;
        let has_query = self.select.is_some()
            || !self.filters.is_empty()
            || self.order.is_some()
            || self.limit.is_some();
        if has_query {
            let mut pairs = url.query_pairs_mut();
            if let Some(select) = &self.select {
                pairs.append_pair("select", select);
            }
            for (column, predicate) in &self.filters {
                pairs.append_pair(column, predicate);
            }
            if let Some(order) = &self.order {
                pairs.append_pair("order", order);
            }
            if let Some(limit) = self.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok((self.client, url))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client() -> RestClient {
        RestClient::new(
            reqwest::Client::new(),
            "https://project.example-platform.co".parse().unwrap(),
            SecretString::from("test-key"),
            TokenStore::default(),
        )
    }

    fn built_url(builder: QueryBuilder) -> Url {
        let (_, url) = builder.into_request_url().unwrap();
        url
    }

    #[test]
    fn test_collection_url() {
        let url = built_url(test_client().collection("products"));
        assert_eq!(
            url.as_str(),
            "https://project.example-platform.co/rest/v1/products"
        );
    }

    #[test]
    fn test_filters_order_and_limit() {
        let url = built_url(
            test_client()
                .collection("profiles")
                .select("role")
                .eq("id", "abc")
                .order("created_at", false)
                .limit(1),
        );
        let query = url.query().unwrap();
        assert!(query.contains("select=role"));
        assert!(query.contains("id=eq.abc"));
        assert!(query.contains("order=created_at.desc"));
        assert!(query.contains("limit=1"));
    }

    #[tokio::test]
    async fn test_unfiltered_update_is_refused() {
        let result = test_client()
            .collection("products")
            .update(&serde_json::json!({ "stock": 0 }))
            .await;
        assert!(matches!(result, Err(BackendError::UnfilteredWrite(c)) if c == "products"));
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let result = test_client().collection("products").delete().await;
        assert!(matches!(result, Err(BackendError::UnfilteredWrite(_))));
    }
}
