//! Backend REST and function-invocation client.
//!
//! Mirrors the backend's PostgREST-style table surface and its function
//! endpoint. Catalog reads (products, site config, sections) go through a
//! `moka` cache with a 5-minute TTL; order reads are always fresh.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use portal_sete_core::{OrderId, Price, ProductId, UserId};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::checkout::{CheckoutApi, PaymentSessionRequest};
use crate::config::BackendConfig;
use crate::models::{NewOrderItem, Order, OrderItem, Product, ProductFile, SiteConfig, SiteSection};
use crate::payment::OrderEvents;

use super::BackendError;
use super::realtime::{self, OrderSubscription};

/// Catalog cache TTL.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Cached catalog values.
#[derive(Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
    Config(Box<SiteConfig>),
    Sections(Arc<Vec<SiteSection>>),
}

/// Client for the hosted backend service.
///
/// Cheaply cloneable via `Arc`; one instance is shared across the whole
/// application.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    cache: Cache<String, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(BackendClientInner {
                http: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                anon_key: config.anon_key.clone(),
                cache,
            }),
        }
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn rest_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{table}", self.inner.base_url)
        } else {
            format!("{}/rest/v1/{table}?{query}", self.inner.base_url)
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(&self.inner.anon_key)
    }

    /// Read the response body, mapping non-success statuses to
    /// [`BackendError::Api`] with the body text as the message.
    async fn read_body(response: reqwest::Response) -> Result<String, BackendError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "backend returned non-success status"
            );
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        Ok(text)
    }

    /// Filtered/sorted read against a table.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .authorized(self.inner.http.get(self.rest_url(table, query)))
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Insert one or more rows and read the created rows back.
    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .authorized(self.inner.http.post(self.rest_url(table, "")))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Update rows matching the filter query.
    pub(crate) async fn update_rows<B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let response = self
            .authorized(self.inner.http.patch(self.rest_url(table, query)))
            .json(body)
            .send()
            .await?;

        Self::read_body(response).await?;
        Ok(())
    }

    /// Insert rows, used by admin operations that don't read rows back.
    pub(crate) async fn insert_rows<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let response = self
            .authorized(self.inner.http.post(self.rest_url(table, "")))
            .json(body)
            .send()
            .await?;

        Self::read_body(response).await?;
        Ok(())
    }

    /// Delete rows matching the filter query.
    pub(crate) async fn delete_rows(&self, table: &str, query: &str) -> Result<(), BackendError> {
        let response = self
            .authorized(self.inner.http.delete(self.rest_url(table, query)))
            .send()
            .await?;

        Self::read_body(response).await?;
        Ok(())
    }

    /// Invoke a server-side function by name.
    pub(crate) async fn invoke(&self, name: &str, body: &Value) -> Result<Value, BackendError> {
        let url = format!("{}/functions/v1/{name}", self.inner.base_url);
        let response = self
            .authorized(self.inner.http.post(url))
            .json(body)
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.inner.anon_key
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Drop all cached catalog values. Called after admin writes.
    pub(crate) fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Get all active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn active_products(&self) -> Result<Arc<Vec<Product>>, BackendError> {
        let cache_key = "products:active".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for active products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .select("products", "is_active=eq.true&order=created_at.desc")
            .await?;

        let products = Arc::new(products);
        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(Arc::clone(&products)))
            .await;

        Ok(products)
    }

    /// Get a single product by id.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for product");
            return Ok(*product);
        }

        let rows: Vec<Product> = self.select("products", &format!("id=eq.{id}")).await?;
        let product = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get up to `limit` active products sharing a tag with the given one,
    /// excluding the product itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn related_products(
        &self,
        product: &Product,
        limit: usize,
    ) -> Result<Vec<Product>, BackendError> {
        if product.tags.is_empty() {
            return Ok(Vec::new());
        }

        let tag_list = format!("{{{}}}", product.tags.join(","));
        let query = format!(
            "id=neq.{}&tags=ov.{}&is_active=eq.true&limit={limit}",
            product.id,
            urlencoding::encode(&tag_list)
        );

        self.select("products", &query).await
    }

    /// Get the singleton site configuration row.
    ///
    /// An empty table yields the default configuration; the storefront must
    /// render even before an admin has saved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn site_config(&self) -> Result<SiteConfig, BackendError> {
        let cache_key = "site:config".to_string();

        if let Some(CacheValue::Config(config)) = self.inner.cache.get(&cache_key).await {
            return Ok(*config);
        }

        let rows: Vec<SiteConfig> = self.select("site_config", "limit=1").await?;
        let config = rows.into_iter().next().unwrap_or_default();

        self.inner
            .cache
            .insert(cache_key, CacheValue::Config(Box::new(config.clone())))
            .await;

        Ok(config)
    }

    /// Get all content sections ordered by display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn sections(&self) -> Result<Arc<Vec<SiteSection>>, BackendError> {
        let cache_key = "site:sections".to_string();

        if let Some(CacheValue::Sections(sections)) = self.inner.cache.get(&cache_key).await {
            return Ok(sections);
        }

        let sections: Vec<SiteSection> = self.select("sections", "order=display_order").await?;

        let sections = Arc::new(sections);
        self.inner
            .cache
            .insert(cache_key, CacheValue::Sections(Arc::clone(&sections)))
            .await;

        Ok(sections)
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Insert a new pending order and read back the generated row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails or the backend returns no row.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_pending_order(
        &self,
        user_id: UserId,
        total: Price,
    ) -> Result<Order, BackendError> {
        let body = serde_json::json!({
            "user_id": user_id,
            "total": total,
            "status": "pending",
        });

        let rows: Vec<Order> = self.insert("orders", &body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("created order row".to_string()))
    }

    /// Bulk-insert the line items for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn create_order_items(&self, items: &[NewOrderItem]) -> Result<(), BackendError> {
        self.insert_rows("order_items", items).await
    }

    /// Get all orders belonging to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, BackendError> {
        self.select(
            "orders",
            &format!("user_id=eq.{user_id}&order=created_at.desc"),
        )
        .await
    }

    /// Get the line items of the given orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, order_ids), fields(count = order_ids.len()))]
    pub async fn order_items(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItem>, BackendError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("order_items", &format!("order_id=in.({})", id_list(order_ids)))
            .await
    }

    /// Get products by id set.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("products", &format!("id=in.({})", id_list(ids)))
            .await
    }

    /// Get the downloadable files of the given products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn product_files(&self, ids: &[ProductId]) -> Result<Vec<ProductFile>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("product_files", &format!("product_id=in.({})", id_list(ids)))
            .await
    }
}

/// Comma-separated id list for an `in.(...)` filter.
fn id_list<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// Checkout / reconciliation collaborator impls
// =============================================================================

impl CheckoutApi for BackendClient {
    async fn create_order(&self, user_id: UserId, total: Price) -> Result<Order, BackendError> {
        self.create_pending_order(user_id, total).await
    }

    async fn create_order_items(&self, items: &[NewOrderItem]) -> Result<(), BackendError> {
        Self::create_order_items(self, items).await
    }

    async fn create_payment_session(
        &self,
        request: &PaymentSessionRequest,
    ) -> Result<Value, BackendError> {
        // The secret token is exposed exactly here, straight into the
        // function body, and nowhere else.
        let body = serde_json::json!({
            "orderId": request.order_id,
            "userEmail": request.user_email,
            "publicKey": request.public_key,
            "accessToken": request.access_token.expose_secret(),
            "items": request.items,
            "backUrls": request.back_urls,
        });

        self.invoke("create-payment", &body).await
    }
}

impl OrderEvents for BackendClient {
    async fn verify_payment(&self, order_id: OrderId, source: &str) -> Result<(), BackendError> {
        let body = serde_json::json!({
            "orderId": order_id,
            "source": source,
        });
        // No response contract; the call is purely a trigger for
        // server-side reconciliation.
        self.invoke("verify-payment", &body).await?;
        Ok(())
    }

    async fn subscribe_order(&self, order_id: OrderId) -> Result<OrderSubscription, BackendError> {
        realtime::subscribe_order(&self.inner.base_url, &self.inner.anon_key, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list_formatting() {
        let ids = vec![OrderId::generate(), OrderId::generate()];
        let list = id_list(&ids);
        let first = ids.first().map(ToString::to_string).unwrap_or_default();
        assert!(list.starts_with(&first));
        assert_eq!(list.matches(',').count(), 1);
    }
}
