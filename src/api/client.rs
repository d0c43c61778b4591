use reqwest::RequestBuilder;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use super::config::ApiConfig;
use super::error::ApiError;
use super::types::{
    Buyer, BuyerUpdate, NewBuyer, NewOrder, NewProduct, NewSeller, Order, OrderStatus, Product,
    ProductUpdate, Seller, SellerUpdate,
};

/// Typed client for the marketplace backend.
///
/// Stateless beyond the connection pool: no caching, no retries, no
/// deduplication. Every operation resolves to the decoded response body or a
/// normalized [`ApiError`]; see [`ApiClient::execute`] for the single funnel
/// all responses pass through.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Builds a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be constructed.
    pub fn new(config: ApiConfig) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// The normalization funnel: every response, from every endpoint, goes
    /// through here so callers always see the same error shape.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|error| {
            tracing::warn!(%error, "transport failure");
            ApiError::from_transport(&error)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::from_transport(&error))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "backend rejected request");
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|error| ApiError::from_decode(&error))
    }

    /// Like [`Self::execute`] for endpoints whose success response carries no
    /// body (deletes and cancels).
    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await.map_err(|error| {
            tracing::warn!(%error, "transport failure");
            ApiError::from_transport(&error)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|error| ApiError::from_transport(&error))?;
            tracing::warn!(status = status.as_u16(), "backend rejected request");
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(())
    }

    // Buyers

    pub async fn buyers(&self) -> Result<Vec<Buyer>, ApiError> {
        self.execute(self.http.get(self.url("/buyers"))).await
    }

    pub async fn buyer(&self, id: u64) -> Result<Buyer, ApiError> {
        self.execute(self.http.get(self.url(&format!("/buyers/{id}"))))
            .await
    }

    pub async fn create_buyer(&self, buyer: &NewBuyer) -> Result<Buyer, ApiError> {
        self.execute(self.http.post(self.url("/buyers")).json(buyer))
            .await
    }

    pub async fn update_buyer(&self, id: u64, update: &BuyerUpdate) -> Result<Buyer, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/buyers/{id}")))
                .json(update),
        )
        .await
    }

    pub async fn delete_buyer(&self, id: u64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/buyers/{id}"))))
            .await
    }

    // Sellers

    pub async fn sellers(&self) -> Result<Vec<Seller>, ApiError> {
        self.execute(self.http.get(self.url("/sellers"))).await
    }

    pub async fn seller(&self, id: u64) -> Result<Seller, ApiError> {
        self.execute(self.http.get(self.url(&format!("/sellers/{id}"))))
            .await
    }

    pub async fn create_seller(&self, seller: &NewSeller) -> Result<Seller, ApiError> {
        self.execute(self.http.post(self.url("/sellers")).json(seller))
            .await
    }

    pub async fn update_seller(&self, id: u64, update: &SellerUpdate) -> Result<Seller, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/sellers/{id}")))
                .json(update),
        )
        .await
    }

    pub async fn delete_seller(&self, id: u64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/sellers/{id}"))))
            .await
    }

    // Products

    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.execute(self.http.get(self.url("/products"))).await
    }

    pub async fn product(&self, id: u64) -> Result<Product, ApiError> {
        self.execute(self.http.get(self.url(&format!("/products/{id}"))))
            .await
    }

    pub async fn products_by_seller(&self, seller_id: u64) -> Result<Vec<Product>, ApiError> {
        self.execute(
            self.http
                .get(self.url(&format!("/products/seller/{seller_id}"))),
        )
        .await
    }

    pub async fn products_by_category(&self, category: &str) -> Result<Vec<Product>, ApiError> {
        self.execute(
            self.http
                .get(self.url(&format!("/products/category/{category}"))),
        )
        .await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.execute(self.http.post(self.url("/products")).json(product))
            .await
    }

    pub async fn update_product(&self, id: u64, update: &ProductUpdate) -> Result<Product, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/products/{id}")))
                .json(update),
        )
        .await
    }

    pub async fn delete_product(&self, id: u64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/products/{id}"))))
            .await
    }

    // Orders

    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.execute(self.http.get(self.url("/orders"))).await
    }

    pub async fn order(&self, id: u64) -> Result<Order, ApiError> {
        self.execute(self.http.get(self.url(&format!("/orders/{id}"))))
            .await
    }

    pub async fn order_by_number(&self, order_number: &str) -> Result<Order, ApiError> {
        self.execute(
            self.http
                .get(self.url(&format!("/orders/number/{order_number}"))),
        )
        .await
    }

    pub async fn orders_by_buyer(&self, buyer_id: u64) -> Result<Vec<Order>, ApiError> {
        self.execute(self.http.get(self.url(&format!("/orders/buyer/{buyer_id}"))))
            .await
    }

    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        self.execute(self.http.post(self.url("/orders")).json(order))
            .await
    }

    pub async fn update_order_status(
        &self,
        id: u64,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/orders/{id}/status")))
                .query(&[("status", status.as_str())]),
        )
        .await
    }

    pub async fn update_tracking(&self, id: u64, tracking_number: &str) -> Result<Order, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/orders/{id}/tracking")))
                .query(&[("trackingNumber", tracking_number)]),
        )
        .await
    }

    pub async fn cancel_order(&self, id: u64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/orders/{id}/cancel"))))
            .await
    }
}
