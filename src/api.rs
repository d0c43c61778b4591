//! Client for the marketplace REST backend.
//!
//! The backend owns all business rules (inventory, pricing, status
//! transitions, persistence); this module is a thin, typed mapping from
//! domain operations to HTTP requests. One method per endpoint, JSON in and
//! out, and a single normalization funnel that turns every failure
//! (transport error, non-2xx response, undecodable body) into the uniform
//! [`ApiError`] shape that the request-state machinery stores and pages
//! render.
//!
//! There is deliberately no caching, no retrying, no request deduplication
//! and no auth handling here. The client is an explicit object: construct
//! one [`ApiClient`] at startup and hand it to every page by `Arc`.
//!
//! # Example
//!
//! ```no_run
//! use souk::api::{ApiClient, ApiConfig};
//!
//! # async fn run() -> Result<(), souk::api::ApiError> {
//! let client = ApiClient::new(ApiConfig::from_env()).expect("http client");
//! let buyers = client.buyers().await?;
//! println!("{} buyers", buyers.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::ApiError;
pub use types::{
    Buyer, BuyerUpdate, NewBuyer, NewOrder, NewOrderItem, NewProduct, NewSeller, Order, OrderItem,
    OrderStatus, Product, ProductStatus, ProductUpdate, Role, Seller, SellerUpdate,
};
