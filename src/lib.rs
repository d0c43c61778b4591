//! # Souk - Marketplace Admin Console
//!
//! Souk is a terminal admin console for a marketplace backend, built on the
//! Elm Architecture (TEA) on top of [ratatui](https://ratatui.rs/). It
//! provides list, detail, create and edit pages for the four marketplace
//! entities (buyers, sellers, products and orders), backed by a thin typed
//! client for the backend's REST API.
//!
//! ## Architecture
//!
//! The application follows the Elm Architecture pattern:
//!
//! 1. **Model**: The [`app::App`] state (active route + page models)
//! 2. **Message**: Events that can change the state
//! 3. **Update**: Function that processes messages and updates the model
//! 4. **View**: Function that renders the UI based on the current model
//! 5. **Subscriptions**: External event sources (terminal input, HTTP queries)
//! 6. **Commands**: Asynchronous side effects (HTTP mutations, navigation)
//!
//! ## Core Components
//!
//! - [`Application`](application::Application): The trait that defines an application
//! - [`Runtime`](runtime::Runtime): Manages the application lifecycle and event loop
//! - [`Command`](command::Command): Represents asynchronous side effects
//! - [`Subscription`](subscription::Subscription): Represents ongoing event sources
//! - [`Query`](subscription::http::Query) / [`QueryMachine`](subscription::http::QueryMachine):
//!   dependency-keyed reads with an explicit request-state machine
//! - [`Mutation`](subscription::http::Mutation) / [`MutationMachine`](subscription::http::MutationMachine):
//!   one-off writes with the same token-guarded state handling
//! - [`ApiClient`](api::ApiClient): typed client for the marketplace REST API
//!
//! ## Request-state handling
//!
//! Pages never talk to the backend directly from rendering code. A read is a
//! [`Query`](subscription::http::Query) subscription whose identity includes
//! its dependency values: navigate to another order and the old request is
//! torn down, the new one starts from `Loading`. A write is a
//! [`Mutation`](subscription::http::Mutation) command. Both feed explicit
//! state machines that retain previous data while a request is in flight and
//! discard settlements from superseded requests, so a slow response can never
//! overwrite the state of a newer one.
//!
//! ## Running the console
//!
//! The `souk` binary connects to `http://localhost:8085/api` by default; set
//! `SOUK_API_URL` to point it elsewhere. Set `SOUK_LOG` to a file path to
//! capture tracing output without disturbing the TUI.
//!
//! ## Design Inspiration
//!
//! The runtime layer is modeled on iced 0.12, adapted for TUI applications;
//! the request-state layer borrows its vocabulary from SWR and TanStack
//! Query, without the caching.

pub mod api;
pub mod app;
pub mod application;
pub mod command;
pub mod pages;
pub mod prelude;
pub mod runtime;
pub mod subscription;
