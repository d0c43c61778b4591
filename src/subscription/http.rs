//! Request-state machinery for HTTP reads and writes.
//!
//! Every page of the console talks to the backend through one of two shapes:
//!
//! - **Queries** ([`query`]): subscription-based reads. A [`query::Query`] is
//!   declared with a key and a set of dependency values; the dependencies are
//!   part of the subscription identity, so changing them cancels the old
//!   request and starts a new one from `Loading`. The page feeds the
//!   emitted events into a [`query::QueryMachine`], an explicit state machine
//!   that is independent of the runtime and testable headlessly.
//! - **Mutations** ([`mutation`]): command-based writes (POST, PUT, DELETE).
//!   A [`mutation::Mutation`] runs once and delivers its outcome as a
//!   message; the page tracks it in a [`mutation::MutationMachine`].
//!
//! Both machines enforce the same race rule: each started operation gets a
//! monotonically increasing token, and a settlement is applied only if it
//! belongs to the latest started operation. A result that arrives after a
//! newer request began (or after the page navigated away and its
//! subscription was cancelled) never overwrites newer state.
//!
//! There is no caching, no automatic retry and no timeout: a failure is
//! terminal for that invocation, and a hanging request stays `Loading` until
//! the transport gives up. Pages refetch by bumping a counter that is part of
//! the query's dependencies.

pub mod mutation;
pub mod query;

pub use mutation::{Mutation, MutationMachine, MutationState};
pub use query::{Query, QueryEvent, QueryMachine, QueryState, RequestToken};
