//! Subscription-based reads with dependency-driven refetching.
//!
//! A query binds an async read to a set of dependency values. The
//! [`QueryMachine`] holds the observable state (data, loading flag, error)
//! and the [`Query`] subscription source drives it through the runtime:
//!
//! 1. On subscription, the stream emits `Started` and the machine enters
//!    `Loading`, retaining the previous data and error so the UI does not
//!    flicker to an empty state on refetch.
//! 2. The fetcher runs once; the stream emits `Settled` with the outcome and
//!    ends.
//! 3. When a dependency changes, the subscription identity changes: the
//!    manager cancels the old instance (suppressing anything it had left to
//!    say) and starts a new one, which restarts the machine from `Loading`.
//!
//! The machine never retries and never transitions on its own after
//! settlement; only a new `Started` event or an explicit [`QueryMachine::begin`]
//! moves it again.
//!
//! # Example
//!
//! ```rust,ignore
//! fn subscriptions(&self) -> Vec<Subscription<Message>> {
//!     let client = self.client.clone();
//!     vec![
//!         Subscription::new(Query::new("buyers", &self.refresh, move || {
//!             let client = client.clone();
//!             Box::pin(async move { client.buyers().await })
//!         }))
//!         .map(Message::BuyersFetched),
//!     ]
//! }
//!
//! fn update(&mut self, msg: Message) -> Command<Message> {
//!     match msg {
//!         Message::BuyersFetched(event) => {
//!             self.buyers.on_event(event);
//!             Command::none()
//!         }
//!     }
//! }
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

use crate::api::ApiError;
use crate::subscription::{SubscriptionId, SubscriptionSource};

/// Monotonically increasing identifier for one started operation.
///
/// Settlements carry the token of the operation they belong to; a machine
/// applies a settlement only when its token is the latest issued. This is the
/// at-most-one-active-result-applies rule.
pub type RequestToken = u64;

/// The observable state of a query.
///
/// The three variants are mutually exclusive by construction: an observer
/// sees exactly one of in-flight, settled-with-data or settled-with-error.
/// While in flight, the previous data and error ride along as priors so that
/// a refetching list keeps rendering its rows.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
    /// An operation is outstanding. Priors come from the previous settlement.
    Loading {
        prior_data: Option<T>,
        prior_error: Option<ApiError>,
    },
    /// The most recent operation produced a value.
    Success { data: T },
    /// The most recent operation failed.
    Failed { error: ApiError },
}

impl<T> QueryState<T> {
    /// Returns the visible data: the settled value, or the retained prior
    /// while a refetch is in flight.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Loading { prior_data, .. } => prior_data.as_ref(),
            Self::Success { data } => Some(data),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the visible error: the settled failure, or the retained prior
    /// while a refetch is in flight.
    pub const fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Loading { prior_error, .. } => prior_error.as_ref(),
            Self::Success { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }

    /// Returns `true` while an operation is outstanding.
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

/// Explicit state machine for one query instance.
///
/// Lives in page state and is driven either by [`QueryEvent`]s from a
/// [`Query`] subscription or manually through [`begin`](Self::begin) /
/// [`settle`](Self::settle). Headless: no runtime, no UI framework, no I/O.
#[derive(Debug)]
pub struct QueryMachine<T> {
    state: QueryState<T>,
    next_token: RequestToken,
    in_flight: Option<Flight>,
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    token: RequestToken,
    fingerprint: u64,
}

impl<T> QueryMachine<T> {
    /// Creates a machine in the initial state: loading, nothing retained.
    ///
    /// Queries start life loading because a query-bound page fetches on
    /// mount; there is no idle phase to observe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: QueryState::Loading {
                prior_data: None,
                prior_error: None,
            },
            next_token: 0,
            in_flight: None,
        }
    }

    /// Starts a new operation, returning its token.
    ///
    /// Transitions to `Loading`, retaining current data and error as priors.
    /// Any previously outstanding operation is superseded: its settlement
    /// will no longer apply.
    pub fn begin(&mut self) -> RequestToken {
        // Manual begins key the flight by its own token.
        let fingerprint = self.next_token;
        self.begin_keyed(fingerprint)
    }

    fn begin_keyed(&mut self, fingerprint: u64) -> RequestToken {
        let token = self.next_token;
        self.next_token += 1;

        let previous = std::mem::replace(
            &mut self.state,
            QueryState::Loading {
                prior_data: None,
                prior_error: None,
            },
        );
        let (prior_data, prior_error) = match previous {
            QueryState::Loading {
                prior_data,
                prior_error,
            } => (prior_data, prior_error),
            QueryState::Success { data } => (Some(data), None),
            QueryState::Failed { error } => (None, Some(error)),
        };
        self.state = QueryState::Loading {
            prior_data,
            prior_error,
        };
        self.in_flight = Some(Flight { token, fingerprint });

        token
    }

    /// Applies a settlement if `token` belongs to the latest started
    /// operation; otherwise discards it and returns `false`.
    pub fn settle(&mut self, token: RequestToken, outcome: Result<T, ApiError>) -> bool {
        match self.in_flight {
            Some(flight) if flight.token == token => {
                self.state = match outcome {
                    Ok(data) => QueryState::Success { data },
                    Err(error) => QueryState::Failed { error },
                };
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Feeds one event from a [`Query`] subscription into the machine.
    ///
    /// Returns `true` if the event changed the state. Settlements whose
    /// fingerprint does not match the latest started request are discarded;
    /// together with subscription cancellation this is what keeps a stale
    /// response from overwriting the state of a newer request.
    pub fn on_event(&mut self, event: QueryEvent<T>) -> bool {
        match event.phase {
            QueryPhase::Started => {
                self.begin_keyed(event.fingerprint);
                true
            }
            QueryPhase::Settled(outcome) => match self.in_flight {
                Some(flight) if flight.fingerprint == event.fingerprint => {
                    self.settle(flight.token, outcome)
                }
                _ => false,
            },
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &QueryState<T> {
        &self.state
    }

    /// Visible data, retained priors included.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.state.data()
    }

    /// Visible error, retained priors included.
    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        self.state.error()
    }

    /// Whether an operation is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Whether the visible error is the backend's "resource absent" answer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.error().is_some_and(ApiError::is_not_found)
    }
}

impl<T> Default for QueryMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One lifecycle event of a query subscription.
#[derive(Debug, Clone)]
pub struct QueryEvent<V> {
    fingerprint: u64,
    phase: QueryPhase<V>,
}

#[derive(Debug, Clone)]
enum QueryPhase<V> {
    Started,
    Settled(Result<V, ApiError>),
}

/// A subscription source that runs an async read once per subscription.
///
/// The identity hashes the key together with the dependency values, so a
/// dependency change produces a different subscription: the manager cancels
/// the old instance and starts this one fresh.
pub struct Query<V> {
    fingerprint: u64,
    fetcher: Arc<dyn Fn() -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync>,
}

impl<V> Query<V>
where
    V: Send + 'static,
{
    /// Creates a query from a key, its dependency values and a fetcher.
    ///
    /// # Arguments
    ///
    /// * `key` - Names the query; distinguishes queries that happen to share
    ///   dependency values (for example two lists keyed by the same id)
    /// * `deps` - Dependency values; hashed into the subscription identity
    /// * `fetcher` - The async read to perform
    pub fn new<D, F>(key: &str, deps: &D, fetcher: F) -> Self
    where
        D: Hash + ?Sized,
        F: Fn() -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync + 'static,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        deps.hash(&mut hasher);

        Self {
            fingerprint: hasher.finish(),
            fetcher: Arc::new(fetcher),
        }
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Send + 'static,
{
    type Output = QueryEvent<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let fingerprint = self.fingerprint;
        let fetcher = self.fetcher.clone();

        stream::unfold(Phase::Start, move |phase| {
            let fetcher = fetcher.clone();

            async move {
                match phase {
                    Phase::Start => Some((
                        QueryEvent {
                            fingerprint,
                            phase: QueryPhase::Started,
                        },
                        Phase::Fetch,
                    )),
                    Phase::Fetch => {
                        let outcome = fetcher().await;
                        Some((
                            QueryEvent {
                                fingerprint,
                                phase: QueryPhase::Settled(outcome),
                            },
                            Phase::Done,
                        ))
                    }
                    Phase::Done => None,
                }
            }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(self.fingerprint)
    }
}

/// Internal state machine for the query stream.
enum Phase {
    Start,
    Fetch,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(status: u16) -> ApiError {
        ApiError::from_response(status, r#"{"message":"boom"}"#)
    }

    #[test]
    fn test_machine_starts_loading_with_nothing_retained() {
        let machine = QueryMachine::<i32>::new();
        assert!(machine.is_loading());
        assert_eq!(machine.data(), None);
        assert!(machine.error().is_none());
    }

    #[test]
    fn test_settle_success_then_failure() {
        let mut machine = QueryMachine::new();
        let token = machine.begin();
        assert!(machine.settle(token, Ok(7)));
        assert_eq!(machine.data(), Some(&7));
        assert!(machine.error().is_none());
        assert!(!machine.is_loading());

        let token = machine.begin();
        assert!(machine.settle(token, Err(error(500))));
        assert_eq!(machine.data(), None);
        assert!(machine.error().is_some());
        assert!(!machine.is_loading());
    }

    #[test]
    fn test_begin_retains_prior_data_while_loading() {
        let mut machine = QueryMachine::new();
        let token = machine.begin();
        machine.settle(token, Ok(vec![1, 2, 3]));

        // A refetch is observable as loading *before* any new data, while
        // the previous data stays visible.
        machine.begin();
        assert!(machine.is_loading());
        assert_eq!(machine.data(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_begin_retains_prior_error_while_loading() {
        let mut machine = QueryMachine::<i32>::new();
        let token = machine.begin();
        machine.settle(token, Err(error(500)));

        machine.begin();
        assert!(machine.is_loading());
        assert!(machine.error().is_some());
        assert_eq!(machine.data(), None);
    }

    #[test]
    fn test_stale_settlement_is_discarded() {
        let mut machine = QueryMachine::new();
        let stale = machine.begin();
        let current = machine.begin();

        // The superseded operation must not overwrite state.
        assert!(!machine.settle(stale, Ok(1)));
        assert!(machine.is_loading());

        assert!(machine.settle(current, Ok(2)));
        assert_eq!(machine.data(), Some(&2));
    }

    #[test]
    fn test_settlement_after_settlement_is_discarded() {
        let mut machine = QueryMachine::new();
        let token = machine.begin();
        assert!(machine.settle(token, Ok(1)));

        // Same token again: nothing outstanding, nothing applied.
        assert!(!machine.settle(token, Ok(99)));
        assert_eq!(machine.data(), Some(&1));
    }

    #[test]
    fn test_exactly_one_of_data_and_error_after_settlement() {
        let mut machine = QueryMachine::new();
        let token = machine.begin();
        machine.settle(token, Ok(5));
        assert!(machine.data().is_some() && machine.error().is_none());

        let token = machine.begin();
        machine.settle(token, Err(error(500)));
        assert!(machine.data().is_none() && machine.error().is_some());
    }

    #[test]
    fn test_on_event_drives_full_cycle() {
        let mut machine = QueryMachine::new();

        let started = QueryEvent {
            fingerprint: 11,
            phase: QueryPhase::Started,
        };
        assert!(machine.on_event(started));
        assert!(machine.is_loading());

        let settled = QueryEvent {
            fingerprint: 11,
            phase: QueryPhase::Settled(Ok(42)),
        };
        assert!(machine.on_event(settled));
        assert_eq!(machine.data(), Some(&42));
    }

    #[test]
    fn test_on_event_discards_settlement_of_superseded_request() {
        let mut machine = QueryMachine::new();

        machine.on_event(QueryEvent {
            fingerprint: 11,
            phase: QueryPhase::Started,
        });
        // Dependencies changed: a new request started.
        machine.on_event(QueryEvent {
            fingerprint: 22,
            phase: QueryPhase::Started,
        });

        // The old request's settlement must be inert.
        assert!(!machine.on_event(QueryEvent {
            fingerprint: 11,
            phase: QueryPhase::Settled(Ok(1)),
        }));
        assert!(machine.is_loading());

        assert!(machine.on_event(QueryEvent {
            fingerprint: 22,
            phase: QueryPhase::Settled(Ok(2)),
        }));
        assert_eq!(machine.data(), Some(&2));
    }

    #[test]
    fn test_not_found_is_visible_as_such() {
        let mut machine = QueryMachine::<i32>::new();
        let token = machine.begin();
        machine.settle(token, Err(error(404)));
        assert!(machine.is_not_found());

        let token = machine.begin();
        machine.settle(token, Err(error(500)));
        assert!(!machine.is_not_found());
    }

    #[test]
    fn test_query_id_changes_with_dependencies() {
        let fetch = || -> BoxFuture<'static, Result<i32, ApiError>> { Box::pin(async { Ok(1) }) };

        let q1 = Query::new("order", &1u64, fetch);
        let q2 = Query::new("order", &1u64, fetch);
        let q3 = Query::new("order", &2u64, fetch);

        assert_eq!(q1.id(), q2.id());
        assert_ne!(q1.id(), q3.id());
    }

    #[test]
    fn test_query_id_changes_with_key() {
        let fetch = || -> BoxFuture<'static, Result<i32, ApiError>> { Box::pin(async { Ok(1) }) };

        let by_id = Query::new("product", &7u64, fetch);
        let by_seller = Query::new("products-by-seller", &7u64, fetch);

        assert_ne!(by_id.id(), by_seller.id());
    }

    #[tokio::test]
    async fn test_stream_emits_started_then_settled() {
        let query = Query::new("answer", &(), || {
            Box::pin(async { Ok::<i32, ApiError>(42) })
        });

        let mut stream = query.stream();
        let mut machine = QueryMachine::new();

        let started = stream.next().await.expect("should emit started");
        machine.on_event(started);
        assert!(machine.is_loading());

        let settled = stream.next().await.expect("should emit settled");
        machine.on_event(settled);
        assert_eq!(machine.data(), Some(&42));

        assert!(stream.next().await.is_none(), "stream ends after settling");
    }

    #[tokio::test]
    async fn test_stream_settles_with_error() {
        let query = Query::new("broken", &(), || {
            Box::pin(async { Err::<i32, ApiError>(error(503)) })
        });

        let mut stream = query.stream();
        let mut machine = QueryMachine::new();

        while let Some(event) = stream.next().await {
            machine.on_event(event);
        }

        assert_eq!(machine.error().map(|e| e.status), Some(503));
        assert_eq!(machine.data(), None);
    }
}
