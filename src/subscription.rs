//! Subscriptions: ongoing sources of messages.
//!
//! A [`SubscriptionSource`] produces a stream of values together with an
//! identity. The identity is what makes subscriptions declarative: on every
//! update cycle the application declares the full set of subscriptions it
//! wants, and the [`SubscriptionManager`] diffs that set against the running
//! one; sources whose identity disappeared are cancelled, sources with a new
//! identity are started. A source whose parameters are part of its identity
//! (for example an HTTP query keyed by its dependencies) is therefore
//! restarted from scratch whenever those parameters change.
//!
//! Cancellation is cooperative: the forwarding task for a cancelled
//! subscription stops sending messages, so a value produced after the
//! application stopped declaring the subscription is never observed. This is
//! the mechanism that keeps results of abandoned HTTP queries from reaching a
//! page that has navigated away.

pub mod http;
pub mod mock;
pub mod terminal;

use std::any::TypeId;
use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::Action;

/// Identity of a subscription.
///
/// Two subscriptions are the same iff they were produced by the same source
/// type and hash their parameters to the same value. The source type is part
/// of the identity so that, say, a query for `Vec<Buyer>` and a query for
/// `Vec<Seller>` can never collide even if their parameter hashes do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    source: TypeId,
    value: u64,
}

impl SubscriptionId {
    /// Creates an identity for source type `S` from a parameter hash.
    #[must_use]
    pub fn of<S: 'static>(value: u64) -> Self {
        Self {
            source: TypeId::of::<S>(),
            value,
        }
    }
}

/// A source of subscription values.
///
/// Implementors provide a stream of output values and an identity derived
/// from their parameters. See the module docs for how identity drives the
/// subscription lifecycle.
pub trait SubscriptionSource {
    /// The values this source emits.
    type Output;

    /// Opens a fresh stream of values.
    ///
    /// Called once each time the subscription is (re)started.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// The identity of this source given its current parameters.
    fn id(&self) -> SubscriptionId;
}

/// A declared subscription, mapped into the application's message type.
///
/// # Examples
///
/// ```
/// use souk::subscription::{Subscription, mock::MockSource};
///
/// enum Message {
///     Ping,
/// }
///
/// let source = MockSource::<()>::new();
/// let sub: Subscription<Message> = Subscription::new(source).map(|()| Message::Ping);
/// ```
pub struct Subscription<Msg> {
    id: SubscriptionId,
    pub(crate) spawn: Box<dyn Fn() -> BoxStream<'static, Msg> + Send>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a source into a subscription.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg> + Send + 'static,
    {
        let id = source.id();
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Converts the emitted values into another message type.
    ///
    /// The identity is preserved: mapping does not restart a subscription.
    pub fn map<B, F>(self, f: F) -> Subscription<B>
    where
        B: Send + 'static,
        F: Fn(Msg) -> B + Clone + Send + Sync + 'static,
    {
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Box::new(move || {
                let f = f.clone();
                (spawn)().map(move |value| f(value)).boxed()
            }),
        }
    }

    /// The identity of this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Handle for a running subscription task.
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Cancel the subscription and wait for task completion.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

/// Reconciles declared subscriptions with running tasks.
///
/// Owned by the runtime; applications never construct one directly.
pub struct SubscriptionManager<Msg> {
    tx: mpsc::UnboundedSender<Action<Msg>>,
    active: HashMap<SubscriptionId, Handle>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    pub fn new(tx: mpsc::UnboundedSender<Action<Msg>>) -> Self {
        Self {
            tx,
            active: HashMap::new(),
        }
    }

    /// Diffs the declared set against the running set.
    ///
    /// Removed subscriptions are cancelled *before* new ones are started, so
    /// that a parameter change (same source, new identity) never has the old
    /// and new instance racing each other's messages.
    pub fn update(&mut self, declared: Vec<Subscription<Msg>>) {
        let mut wanted: HashMap<SubscriptionId, Subscription<Msg>> = HashMap::new();
        for sub in declared {
            wanted.entry(sub.id()).or_insert(sub);
        }

        let stale: Vec<SubscriptionId> = self
            .active
            .keys()
            .filter(|id| !wanted.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(handle) = self.active.remove(&id) {
                tracing::debug!(?id, "cancelling subscription");
                // Cancel now; reap the task in the background.
                handle.token.cancel();
                tokio::spawn(async move {
                    let _ = handle.join.await;
                });
            }
        }

        for (id, sub) in wanted {
            if !self.active.contains_key(&id) {
                tracing::debug!(?id, "starting subscription");
                let handle = self.start(&sub);
                self.active.insert(id, handle);
            }
        }
    }

    fn start(&self, subscription: &Subscription<Msg>) -> Handle {
        let token = CancellationToken::new();
        let child = token.clone();
        let tx = self.tx.clone();
        let mut stream = (subscription.spawn)();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = child.cancelled() => break,
                    item = stream.next() => match item {
                        Some(msg) => {
                            if tx.send(Action::Message(msg)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }

    /// Cancels every running subscription and waits for the tasks to finish.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.cancel().await;
        }
    }

    /// Number of currently running subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no subscription is currently running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
