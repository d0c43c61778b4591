//! Mock subscription source for testing.
//!
//! [`MockSource`] is a controllable source that emits values on demand,
//! enabling deterministic tests without real I/O or time dependencies. It is
//! cloneable and shares one underlying channel between all clones, so a test
//! can hold one clone while the application's `subscriptions()` declares
//! another:
//!
//! ```no_run
//! use souk::subscription::{Subscription, mock::MockSource};
//!
//! enum Message {
//!     Refresh,
//! }
//!
//! let mock = MockSource::<()>::new();
//!
//! // The application declares the mock...
//! let sub = Subscription::new(mock.clone()).map(|()| Message::Refresh);
//!
//! // ...and the test drives it.
//! let _ = mock.emit(());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;

use crate::subscription::{SubscriptionId, SubscriptionSource};

/// A mock subscription source that emits values on demand.
///
/// Each instance gets a unique identity, so two separate `MockSource`s are
/// two separate subscriptions even when they carry the same value type;
/// clones of one instance share its identity and channel.
#[derive(Debug, Clone)]
pub struct MockSource<T: Clone> {
    sender: broadcast::Sender<T>,
    id: SubscriptionId,
}

impl<T: Clone + 'static> MockSource<T> {
    /// Creates a new mock subscription source with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if the system time is before [`std::time::UNIX_EPOCH`].
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        // Per-instance identity: timestamp + type name.
        let mut hasher = DefaultHasher::new();
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("System time before UNIX_EPOCH")
            .as_nanos()
            .hash(&mut hasher);
        std::any::type_name::<T>().hash(&mut hasher);

        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            sender: tx,
            id: SubscriptionId::of::<Self>(hasher.finish()),
        }
    }

    /// Creates a new mock subscription source with default capacity (100).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Emits a value from the subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no active receivers.
    pub fn emit(&self, value: T) -> Result<usize, broadcast::error::SendError<T>> {
        self.sender.send(value)
    }

    /// Returns the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + 'static> Default for MockSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SubscriptionSource for MockSource<T> {
    type Output = T;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let rx = self.sender.subscribe();
        tokio_stream::wrappers::BroadcastStream::new(rx)
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Subscription;
    use futures::StreamExt;

    #[test]
    fn test_mock_source_creation() {
        let mock = MockSource::<i32>::new();
        assert_eq!(mock.receiver_count(), 0);
    }

    #[test]
    fn test_emit() {
        let mock = MockSource::<i32>::new();

        // No receivers yet
        assert!(mock.emit(42).is_err());

        // Subscribe
        let _rx = mock.sender.subscribe();
        assert_eq!(mock.receiver_count(), 1);

        // Now emit works
        assert_eq!(mock.emit(42).expect("should emit to receiver"), 1);
        assert_eq!(mock.emit(100).expect("should emit to receiver"), 1);
    }

    #[test]
    fn test_clone_shares_channel_and_identity() {
        let mock1 = MockSource::<i32>::new();
        let mock2 = mock1.clone();

        let _rx = mock1.sender.subscribe();
        assert_eq!(mock2.receiver_count(), 1);
        assert_eq!(mock1.id(), mock2.id());
    }

    #[test]
    fn test_separate_instances_have_separate_identities() {
        let mock1 = MockSource::<i32>::new();
        let mock2 = MockSource::<i32>::new();
        assert_ne!(mock1.id(), mock2.id());
    }

    #[tokio::test]
    async fn test_stream_receives_values() {
        let mock = MockSource::<i32>::new();

        let sub = Subscription::new(mock.clone());
        let mut stream = (sub.spawn)();

        mock.emit(1).expect("should emit to stream");
        mock.emit(2).expect("should emit to stream");
        mock.emit(3).expect("should emit to stream");

        let mut values = Vec::new();
        for _ in 0..3 {
            if let Some(value) = stream.next().await {
                values.push(value);
            }
        }

        assert_eq!(values, vec![1, 2, 3]);
    }
}
