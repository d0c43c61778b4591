//! Terminal event subscription.
//!
//! Wraps crossterm's [`EventStream`] as a subscription source, yielding key,
//! mouse and resize events to the application. Every page of the admin
//! console declares this subscription; it is a singleton, so it keeps running
//! across route changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use futures::stream::BoxStream;

use super::{SubscriptionId, SubscriptionSource};

/// A subscription source for terminal input events.
///
/// Yields `io::Result<Event>`: once the stream itself fails, consumers
/// usually treat the terminal as unusable and quit.
///
/// # Examples
///
/// ```no_run
/// use crossterm::event::Event;
/// use souk::subscription::{Subscription, terminal::TerminalEvents};
///
/// enum Message {
///     Terminal(Event),
///     TerminalError(String),
/// }
///
/// let sub = Subscription::new(TerminalEvents::new()).map(|result| match result {
///     Ok(event) => Message::Terminal(event),
///     Err(e) => Message::TerminalError(e.to_string()),
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TerminalEvents;

impl TerminalEvents {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SubscriptionSource for TerminalEvents {
    type Output = io::Result<Event>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        EventStream::new().boxed()
    }

    fn id(&self) -> SubscriptionId {
        // Singleton: all instances share one identity.
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events_new() {
        let sub = TerminalEvents::new();
        assert_eq!(sub, TerminalEvents);
    }

    #[test]
    fn test_terminal_events_id_consistency() {
        let sub1 = TerminalEvents::new();
        let sub2 = TerminalEvents::new();
        assert_eq!(sub1.id(), sub2.id());
    }
}
