//! Command-based writes: create, update, delete.
//!
//! Mutations are one-off operations returned from `update` as a `Command`.
//! The page keeps a [`MutationMachine`] next to the form it belongs to,
//! begins it when the user submits, and settles it when the outcome message
//! comes back:
//!
//! ```rust,ignore
//! Message::Submit => {
//!     let payload = self.form.to_payload();
//!     let client = self.client.clone();
//!     let token = self.save.begin();
//!     Mutation::mutate(payload, move |payload| {
//!         Box::pin(async move { client.create_buyer(&payload).await })
//!     })
//!     .map(move |outcome| Message::Saved(token, outcome))
//! }
//! Message::Saved(token, outcome) => {
//!     if self.save.settle(token, outcome) && self.save.is_success() {
//!         return Command::single(Message::Navigate(Route::BuyerList));
//!     }
//!     Command::none()
//! }
//! ```
//!
//! Overlapping invocations of the same machine are resolved latest-wins:
//! each `begin` supersedes the one before it, and a settlement bearing a
//! superseded token is discarded. Pages additionally disable submission
//! while a mutation is loading, so superseded settlements are rare in
//! practice; the guard exists for the straggler that arrives anyway.

use std::marker::PhantomData;

use futures::future::BoxFuture;

use crate::api::ApiError;
use crate::command::Command;

use super::query::RequestToken;

/// The observable state of a mutation.
///
/// Unlike queries, mutations have an idle phase: nothing has been invoked
/// yet. Starting an invocation clears the previous error and success flag
/// but retains the previous data until settlement.
#[derive(Debug, Clone)]
pub enum MutationState<T> {
    /// No invocation yet, or machine reset.
    Idle,
    /// An invocation is outstanding. Prior data from the last success rides
    /// along; prior error does not (a fresh attempt starts clean).
    Loading { prior_data: Option<T> },
    /// The most recent invocation succeeded.
    Success { data: T },
    /// The most recent invocation failed.
    Failed { error: ApiError },
}

impl<T> MutationState<T> {
    /// Returns the visible data: the settled value, or the retained prior
    /// while an invocation is in flight.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Idle => None,
            Self::Loading { prior_data } => prior_data.as_ref(),
            Self::Success { data } => Some(data),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the settled failure, if any.
    pub const fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Returns `true` while an invocation is outstanding.
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Returns `true` iff the most recent invocation completed without error
    /// and has not been superseded by a newer one.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Explicit state machine for one mutation instance.
///
/// Persists across repeated invocations by the same page, reflecting the
/// most recent one only.
#[derive(Debug)]
pub struct MutationMachine<T> {
    state: MutationState<T>,
    next_token: RequestToken,
    in_flight: Option<RequestToken>,
}

impl<T> MutationMachine<T> {
    /// Creates a machine in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: MutationState::Idle,
            next_token: 0,
            in_flight: None,
        }
    }

    /// Starts an invocation, returning its token.
    ///
    /// Transitions to `Loading`: the previous error and success flag are
    /// cleared before the new outcome is known, previous data is retained.
    /// Any outstanding invocation is superseded.
    pub fn begin(&mut self) -> RequestToken {
        let token = self.next_token;
        self.next_token += 1;

        let previous = std::mem::replace(&mut self.state, MutationState::Idle);
        let prior_data = match previous {
            MutationState::Loading { prior_data } => prior_data,
            MutationState::Success { data } => Some(data),
            MutationState::Idle | MutationState::Failed { .. } => None,
        };
        self.state = MutationState::Loading { prior_data };
        self.in_flight = Some(token);

        token
    }

    /// Applies an outcome if `token` belongs to the latest invocation;
    /// otherwise discards it and returns `false` (latest-wins).
    pub fn settle(&mut self, token: RequestToken, outcome: Result<T, ApiError>) -> bool {
        if self.in_flight != Some(token) {
            return false;
        }

        self.state = match outcome {
            Ok(data) => MutationState::Success { data },
            Err(error) => MutationState::Failed { error },
        };
        self.in_flight = None;
        true
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &MutationState<T> {
        &self.state
    }

    /// Visible data, retained prior included.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.state.data()
    }

    /// Settled failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        self.state.error()
    }

    /// Whether an invocation is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Whether the latest invocation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.state.is_success()
    }
}

impl<T> Default for MutationMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for mutation commands.
///
/// A mutation runs the given async operation once and delivers the outcome
/// as a message. It carries no state of its own; pair it with a
/// [`MutationMachine`] in page state.
pub struct Mutation<I, O> {
    _phantom: PhantomData<(I, O)>,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Executes a mutation and returns a `Command`.
    ///
    /// The returned command produces `Result<O, ApiError>`, which is mapped
    /// into the page's message type: typically tagged with the token from
    /// [`MutationMachine::begin`] so the settlement can be matched up.
    pub fn mutate<F>(input: I, mutator: F) -> Command<Result<O, ApiError>>
    where
        F: FnOnce(I) -> BoxFuture<'static, Result<O, ApiError>> + Send + 'static,
    {
        Command::future(async move { mutator(input).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(status: u16) -> ApiError {
        ApiError::from_response(status, r#"{"message":"rejected"}"#)
    }

    #[test]
    fn test_machine_starts_idle() {
        let machine = MutationMachine::<i32>::new();
        assert!(matches!(machine.state(), MutationState::Idle));
        assert!(!machine.is_loading());
        assert!(!machine.is_success());
        assert_eq!(machine.data(), None);
        assert!(machine.error().is_none());
    }

    #[test]
    fn test_begin_clears_error_and_success_before_outcome() {
        let mut machine = MutationMachine::<i32>::new();
        let token = machine.begin();
        machine.settle(token, Err(error(422)));
        assert!(machine.error().is_some());

        machine.begin();
        assert!(machine.is_loading());
        assert!(machine.error().is_none(), "new attempt starts clean");
        assert!(!machine.is_success());
    }

    #[test]
    fn test_begin_retains_prior_data() {
        let mut machine = MutationMachine::new();
        let token = machine.begin();
        machine.settle(token, Ok("created".to_string()));

        machine.begin();
        assert!(machine.is_loading());
        assert_eq!(machine.data().map(String::as_str), Some("created"));
    }

    #[test]
    fn test_exactly_one_of_data_and_error_after_settlement() {
        let mut machine = MutationMachine::new();

        let token = machine.begin();
        machine.settle(token, Ok(1));
        assert!(machine.data().is_some() && machine.error().is_none());
        assert!(machine.is_success());

        let token = machine.begin();
        machine.settle(token, Err(error(500)));
        assert!(machine.data().is_none() && machine.error().is_some());
        assert!(!machine.is_success());
    }

    #[test]
    fn test_overlapping_invocations_latest_wins() {
        let mut machine = MutationMachine::new();
        let first = machine.begin();
        let second = machine.begin();

        // The superseded invocation settles first and must be discarded.
        assert!(!machine.settle(first, Ok(1)));
        assert!(machine.is_loading());

        assert!(machine.settle(second, Ok(2)));
        assert_eq!(machine.data(), Some(&2));
    }

    #[test]
    fn test_straggler_after_settlement_is_discarded() {
        let mut machine = MutationMachine::new();
        let first = machine.begin();
        let second = machine.begin();
        machine.settle(second, Ok(2));

        assert!(!machine.settle(first, Err(error(500))));
        assert!(machine.is_success());
        assert_eq!(machine.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_mutate_delivers_outcome() {
        use crate::command::Action;
        use futures::StreamExt;

        let cmd = Mutation::mutate(21, |n| Box::pin(async move { Ok::<i32, ApiError>(n * 2) }));

        let mut stream = cmd.stream.expect("mutation should produce a stream");
        match stream.next().await {
            Some(Action::Message(Ok(value))) => assert_eq!(value, 42),
            _ => panic!("expected a successful outcome message"),
        }
        assert!(stream.next().await.is_none(), "mutation emits exactly once");
    }

    #[tokio::test]
    async fn test_mutate_delivers_failure() {
        use crate::command::Action;
        use futures::StreamExt;

        let cmd: Command<Result<i32, ApiError>> =
            Mutation::mutate((), |()| Box::pin(async move { Err(error(409)) }));

        let mut stream = cmd.stream.expect("mutation should produce a stream");
        match stream.next().await {
            Some(Action::Message(Err(e))) => assert_eq!(e.status, 409),
            _ => panic!("expected a failed outcome message"),
        }
    }
}
