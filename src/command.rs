use futures::{
    FutureExt, Stream, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// An action that can be performed by a command.
///
/// Actions represent side effects that can be executed as a result of processing commands.
/// They are emitted by command streams and processed by the runtime.
pub enum Action<Msg> {
    /// Send a message to the application's update function.
    ///
    /// This is the most common action, used to communicate results of
    /// asynchronous operations back to the application.
    Message(Msg),

    /// Request the application to quit.
    ///
    /// When this action is emitted, the runtime will terminate the event loop
    /// and shut down the application gracefully.
    Quit,
}

/// A command that can be executed to perform side effects.
///
/// Commands represent asynchronous operations that produce messages or actions.
/// They are the primary way to perform side effects in the Elm architecture,
/// such as:
/// - Calling the marketplace API (creating a buyer, cancelling an order, ...)
/// - Re-dispatching a message produced by a keyboard handler
/// - Performing computations in the background
///
/// Commands are returned from `Application::new` and `Application::update`,
/// and are executed by the runtime.
///
/// # Examples
///
/// ```
/// use souk::command::Command;
///
/// enum Message {
///     GotCount(usize),
/// }
///
/// // Create a command that performs an async operation
/// let cmd = Command::perform(
///     async { 42 },
///     |count| Message::GotCount(count)
/// );
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(super) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a command that does nothing.
    ///
    /// This is useful when you need to return a command but have no side effects to perform.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// let cmd: Command<i32> = Command::none();
    /// ```
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Send a single message immediately.
    ///
    /// This is useful for re-dispatching: a keyboard handler can translate a
    /// key press into a higher-level message without duplicating update logic.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// enum Message {
    ///     OpenBuyer(u64),
    /// }
    ///
    /// let cmd = Command::single(Message::OpenBuyer(7));
    /// ```
    pub fn single(msg: Msg) -> Self {
        Self::effect(Action::Message(msg))
    }

    /// Perform an asynchronous operation and convert its result to a message.
    ///
    /// This is one of the most common ways to create commands. It runs a future
    /// and applies a function to convert the result into a message.
    ///
    /// # Arguments
    ///
    /// * `future` - The async operation to perform
    /// * `f` - Function to convert the result into a message
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// async fn count_orders() -> usize {
    ///     3
    /// }
    ///
    /// enum Message {
    ///     OrderCount(usize),
    /// }
    ///
    /// let cmd = Command::perform(count_orders(), Message::OrderCount);
    /// ```
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Create a command from a future that produces a message.
    ///
    /// Unlike `perform`, this method expects the future to directly produce a message
    /// without any conversion function.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// let cmd = Command::future(async { 42 });
    /// ```
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Create a command that performs a single action immediately.
    ///
    /// This is useful for operations that need to happen synchronously,
    /// such as quitting the application.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::{Action, Command};
    ///
    /// // Quit the application
    /// let cmd: Command<i32> = Command::effect(Action::Quit);
    ///
    /// // Send a message immediately
    /// let cmd = Command::effect(Action::Message(42));
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Batch multiple commands into a single command.
    ///
    /// All commands will be executed concurrently. The order in which
    /// messages arrive is not guaranteed. Commands that are `Command::none()`
    /// are automatically filtered out.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// enum Message {
    ///     First(i32),
    ///     Second(String),
    /// }
    ///
    /// let cmd = Command::batch(vec![
    ///     Command::perform(async { 1 }, Message::First),
    ///     Command::perform(async { "data".to_string() }, Message::Second),
    ///     Command::none(), // This will be filtered out
    /// ]);
    /// ```
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Create a command from a stream of messages.
    ///
    /// The stream will be consumed and each item will be sent as a message
    /// to the application's update function.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    /// use futures::stream;
    ///
    /// let messages = stream::iter(vec![1, 2, 3]);
    /// let cmd = Command::stream(messages);
    /// ```
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.map(Action::Message).boxed()),
        }
    }

    /// Converts the messages this command produces into another message type.
    ///
    /// Non-message actions (like quit) pass through unchanged. This is how a
    /// generic command, like a mutation outcome, is lifted into the
    /// application's message type.
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    ///
    /// enum Message {
    ///     Answer(i32),
    /// }
    ///
    /// let cmd: Command<Message> = Command::future(async { 42 }).map(Message::Answer);
    /// ```
    pub fn map<B, F>(self, f: F) -> Command<B>
    where
        B: Send + 'static,
        F: Fn(Msg) -> B + Send + 'static,
    {
        match self.stream {
            None => Command::none(),
            Some(stream) => Command {
                stream: Some(
                    stream
                        .map(move |action| match action {
                            Action::Message(msg) => Action::Message(f(msg)),
                            Action::Quit => Action::Quit,
                        })
                        .boxed(),
                ),
            },
        }
    }

    /// Run a stream and convert each item to a message.
    ///
    /// This is useful for subscribing to external event sources where you need
    /// to transform the stream's items into your application's message type.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream to consume
    /// * `f` - Function to convert each stream item into a message
    ///
    /// # Examples
    ///
    /// ```
    /// use souk::command::Command;
    /// use futures::stream;
    ///
    /// enum Message {
    ///     NumberReceived(i32),
    /// }
    ///
    /// let numbers = stream::iter(vec![1, 2, 3]);
    /// let cmd = Command::run(numbers, |n| Message::NumberReceived(n * 2));
    /// ```
    pub fn run<A>(
        stream: impl Stream<Item = A> + Send + 'static,
        f: impl Fn(A) -> Msg + Send + 'static,
    ) -> Self
    where
        Msg: 'static,
    {
        Self::stream(stream.map(f))
    }
}
