use ratatui::Frame;

use crate::{command::Command, subscription::Subscription};

/// The main trait that defines a TUI application following the Elm Architecture.
///
/// State changes only happen in [`update`](Self::update), rendering only reads
/// state in [`view`](Self::view), and the outside world only gets in through
/// [`subscriptions`](Self::subscriptions) and out through [`Command`]s.
///
/// # Type Parameters
///
/// * `Message` - The type of messages that your application handles. Must be `Send + 'static`.
/// * `Flags` - Configuration data passed at initialization. Must be `Clone + Send`.
///
/// # Example
///
/// ```
/// use ratatui::Frame;
/// use souk::{application::Application, command::Command, subscription::Subscription};
///
/// #[derive(Debug, Clone)]
/// enum Message {
///     NextPage,
///     PrevPage,
/// }
///
/// struct Pager {
///     page: usize,
/// }
///
/// impl Application for Pager {
///     type Message = Message;
///     type Flags = usize; // initial page
///
///     fn new(initial: usize) -> (Self, Command<Message>) {
///         (Pager { page: initial }, Command::none())
///     }
///
///     fn update(&mut self, msg: Message) -> Command<Message> {
///         match msg {
///             Message::NextPage => self.page += 1,
///             Message::PrevPage => self.page = self.page.saturating_sub(1),
///         }
///         Command::none()
///     }
///
///     fn view(&self, frame: &mut Frame<'_>) {
///         // Render UI here
///     }
///
///     fn subscriptions(&self) -> Vec<Subscription<Message>> {
///         vec![]
///     }
/// }
/// ```
pub trait Application: Sized {
    /// The type of messages your application processes.
    ///
    /// Messages represent all possible events that can occur in your application.
    /// They are produced by user interactions, subscriptions, or commands.
    type Message: Send + 'static;

    /// Configuration data for initializing your application.
    ///
    /// For the admin console this is the shared API client handle; use `()`
    /// if no configuration is needed.
    type Flags: Clone + Send;

    /// Initialize the application with the given flags.
    ///
    /// Called once when the application starts. Returns the initial state
    /// and a command to run at startup (use `Command::none()` if not needed).
    fn new(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Process a message and update the application state.
    ///
    /// This is the heart of the Elm Architecture. All state changes happen
    /// here in response to messages. The returned command is how follow-up
    /// side effects (an API call, a navigation, a quit) are requested.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Render the application's user interface.
    ///
    /// Called every frame. Should be pure: read from `self`, render into the
    /// frame, change nothing.
    fn view(&self, frame: &mut Frame<'_>);

    /// Declare the event sources the application currently wants.
    ///
    /// Called after every update. The runtime diffs the returned set against
    /// the running one, so subscriptions appear and disappear with the state
    /// that declares them: a detail page's query lives exactly as long as
    /// the page is routed.
    fn subscriptions(&self) -> Vec<Subscription<Self::Message>>;
}
