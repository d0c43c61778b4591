use std::time::Duration;

use color_eyre::eyre::Result;
use futures::stream::StreamExt;
use ratatui::prelude::Backend;
use tokio::{sync::mpsc, time::sleep};

use crate::{
    application::Application,
    command::{Action, Command},
    subscription::SubscriptionManager,
};

/// Manages the application lifecycle and event loop.
///
/// The loop is frame-driven: draw the view, drain the message queue (running
/// `update` and spawning the resulting commands), reconcile subscriptions,
/// sleep until the next frame. It exits when a command emits
/// [`Action::Quit`], after cancelling all subscriptions.
pub struct Runtime<A: Application> {
    app: A,
    init: Option<Command<A::Message>>,
    tx: mpsc::UnboundedSender<Action<A::Message>>,
    rx: mpsc::UnboundedReceiver<Action<A::Message>>,
    subscriptions: SubscriptionManager<A::Message>,
}

impl<A: Application> Runtime<A> {
    /// Initializes the application with the given flags.
    pub fn new(flags: A::Flags) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (app, init) = A::new(flags);
        let subscriptions = SubscriptionManager::new(tx.clone());

        Self {
            app,
            init: Some(init),
            tx,
            rx,
            subscriptions,
        }
    }

    fn spawn_command(&self, command: Command<A::Message>) {
        if let Some(mut stream) = command.stream {
            let tx = self.tx.clone();
            tokio::spawn(async move {
                while let Some(action) = stream.next().await {
                    if tx.send(action).is_err() {
                        break;
                    }
                }
            });
        }
    }

    /// Drains queued actions. Returns `true` when the application asked to
    /// quit.
    fn process_messages(&mut self) -> bool {
        while let Ok(action) = self.rx.try_recv() {
            match action {
                Action::Message(msg) => {
                    let cmd = self.app.update(msg);
                    self.spawn_command(cmd);

                    // Restart subscriptions if the update changed them
                    self.subscriptions.update(self.app.subscriptions());
                }
                Action::Quit => return true,
            }
        }

        false
    }

    /// Runs the event loop until the application quits.
    ///
    /// # Errors
    ///
    /// Fails if the terminal cannot be drawn to.
    pub async fn run<B: Backend>(
        mut self,
        terminal: &mut ratatui::Terminal<B>,
        frame_rate: u32,
    ) -> Result<()> {
        let frame_duration = Duration::from_millis(1000 / u64::from(frame_rate.max(1)));

        tracing::debug!(frame_rate, "runtime starting");
        if let Some(init) = self.init.take() {
            self.spawn_command(init);
        }
        self.subscriptions.update(self.app.subscriptions());

        loop {
            terminal.draw(|frame| {
                self.app.view(frame);
            })?;

            if self.process_messages() {
                break;
            }

            sleep(frame_duration).await;
        }

        tracing::debug!("runtime quitting");
        self.subscriptions.shutdown().await;

        Ok(())
    }
}
