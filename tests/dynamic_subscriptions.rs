// Integration tests for dynamic subscriptions

use ratatui::{Frame, Terminal, backend::TestBackend};
use souk::{
    application::Application,
    command::{Action, Command},
    runtime::Runtime,
    subscription::{Subscription, mock::MockSource},
};
use tokio::time::{Duration, timeout};

fn emit_forever(mock: &MockSource<()>) {
    let emitter = mock.clone();
    tokio::spawn(async move {
        loop {
            let _ = emitter.emit(());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
}

#[tokio::test]
async fn test_dynamic_subscription_starts_when_enabled() {
    struct AppWithSource {
        mock: MockSource<()>,
        tick_count: u32,
    }

    impl Application for AppWithSource {
        type Message = ();
        type Flags = MockSource<()>;

        fn new(mock: MockSource<()>) -> (Self, Command<()>) {
            (AppWithSource { mock, tick_count: 0 }, Command::none())
        }

        fn update(&mut self, (): ()) -> Command<()> {
            self.tick_count += 1;
            if self.tick_count >= 2 {
                Command::effect(Action::Quit)
            } else {
                Command::none()
            }
        }

        fn view(&self, _frame: &mut Frame<'_>) {}

        fn subscriptions(&self) -> Vec<Subscription<()>> {
            vec![Subscription::new(self.mock.clone())]
        }
    }

    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();

    let mock = MockSource::new();
    emit_forever(&mock);

    let runtime = Runtime::<AppWithSource>::new(mock);
    let result = timeout(Duration::from_secs(1), runtime.run(&mut terminal, 60)).await;

    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_dynamic_subscription_stops_when_disabled() {
    struct AppWithToggle {
        mock: MockSource<()>,
        enabled: bool,
        tick_count: u32,
        ticks_at_disable: u32,
    }

    #[derive(Clone)]
    enum Msg {
        Tick,
        Disable,
        Check,
    }

    impl Application for AppWithToggle {
        type Message = Msg;
        type Flags = MockSource<()>;

        fn new(mock: MockSource<()>) -> (Self, Command<Msg>) {
            let cmd = Command::future(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Msg::Disable
            });
            (
                AppWithToggle {
                    mock,
                    enabled: true,
                    tick_count: 0,
                    ticks_at_disable: 0,
                },
                cmd,
            )
        }

        fn update(&mut self, msg: Msg) -> Command<Msg> {
            match msg {
                Msg::Tick => {
                    self.tick_count += 1;
                    Command::none()
                }
                Msg::Disable => {
                    self.enabled = false;
                    self.ticks_at_disable = self.tick_count;
                    // Wait, then verify no more ticks arrived
                    Command::future(async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Msg::Check
                    })
                }
                Msg::Check => {
                    // At most one tick can already be queued when the
                    // subscription is cancelled; beyond that is a leak.
                    assert!(
                        self.tick_count <= self.ticks_at_disable + 1,
                        "ticks kept arriving after unsubscribe: {} -> {}",
                        self.ticks_at_disable,
                        self.tick_count,
                    );
                    Command::effect(Action::Quit)
                }
            }
        }

        fn view(&self, _frame: &mut Frame<'_>) {}

        fn subscriptions(&self) -> Vec<Subscription<Msg>> {
            if self.enabled {
                vec![Subscription::new(self.mock.clone()).map(|()| Msg::Tick)]
            } else {
                vec![]
            }
        }
    }

    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();

    let mock = MockSource::new();
    emit_forever(&mock);

    let runtime = Runtime::<AppWithToggle>::new(mock);
    let result = timeout(Duration::from_secs(2), runtime.run(&mut terminal, 60)).await;

    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_dynamic_subscription_changes_based_on_state() {
    struct StatefulApp {
        fast: MockSource<()>,
        slow: MockSource<()>,
        mode: u32,
        fast_ticks: u32,
        slow_ticks: u32,
    }

    #[derive(Clone)]
    enum Msg {
        FastTick,
        SlowTick,
        ChangeMode,
    }

    impl Application for StatefulApp {
        type Message = Msg;
        type Flags = (MockSource<()>, MockSource<()>);

        fn new((fast, slow): (MockSource<()>, MockSource<()>)) -> (Self, Command<Msg>) {
            let cmd = Command::future(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Msg::ChangeMode
            });
            (
                StatefulApp {
                    fast,
                    slow,
                    mode: 0,
                    fast_ticks: 0,
                    slow_ticks: 0,
                },
                cmd,
            )
        }

        fn update(&mut self, msg: Msg) -> Command<Msg> {
            match msg {
                Msg::FastTick => {
                    self.fast_ticks += 1;
                    Command::none()
                }
                Msg::SlowTick => {
                    self.slow_ticks += 1;
                    Command::none()
                }
                Msg::ChangeMode => {
                    self.mode += 1;
                    if self.mode >= 2 {
                        assert!(self.fast_ticks > 0, "fast source never delivered");
                        assert!(self.slow_ticks > 0, "slow source never delivered");
                        Command::effect(Action::Quit)
                    } else {
                        Command::future(async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Msg::ChangeMode
                        })
                    }
                }
            }
        }

        fn view(&self, _frame: &mut Frame<'_>) {}

        fn subscriptions(&self) -> Vec<Subscription<Msg>> {
            match self.mode {
                0 => vec![Subscription::new(self.fast.clone()).map(|()| Msg::FastTick)],
                1 => vec![Subscription::new(self.slow.clone()).map(|()| Msg::SlowTick)],
                _ => vec![],
            }
        }
    }

    let backend = TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend).unwrap();

    let fast = MockSource::new();
    let slow = MockSource::new();
    emit_forever(&fast);
    emit_forever(&slow);

    let runtime = Runtime::<StatefulApp>::new((fast, slow));
    let result = timeout(Duration::from_secs(2), runtime.run(&mut terminal, 60)).await;

    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());
}
