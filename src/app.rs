//! The root application: routing between pages.
//!
//! [`App`] owns the active screen and the shared [`ApiClient`] handle; every
//! page borrows the client by `Arc` when it is routed in. Navigation is
//! message-driven: pages emit [`Message::Navigate`] and the root swaps the
//! screen, which also swaps the declared subscriptions: queries belonging to
//! the old page are cancelled before the new page's queries start.

use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Frame;
use ratatui::widgets::{Block, Borders, List, ListItem};

use crate::api::ApiClient;
use crate::application::Application;
use crate::command::{Action, Command};
use crate::pages::{buyers, orders, products, sellers};
use crate::subscription::{Subscription, terminal::TerminalEvents};

/// All navigable pages of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    BuyerList,
    BuyerDetail(u64),
    BuyerCreate,
    BuyerEdit(u64),
    SellerList,
    SellerDetail(u64),
    SellerCreate,
    SellerEdit(u64),
    ProductList,
    ProductsBySeller(u64),
    ProductDetail(u64),
    ProductCreate,
    ProductEdit(u64),
    OrderList,
    OrderDetail(u64),
    OrderCreate,
}

/// Top-level message type.
#[derive(Debug)]
pub enum Message {
    Terminal(Event),
    TerminalError(String),
    Navigate(Route),
    Quit,
    Buyers(buyers::Msg),
    Sellers(sellers::Msg),
    Products(products::Msg),
    Orders(orders::Msg),
}

/// Home screen: pick an entity to administer.
#[derive(Debug, Default)]
pub struct HomePage {
    selected: usize,
}

const MENU: [(&str, Route); 4] = [
    ("Buyers", Route::BuyerList),
    ("Sellers", Route::SellerList),
    ("Products", Route::ProductList),
    ("Orders", Route::OrderList),
];

impl HomePage {
    fn view(&self, frame: &mut Frame) {
        let items: Vec<ListItem> = MENU
            .iter()
            .enumerate()
            .map(|(i, (label, _))| {
                let marker = if i == self.selected { ">" } else { " " };
                ListItem::new(format!("{marker} {label}"))
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Souk (↑/↓: navigate, Enter: open, q: quit)"),
        );
        frame.render_widget(list, frame.area());
    }
}

enum Screen {
    Home(HomePage),
    Buyers(buyers::Page),
    Sellers(sellers::Page),
    Products(products::Page),
    Orders(orders::Page),
}

/// The admin console application.
pub struct App {
    client: Arc<ApiClient>,
    screen: Screen,
}

impl App {
    fn screen_for(&self, route: Route) -> Screen {
        let client = self.client.clone();
        match route {
            Route::Home => Screen::Home(HomePage::default()),
            Route::BuyerList => Screen::Buyers(buyers::Page::list(client)),
            Route::BuyerDetail(id) => Screen::Buyers(buyers::Page::detail(client, id)),
            Route::BuyerCreate => Screen::Buyers(buyers::Page::create(client)),
            Route::BuyerEdit(id) => Screen::Buyers(buyers::Page::edit(client, id)),
            Route::SellerList => Screen::Sellers(sellers::Page::list(client)),
            Route::SellerDetail(id) => Screen::Sellers(sellers::Page::detail(client, id)),
            Route::SellerCreate => Screen::Sellers(sellers::Page::create(client)),
            Route::SellerEdit(id) => Screen::Sellers(sellers::Page::edit(client, id)),
            Route::ProductList => Screen::Products(products::Page::list(client)),
            Route::ProductsBySeller(seller_id) => {
                Screen::Products(products::Page::list_by_seller(client, seller_id))
            }
            Route::ProductDetail(id) => Screen::Products(products::Page::detail(client, id)),
            Route::ProductCreate => Screen::Products(products::Page::create(client)),
            Route::ProductEdit(id) => Screen::Products(products::Page::edit(client, id)),
            Route::OrderList => Screen::Orders(orders::Page::list(client)),
            Route::OrderDetail(id) => Screen::Orders(orders::Page::detail(client, id)),
            Route::OrderCreate => Screen::Orders(orders::Page::create(client)),
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Command<Message> {
        match &mut self.screen {
            Screen::Home(home) => match key.code {
                KeyCode::Up => {
                    home.selected = home.selected.saturating_sub(1);
                    Command::none()
                }
                KeyCode::Down => {
                    home.selected = (home.selected + 1).min(MENU.len() - 1);
                    Command::none()
                }
                KeyCode::Enter => Command::single(Message::Navigate(MENU[home.selected].1)),
                KeyCode::Char('q') | KeyCode::Esc => Command::single(Message::Quit),
                _ => Command::none(),
            },
            Screen::Buyers(page) => page.on_key(key),
            Screen::Sellers(page) => page.on_key(key),
            Screen::Products(page) => page.on_key(key),
            Screen::Orders(page) => page.on_key(key),
        }
    }
}

impl Application for App {
    type Message = Message;
    type Flags = Arc<ApiClient>;

    fn new(client: Arc<ApiClient>) -> (Self, Command<Message>) {
        let app = Self {
            client,
            screen: Screen::Home(HomePage::default()),
        };
        (app, Command::none())
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Terminal(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.on_key(key)
            }
            Message::Terminal(_) => Command::none(),
            Message::TerminalError(e) => {
                tracing::error!(error = %e, "terminal subscription failed");
                Command::effect(Action::Quit)
            }
            Message::Navigate(route) => {
                self.screen = self.screen_for(route);
                Command::none()
            }
            Message::Quit => Command::effect(Action::Quit),
            // Page messages are dropped when their page is no longer routed:
            // a settlement for a torn-down page has nothing left to update.
            Message::Buyers(msg) => match &mut self.screen {
                Screen::Buyers(page) => page.update(msg),
                _ => Command::none(),
            },
            Message::Sellers(msg) => match &mut self.screen {
                Screen::Sellers(page) => page.update(msg),
                _ => Command::none(),
            },
            Message::Products(msg) => match &mut self.screen {
                Screen::Products(page) => page.update(msg),
                _ => Command::none(),
            },
            Message::Orders(msg) => match &mut self.screen {
                Screen::Orders(page) => page.update(msg),
                _ => Command::none(),
            },
        }
    }

    fn view(&self, frame: &mut Frame<'_>) {
        match &self.screen {
            Screen::Home(home) => home.view(frame),
            Screen::Buyers(page) => page.view(frame),
            Screen::Sellers(page) => page.view(frame),
            Screen::Products(page) => page.view(frame),
            Screen::Orders(page) => page.view(frame),
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let mut subs = vec![
            Subscription::new(TerminalEvents::new()).map(|result| match result {
                Ok(event) => Message::Terminal(event),
                Err(e) => Message::TerminalError(e.to_string()),
            }),
        ];

        match &self.screen {
            Screen::Home(_) => {}
            Screen::Buyers(page) => subs.extend(page.subscriptions()),
            Screen::Sellers(page) => subs.extend(page.subscriptions()),
            Screen::Products(page) => subs.extend(page.subscriptions()),
            Screen::Orders(page) => subs.extend(page.subscriptions()),
        }

        subs
    }
}
