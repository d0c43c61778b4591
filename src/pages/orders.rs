//! Order pages: list, detail with fulfilment actions, and the create form.
//!
//! Creating an order composes a draft client-side: pick a buyer, confirm the
//! shipping address, add product lines. The draft is validated before any
//! request goes out: an unselected buyer, a blank address, an empty item
//! list or a quantity above the available stock never reaches the backend.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::api::{ApiClient, ApiError, Buyer, NewOrder, NewOrderItem, Order, Product};
use crate::app::{Message, Route};
use crate::command::Command;
use crate::pages::{self, format_price};
use crate::subscription::Subscription;
use crate::subscription::http::{
    Mutation, MutationMachine, Query, QueryEvent, QueryMachine, RequestToken,
};

/// Messages handled by the order pages.
#[derive(Debug)]
pub enum Msg {
    // List
    ListFetched(QueryEvent<Vec<Order>>),
    SelectUp,
    SelectDown,
    OpenSelected,
    PromptBuyerFilter,
    PromptNumberLookup,
    PromptInput(char),
    PromptBackspace,
    PromptApply,
    PromptCancel,
    ClearFilter,
    ClearLookup,
    LookupFetched(QueryEvent<Order>),
    // Detail
    Fetched(QueryEvent<Order>),
    AdvanceStatus,
    StatusUpdated(RequestToken, Result<Order, ApiError>),
    TrackingStart,
    TrackingInput(char),
    TrackingBackspace,
    TrackingSubmit,
    TrackingCancel,
    TrackingUpdated(RequestToken, Result<Order, ApiError>),
    CancelOrder,
    OrderCancelled(RequestToken, Result<(), ApiError>),
    // Create form
    BuyersFetched(QueryEvent<Vec<Buyer>>),
    ProductsFetched(QueryEvent<Vec<Product>>),
    NextSection,
    BuyerPrev,
    BuyerNext,
    ProductPrev,
    ProductNext,
    AddressInput(char),
    AddressBackspace,
    QtyInput(char),
    QtyBackspace,
    AddItem,
    ItemUp,
    ItemDown,
    RemoveItem,
    Submit,
    Saved(RequestToken, Result<Order, ApiError>),
}

/// The order screen currently routed in.
pub enum Page {
    List(ListPage),
    Detail(DetailPage),
    Form(FormPage),
}

impl Page {
    pub fn list(client: Arc<ApiClient>) -> Self {
        Self::List(ListPage::new(client))
    }

    pub fn detail(client: Arc<ApiClient>, id: u64) -> Self {
        Self::Detail(DetailPage::new(client, id))
    }

    pub fn create(client: Arc<ApiClient>) -> Self {
        Self::Form(FormPage::new(client))
    }

    pub fn update(&mut self, msg: Msg) -> Command<Message> {
        match self {
            Self::List(page) => page.update(msg),
            Self::Detail(page) => page.update(msg),
            Self::Form(page) => page.update(msg),
        }
    }

    pub fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match self {
            Self::List(page) => page.on_key(key),
            Self::Detail(page) => page.on_key(key),
            Self::Form(page) => page.on_key(key),
        }
    }

    pub fn view(&self, frame: &mut Frame) {
        match self {
            Self::List(page) => page.view(frame),
            Self::Detail(page) => page.view(frame),
            Self::Form(page) => page.view(frame),
        }
    }

    pub fn subscriptions(&self) -> Vec<Subscription<Message>> {
        match self {
            Self::List(page) => page.subscriptions(),
            Self::Detail(page) => page.subscriptions(),
            Self::Form(page) => page.subscriptions(),
        }
    }
}

/// Open prompt on the list page, if any.
#[derive(Debug)]
enum Prompt {
    BuyerFilter(String),
    NumberLookup(String),
}

/// All orders, optionally narrowed to one buyer, with lookup by number.
pub struct ListPage {
    client: Arc<ApiClient>,
    orders: QueryMachine<Vec<Order>>,
    selected: usize,
    refresh: u32,
    buyer_filter: Option<u64>,
    prompt: Option<Prompt>,
    /// Applied order-number lookup; navigates to the order when it resolves.
    lookup: Option<String>,
    lookup_result: QueryMachine<Order>,
}

impl ListPage {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            orders: QueryMachine::new(),
            selected: 0,
            refresh: 0,
            buyer_filter: None,
            prompt: None,
            lookup: None,
            lookup_result: QueryMachine::new(),
        }
    }

    fn selected_order(&self) -> Option<&Order> {
        self.orders.data().and_then(|orders| orders.get(self.selected))
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::ListFetched(event) => {
                self.orders.on_event(event);
                let len = self.orders.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::SelectUp => {
                self.selected = self.selected.saturating_sub(1);
                Command::none()
            }
            Msg::SelectDown => {
                let len = self.orders.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::OpenSelected => match self.selected_order() {
                Some(order) => Command::single(Message::Navigate(Route::OrderDetail(order.id))),
                None => Command::none(),
            },
            Msg::PromptBuyerFilter => {
                self.prompt = Some(Prompt::BuyerFilter(String::new()));
                Command::none()
            }
            Msg::PromptNumberLookup => {
                self.prompt = Some(Prompt::NumberLookup(String::new()));
                Command::none()
            }
            Msg::PromptInput(c) => {
                match &mut self.prompt {
                    Some(Prompt::BuyerFilter(entry)) if c.is_ascii_digit() => entry.push(c),
                    Some(Prompt::NumberLookup(entry)) => entry.push(c),
                    _ => {}
                }
                Command::none()
            }
            Msg::PromptBackspace => {
                match &mut self.prompt {
                    Some(Prompt::BuyerFilter(entry) | Prompt::NumberLookup(entry)) => {
                        entry.pop();
                    }
                    None => {}
                }
                Command::none()
            }
            Msg::PromptApply => {
                match self.prompt.take() {
                    Some(Prompt::BuyerFilter(entry)) => {
                        self.buyer_filter = entry.trim().parse().ok();
                        self.selected = 0;
                    }
                    Some(Prompt::NumberLookup(entry)) => {
                        let entry = entry.trim().to_string();
                        if !entry.is_empty() {
                            self.lookup_result = QueryMachine::new();
                            self.lookup = Some(entry);
                        }
                    }
                    None => {}
                }
                Command::none()
            }
            Msg::PromptCancel => {
                self.prompt = None;
                Command::none()
            }
            Msg::ClearFilter => {
                self.buyer_filter = None;
                self.selected = 0;
                Command::none()
            }
            Msg::ClearLookup => {
                self.lookup = None;
                Command::none()
            }
            Msg::LookupFetched(event) => {
                self.lookup_result.on_event(event);
                if let Some(order) = self.lookup_result.data() {
                    let id = order.id;
                    self.lookup = None;
                    return Command::single(Message::Navigate(Route::OrderDetail(id)));
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        if self.prompt.is_some() {
            return match key.code {
                KeyCode::Enter => Command::single(Message::Orders(Msg::PromptApply)),
                KeyCode::Esc => Command::single(Message::Orders(Msg::PromptCancel)),
                KeyCode::Backspace => Command::single(Message::Orders(Msg::PromptBackspace)),
                KeyCode::Char(c) => Command::single(Message::Orders(Msg::PromptInput(c))),
                _ => Command::none(),
            };
        }

        match key.code {
            KeyCode::Up => Command::single(Message::Orders(Msg::SelectUp)),
            KeyCode::Down => Command::single(Message::Orders(Msg::SelectDown)),
            KeyCode::Enter => Command::single(Message::Orders(Msg::OpenSelected)),
            KeyCode::Char('c') => Command::single(Message::Navigate(Route::OrderCreate)),
            KeyCode::Char('/') => Command::single(Message::Orders(Msg::PromptBuyerFilter)),
            KeyCode::Char('n') => Command::single(Message::Orders(Msg::PromptNumberLookup)),
            KeyCode::Char('x') => Command::single(Message::Orders(Msg::ClearFilter)),
            KeyCode::Esc if self.lookup.is_some() => {
                Command::single(Message::Orders(Msg::ClearLookup))
            }
            KeyCode::Esc => Command::single(Message::Navigate(Route::Home)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        let title = match self.buyer_filter {
            Some(buyer_id) => format!("Orders [buyer #{buyer_id}]"),
            None => "Orders".to_string(),
        };
        pages::render_title(frame, chrome.title, &title);

        if let Some(orders) = self.orders.data() {
            if orders.is_empty() {
                let text = match self.buyer_filter {
                    Some(buyer_id) => {
                        format!("No orders for buyer #{buyer_id}. Press 'x' to clear the filter.")
                    }
                    None => "No orders yet. Press 'c' to create one.".to_string(),
                };
                let empty = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, chrome.content);
            } else {
                let items: Vec<ListItem> = orders
                    .iter()
                    .enumerate()
                    .map(|(i, order)| {
                        let marker = if i == self.selected { ">" } else { " " };
                        ListItem::new(format!(
                            "{marker} {:<5} {:<16} {:<24} {:>10} {:<10} {}",
                            order.id,
                            order.order_number,
                            order.buyer.full_name(),
                            format_price(order.total_amount),
                            order.status.as_str(),
                            pages::format_date(&order.placed_at),
                        ))
                    })
                    .collect();
                let title = if self.orders.is_loading() {
                    "Orders (refreshing...)"
                } else {
                    "Orders"
                };
                let list =
                    List::new(items).block(Block::default().borders(Borders::ALL).title(title));
                frame.render_widget(list, chrome.content);
            }
        } else if let Some(error) = self.orders.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "orders");
        }

        match &self.prompt {
            Some(Prompt::BuyerFilter(entry)) => {
                pages::render_footer(frame, chrome.footer, &format!("Buyer id filter: {entry}_"));
            }
            Some(Prompt::NumberLookup(entry)) => {
                pages::render_footer(frame, chrome.footer, &format!("Order number: {entry}_"));
            }
            None => {
                if self.lookup.is_some() && self.lookup_result.is_loading() {
                    pages::render_footer(frame, chrome.footer, "Looking up order...");
                } else if let Some(error) = self.lookup.as_ref().and(self.lookup_result.error()) {
                    pages::render_error_footer(frame, chrome.footer, &error.message);
                } else {
                    pages::render_footer(
                        frame,
                        chrome.footer,
                        "↑/↓: select, Enter: view, c: create, /: buyer filter, n: find by number, Esc: back",
                    );
                }
            }
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let list_sub = match self.buyer_filter {
            Some(buyer_id) => Subscription::new(Query::new(
                "orders-by-buyer",
                &(buyer_id, self.refresh),
                move || {
                    let client = client.clone();
                    Box::pin(async move { client.orders_by_buyer(buyer_id).await })
                },
            )),
            None => Subscription::new(Query::new("orders", &self.refresh, move || {
                let client = client.clone();
                Box::pin(async move { client.orders().await })
            })),
        };

        let mut subs = vec![list_sub.map(|event| Message::Orders(Msg::ListFetched(event)))];

        if let Some(number) = &self.lookup {
            let client = self.client.clone();
            let number = number.clone();
            let key = number.clone();
            subs.push(
                Subscription::new(Query::new("order-by-number", &key, move || {
                    let client = client.clone();
                    let number = number.clone();
                    Box::pin(async move { client.order_by_number(&number).await })
                }))
                .map(|event| Message::Orders(Msg::LookupFetched(event))),
            );
        }

        subs
    }
}

/// One order, with fulfilment actions.
pub struct DetailPage {
    client: Arc<ApiClient>,
    id: u64,
    order: QueryMachine<Order>,
    refresh: u32,
    status: MutationMachine<Order>,
    tracking: MutationMachine<Order>,
    cancel: MutationMachine<()>,
    tracking_entry: Option<String>,
    notice: Option<String>,
}

impl DetailPage {
    pub fn new(client: Arc<ApiClient>, id: u64) -> Self {
        Self {
            client,
            id,
            order: QueryMachine::new(),
            refresh: 0,
            status: MutationMachine::new(),
            tracking: MutationMachine::new(),
            cancel: MutationMachine::new(),
            tracking_entry: None,
            notice: None,
        }
    }

    fn mutation_error(&self) -> Option<&ApiError> {
        self.status
            .error()
            .or_else(|| self.tracking.error())
            .or_else(|| self.cancel.error())
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::Fetched(event) => {
                self.order.on_event(event);
                Command::none()
            }
            Msg::AdvanceStatus => {
                if self.status.is_loading() {
                    return Command::none();
                }
                let Some(order) = self.order.data() else {
                    return Command::none();
                };
                let Some(next) = order.status.next() else {
                    self.notice = Some(format!("No further status after {}", order.status));
                    return Command::none();
                };
                self.notice = None;
                let id = self.id;
                let client = self.client.clone();
                let token = self.status.begin();
                Mutation::mutate(next, move |next| {
                    Box::pin(async move { client.update_order_status(id, next).await })
                })
                .map(move |outcome| Message::Orders(Msg::StatusUpdated(token, outcome)))
            }
            Msg::StatusUpdated(token, outcome) => {
                if self.status.settle(token, outcome) && self.status.is_success() {
                    self.refresh += 1;
                }
                Command::none()
            }
            Msg::TrackingStart => {
                let current = self
                    .order
                    .data()
                    .and_then(|order| order.tracking_number.clone())
                    .unwrap_or_default();
                self.tracking_entry = Some(current);
                Command::none()
            }
            Msg::TrackingInput(c) => {
                if let Some(entry) = &mut self.tracking_entry {
                    entry.push(c);
                }
                Command::none()
            }
            Msg::TrackingBackspace => {
                if let Some(entry) = &mut self.tracking_entry {
                    entry.pop();
                }
                Command::none()
            }
            Msg::TrackingCancel => {
                self.tracking_entry = None;
                Command::none()
            }
            Msg::TrackingSubmit => {
                if self.tracking.is_loading() {
                    return Command::none();
                }
                let Some(entry) = self.tracking_entry.take() else {
                    return Command::none();
                };
                let number = entry.trim().to_string();
                if number.is_empty() {
                    self.notice = Some("Tracking number cannot be empty".to_string());
                    return Command::none();
                }
                self.notice = None;
                let id = self.id;
                let client = self.client.clone();
                let token = self.tracking.begin();
                Mutation::mutate(number, move |number| {
                    Box::pin(async move { client.update_tracking(id, &number).await })
                })
                .map(move |outcome| Message::Orders(Msg::TrackingUpdated(token, outcome)))
            }
            Msg::TrackingUpdated(token, outcome) => {
                if self.tracking.settle(token, outcome) && self.tracking.is_success() {
                    self.refresh += 1;
                }
                Command::none()
            }
            Msg::CancelOrder => {
                if self.cancel.is_loading() {
                    return Command::none();
                }
                let id = self.id;
                let client = self.client.clone();
                let token = self.cancel.begin();
                Mutation::mutate(id, move |id| {
                    Box::pin(async move { client.cancel_order(id).await })
                })
                .map(move |outcome| Message::Orders(Msg::OrderCancelled(token, outcome)))
            }
            Msg::OrderCancelled(token, outcome) => {
                if self.cancel.settle(token, outcome) && self.cancel.is_success() {
                    self.refresh += 1;
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        if self.tracking_entry.is_some() {
            return match key.code {
                KeyCode::Enter => Command::single(Message::Orders(Msg::TrackingSubmit)),
                KeyCode::Esc => Command::single(Message::Orders(Msg::TrackingCancel)),
                KeyCode::Backspace => Command::single(Message::Orders(Msg::TrackingBackspace)),
                KeyCode::Char(c) => Command::single(Message::Orders(Msg::TrackingInput(c))),
                _ => Command::none(),
            };
        }

        match key.code {
            KeyCode::Char('s') => Command::single(Message::Orders(Msg::AdvanceStatus)),
            KeyCode::Char('t') => Command::single(Message::Orders(Msg::TrackingStart)),
            KeyCode::Char('x') => Command::single(Message::Orders(Msg::CancelOrder)),
            KeyCode::Esc => Command::single(Message::Navigate(Route::OrderList)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, &format!("Order #{}", self.id));

        if let Some(order) = self.order.data() {
            let mut text = format!(
                "Number:   {}\n\
                 Buyer:    {} (#{})\n\
                 Status:   {}\n\
                 Placed:   {}\n\
                 Shipped:  {}\n\
                 Address:  {}\n\
                 Tracking: {}\n\
                 \n\
                 Items:\n",
                order.order_number,
                order.buyer.full_name(),
                order.buyer.id,
                order.status,
                pages::format_date(&order.placed_at),
                order
                    .shipped_at
                    .as_ref()
                    .map_or("-".to_string(), pages::format_date),
                order.shipping_address,
                order.tracking_number.as_deref().unwrap_or("-"),
            );
            for item in &order.items {
                text.push_str(&format!(
                    "  {:<28} {:>4} x {:>10} = {:>10}\n",
                    item.product_name,
                    item.quantity,
                    format_price(item.price),
                    format_price(item.price * f64::from(item.quantity)),
                ));
            }
            text.push_str(&format!("\nTotal: {}", format_price(order.total_amount)));

            let title = if self.order.is_loading() {
                "Order (refreshing...)"
            } else {
                "Order"
            };
            let body =
                Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, chrome.content);
        } else if self.order.is_not_found() {
            let text = format!(
                "Order #{} was not found.\n\nIt may have been cancelled and removed. Press Esc to return to the order list.",
                self.id
            );
            let body = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Not found"));
            frame.render_widget(body, chrome.content);
        } else if let Some(error) = self.order.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "order");
        }

        if let Some(entry) = &self.tracking_entry {
            pages::render_footer(frame, chrome.footer, &format!("Tracking number: {entry}_"));
        } else if let Some(notice) = &self.notice {
            pages::render_error_footer(frame, chrome.footer, notice);
        } else if let Some(error) = self.mutation_error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else {
            pages::render_footer(
                frame,
                chrome.footer,
                "s: advance status, t: tracking, x: cancel order, Esc: back, q: quit",
            );
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let id = self.id;
        vec![
            Subscription::new(Query::new("order", &(id, self.refresh), move || {
                let client = client.clone();
                Box::pin(async move { client.order(id).await })
            }))
            .map(|event| Message::Orders(Msg::Fetched(event))),
        ]
    }
}

/// Section focus of the order form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Buyer,
    Address,
    Items,
    Confirm,
}

impl Section {
    fn next(self) -> Self {
        match self {
            Self::Buyer => Self::Address,
            Self::Address => Self::Items,
            Self::Items => Self::Confirm,
            Self::Confirm => Self::Buyer,
        }
    }
}

/// Validates one line before it is added to the draft.
///
/// `already_drafted` counts the quantity of the same product already in the
/// draft, so adding twice cannot oversell either.
fn validate_item(product: &Product, already_drafted: u32, requested: u32) -> Result<(), String> {
    if requested == 0 {
        return Err("Quantity must be greater than zero".to_string());
    }
    let available = product.quantity.saturating_sub(already_drafted);
    if requested > available {
        return Err(format!(
            "Requested {requested} of '{}' but only {available} available",
            product.name
        ));
    }
    Ok(())
}

/// Validates the whole draft before submission.
fn validate_draft(draft: &NewOrder) -> Result<(), String> {
    if draft.buyer_id == 0 {
        return Err("Select a buyer first".to_string());
    }
    if draft.shipping_address.trim().is_empty() {
        return Err("Shipping address is required".to_string());
    }
    if draft.items.is_empty() {
        return Err("Add at least one item to the order".to_string());
    }
    Ok(())
}

/// Compose and submit a new order.
pub struct FormPage {
    client: Arc<ApiClient>,
    buyers: QueryMachine<Vec<Buyer>>,
    products: QueryMachine<Vec<Product>>,
    section: Section,
    buyer_idx: usize,
    address: String,
    address_dirty: bool,
    product_idx: usize,
    qty_input: String,
    items: Vec<NewOrderItem>,
    item_idx: usize,
    save: MutationMachine<Order>,
    validation: Option<String>,
}

impl FormPage {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            buyers: QueryMachine::new(),
            products: QueryMachine::new(),
            section: Section::Buyer,
            buyer_idx: 0,
            address: String::new(),
            address_dirty: false,
            product_idx: 0,
            qty_input: "1".to_string(),
            items: Vec::new(),
            item_idx: 0,
            save: MutationMachine::new(),
            validation: None,
        }
    }

    fn selected_buyer(&self) -> Option<&Buyer> {
        self.buyers.data().and_then(|buyers| buyers.get(self.buyer_idx))
    }

    fn selected_product(&self) -> Option<&Product> {
        self.products
            .data()
            .and_then(|products| products.get(self.product_idx))
    }

    fn product_by_id(&self, id: u64) -> Option<&Product> {
        self.products
            .data()
            .and_then(|products| products.iter().find(|product| product.id == id))
    }

    fn draft(&self) -> NewOrder {
        NewOrder {
            buyer_id: self.selected_buyer().map_or(0, |buyer| buyer.id),
            shipping_address: self.address.trim().to_string(),
            items: self.items.clone(),
        }
    }

    fn total(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|item| {
                self.product_by_id(item.product_id)
                    .map(|product| product.price * f64::from(item.quantity))
            })
            .sum()
    }

    /// Fill the address from the buyer's stored shipping address, unless the
    /// admin already typed one.
    fn autofill_address(&mut self) {
        if self.address_dirty {
            return;
        }
        let stored = self
            .selected_buyer()
            .and_then(|buyer| buyer.shipping_address.clone());
        if let Some(address) = stored {
            self.address = address;
        }
    }

    fn add_item(&mut self) {
        let requested: u32 = self.qty_input.parse().unwrap_or(0);
        let (product_id, verdict) = match self.selected_product() {
            Some(product) => {
                let already: u32 = self
                    .items
                    .iter()
                    .filter(|item| item.product_id == product.id)
                    .map(|item| item.quantity)
                    .sum();
                (product.id, validate_item(product, already, requested))
            }
            None => {
                self.validation = Some("Select a product first".to_string());
                return;
            }
        };

        if let Err(message) = verdict {
            self.validation = Some(message);
            return;
        }
        self.validation = None;

        match self.items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity += requested,
            None => self.items.push(NewOrderItem {
                product_id,
                quantity: requested,
            }),
        }
        self.qty_input = "1".to_string();
    }

    fn submit(&mut self) -> Command<Message> {
        if self.save.is_loading() {
            return Command::none();
        }
        let draft = self.draft();
        if let Err(message) = validate_draft(&draft) {
            self.validation = Some(message);
            return Command::none();
        }
        self.validation = None;

        let client = self.client.clone();
        let token = self.save.begin();
        Mutation::mutate(draft, move |draft| {
            Box::pin(async move { client.create_order(&draft).await })
        })
        .map(move |outcome| Message::Orders(Msg::Saved(token, outcome)))
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::BuyersFetched(event) => {
                self.buyers.on_event(event);
                let len = self.buyers.data().map_or(0, Vec::len);
                self.buyer_idx = self.buyer_idx.min(len.saturating_sub(1));
                self.autofill_address();
                Command::none()
            }
            Msg::ProductsFetched(event) => {
                self.products.on_event(event);
                let len = self.products.data().map_or(0, Vec::len);
                self.product_idx = self.product_idx.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::NextSection => {
                self.section = self.section.next();
                Command::none()
            }
            Msg::BuyerPrev => {
                self.buyer_idx = self.buyer_idx.saturating_sub(1);
                self.autofill_address();
                Command::none()
            }
            Msg::BuyerNext => {
                let len = self.buyers.data().map_or(0, Vec::len);
                self.buyer_idx = (self.buyer_idx + 1).min(len.saturating_sub(1));
                self.autofill_address();
                Command::none()
            }
            Msg::ProductPrev => {
                self.product_idx = self.product_idx.saturating_sub(1);
                Command::none()
            }
            Msg::ProductNext => {
                let len = self.products.data().map_or(0, Vec::len);
                self.product_idx = (self.product_idx + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::AddressInput(c) => {
                self.address.push(c);
                self.address_dirty = true;
                Command::none()
            }
            Msg::AddressBackspace => {
                self.address.pop();
                self.address_dirty = true;
                Command::none()
            }
            Msg::QtyInput(c) => {
                if c.is_ascii_digit() && self.qty_input.len() < 4 {
                    self.qty_input.push(c);
                }
                Command::none()
            }
            Msg::QtyBackspace => {
                self.qty_input.pop();
                Command::none()
            }
            Msg::AddItem => {
                self.add_item();
                Command::none()
            }
            Msg::ItemUp => {
                self.item_idx = self.item_idx.saturating_sub(1);
                Command::none()
            }
            Msg::ItemDown => {
                self.item_idx = (self.item_idx + 1).min(self.items.len().saturating_sub(1));
                Command::none()
            }
            Msg::RemoveItem => {
                if self.item_idx < self.items.len() {
                    self.items.remove(self.item_idx);
                    self.item_idx = self.item_idx.min(self.items.len().saturating_sub(1));
                }
                Command::none()
            }
            Msg::Submit => self.submit(),
            Msg::Saved(token, outcome) => {
                if self.save.settle(token, outcome) && self.save.is_success() {
                    return Command::single(Message::Navigate(Route::OrderList));
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        // Esc and Tab work everywhere; the rest depends on the section.
        match key.code {
            KeyCode::Esc => return Command::single(Message::Navigate(Route::OrderList)),
            KeyCode::Tab => return Command::single(Message::Orders(Msg::NextSection)),
            _ => {}
        }

        match self.section {
            Section::Buyer => match key.code {
                KeyCode::Left => Command::single(Message::Orders(Msg::BuyerPrev)),
                KeyCode::Right => Command::single(Message::Orders(Msg::BuyerNext)),
                KeyCode::Enter => Command::single(Message::Orders(Msg::NextSection)),
                _ => Command::none(),
            },
            Section::Address => match key.code {
                KeyCode::Backspace => Command::single(Message::Orders(Msg::AddressBackspace)),
                KeyCode::Enter => Command::single(Message::Orders(Msg::NextSection)),
                KeyCode::Char(c) => Command::single(Message::Orders(Msg::AddressInput(c))),
                _ => Command::none(),
            },
            Section::Items => match key.code {
                KeyCode::Left => Command::single(Message::Orders(Msg::ProductPrev)),
                KeyCode::Right => Command::single(Message::Orders(Msg::ProductNext)),
                KeyCode::Up => Command::single(Message::Orders(Msg::ItemUp)),
                KeyCode::Down => Command::single(Message::Orders(Msg::ItemDown)),
                KeyCode::Enter => Command::single(Message::Orders(Msg::AddItem)),
                KeyCode::Backspace => Command::single(Message::Orders(Msg::QtyBackspace)),
                KeyCode::Char('r') => Command::single(Message::Orders(Msg::RemoveItem)),
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    Command::single(Message::Orders(Msg::QtyInput(c)))
                }
                _ => Command::none(),
            },
            Section::Confirm => match key.code {
                KeyCode::Enter => Command::single(Message::Orders(Msg::Submit)),
                _ => Command::none(),
            },
        }
    }

    #[allow(clippy::too_many_lines)]
    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, "New Order");

        let marker = |section: Section| if self.section == section { ">" } else { " " };

        let buyer = match self.selected_buyer() {
            Some(buyer) => format!("< {} ({}) >", buyer.full_name(), buyer.email),
            None if self.buyers.is_loading() => "loading buyers...".to_string(),
            None => "no buyers available".to_string(),
        };
        let product = match self.selected_product() {
            Some(product) => format!(
                "< {} {} ({} in stock) >",
                product.name,
                format_price(product.price),
                product.quantity
            ),
            None if self.products.is_loading() => "loading products...".to_string(),
            None => "no products available".to_string(),
        };

        let mut text = format!(
            "{} Buyer:    {buyer}\n\
             {} Address:  {}\n\
             {} Product:  {product}   Qty: {}\n",
            marker(Section::Buyer),
            marker(Section::Address),
            self.address,
            marker(Section::Items),
            self.qty_input,
        );

        text.push_str("\n  Items:\n");
        if self.items.is_empty() {
            text.push_str("    (none yet)\n");
        } else {
            for (i, item) in self.items.iter().enumerate() {
                let selected = if self.section == Section::Items && i == self.item_idx {
                    ">"
                } else {
                    " "
                };
                let (name, line_total) = match self.product_by_id(item.product_id) {
                    Some(product) => (
                        product.name.clone(),
                        format_price(product.price * f64::from(item.quantity)),
                    ),
                    None => (format!("product #{}", item.product_id), "-".to_string()),
                };
                text.push_str(&format!(
                    "   {selected} {:<28} x{:<4} {}\n",
                    name, item.quantity, line_total
                ));
            }
        }
        text.push_str(&format!("\n  Total: {}\n", format_price(self.total())));
        text.push_str(&format!(
            "\n{} [ Create order ]",
            marker(Section::Confirm)
        ));

        let body = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
        frame.render_widget(body, chrome.content);

        if let Some(validation) = &self.validation {
            pages::render_error_footer(frame, chrome.footer, validation);
        } else if let Some(error) = self.save.error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else if self.save.is_loading() {
            pages::render_footer(frame, chrome.footer, "Creating order...");
        } else {
            let hints = match self.section {
                Section::Buyer => "←/→: choose buyer, Tab: next section, Esc: cancel",
                Section::Address => "type the address, Tab: next section, Esc: cancel",
                Section::Items => {
                    "←/→: product, 0-9: qty, Enter: add, ↑/↓: items, r: remove, Tab: next, Esc: cancel"
                }
                Section::Confirm => "Enter: create the order, Tab: back to buyer, Esc: cancel",
            };
            pages::render_footer(frame, chrome.footer, hints);
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let buyers_client = self.client.clone();
        let products_client = self.client.clone();
        vec![
            Subscription::new(Query::new("buyers", &(), move || {
                let client = buyers_client.clone();
                Box::pin(async move { client.buyers().await })
            }))
            .map(|event| Message::Orders(Msg::BuyersFetched(event))),
            Subscription::new(Query::new("products", &(), move || {
                let client = products_client.clone();
                Box::pin(async move { client.products().await })
            }))
            .map(|event| Message::Orders(Msg::ProductsFetched(event))),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiConfig, OrderStatus, ProductStatus, Role, Seller};
    use crate::pages::buffer_text;
    use chrono::Utc;
    use ratatui::{Terminal, backend::TestBackend};

    fn client() -> Arc<ApiClient> {
        Arc::new(ApiClient::new(ApiConfig::default()).unwrap())
    }

    fn buyer(id: u64) -> Buyer {
        Buyer {
            id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Buyer,
            active: true,
            shipping_address: Some("12 Analytical Way".to_string()),
            billing_address: None,
            phone_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seller(id: u64) -> Seller {
        Seller {
            id,
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@acme.example".to_string(),
            role: Role::Seller,
            active: true,
            company_name: "Acme Compilers".to_string(),
            company_description: None,
            contact_phone: None,
            business_address: None,
            tax_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(id: u64, stock: u32) -> Product {
        Product {
            id,
            name: "Compiler Handbook".to_string(),
            description: None,
            price: 10.0,
            quantity: stock,
            image_url: None,
            category: None,
            seller: seller(1),
            status: ProductStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(id: u64, status: OrderStatus) -> Order {
        Order {
            id,
            order_number: format!("ORD-2025-{id:04}"),
            buyer: buyer(1),
            items: vec![],
            total_amount: 20.0,
            status,
            placed_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
            shipping_address: "12 Analytical Way".to_string(),
            tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn form_with_data(stock: u32) -> FormPage {
        let mut page = FormPage::new(client());
        let token = page.buyers.begin();
        page.buyers.settle(token, Ok(vec![buyer(1)]));
        page.autofill_address();
        let token = page.products.begin();
        page.products.settle(token, Ok(vec![product(7, stock)]));
        page
    }

    fn render<F: Fn(&mut Frame)>(view: F) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| view(frame)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_validate_item_rejects_oversell_naming_quantities() {
        let product = product(7, 3);
        let err = validate_item(&product, 0, 5).unwrap_err();
        assert!(err.contains("Requested 5"), "got: {err}");
        assert!(err.contains("only 3 available"), "got: {err}");
        assert!(validate_item(&product, 0, 3).is_ok());
    }

    #[test]
    fn test_validate_item_counts_quantity_already_in_draft() {
        let product = product(7, 3);
        assert!(validate_item(&product, 2, 1).is_ok());
        let err = validate_item(&product, 2, 2).unwrap_err();
        assert!(err.contains("only 1 available"), "got: {err}");
    }

    #[test]
    fn test_validate_draft_rejects_unselected_buyer() {
        let draft = NewOrder {
            buyer_id: 0,
            shipping_address: "12 Analytical Way".to_string(),
            items: vec![NewOrderItem {
                product_id: 7,
                quantity: 1,
            }],
        };
        assert_eq!(validate_draft(&draft).unwrap_err(), "Select a buyer first");
    }

    #[test]
    fn test_submit_without_buyer_issues_no_command() {
        // No buyers loaded: the draft's buyer id is 0.
        let mut page = FormPage::new(client());
        page.address = "somewhere".to_string();
        page.items.push(NewOrderItem {
            product_id: 7,
            quantity: 1,
        });

        let cmd = page.update(Msg::Submit);
        assert!(cmd.stream.is_none(), "no request may be issued");
        assert_eq!(page.validation.as_deref(), Some("Select a buyer first"));
        assert!(!page.save.is_loading());
    }

    #[test]
    fn test_add_item_over_stock_is_rejected_with_no_command() {
        let mut page = form_with_data(3);
        page.qty_input = "5".to_string();

        let cmd = page.update(Msg::AddItem);
        assert!(cmd.stream.is_none());
        assert!(page.items.is_empty());
        let message = page.validation.expect("should set a validation message");
        assert!(message.contains("Requested 5"));
        assert!(message.contains("only 3 available"));
    }

    #[test]
    fn test_add_item_twice_merges_and_respects_stock() {
        let mut page = form_with_data(3);
        page.qty_input = "2".to_string();
        let _ = page.update(Msg::AddItem);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].quantity, 2);

        // 2 left in stock minus 2 drafted: adding 2 more must fail.
        page.qty_input = "2".to_string();
        let _ = page.update(Msg::AddItem);
        assert_eq!(page.items[0].quantity, 2, "draft must be unchanged");
        assert!(page.validation.is_some());

        page.qty_input = "1".to_string();
        let _ = page.update(Msg::AddItem);
        assert_eq!(page.items[0].quantity, 3);
    }

    #[test]
    fn test_buyer_selection_autofills_address() {
        let page = form_with_data(3);
        assert_eq!(page.address, "12 Analytical Way");
    }

    #[test]
    fn test_valid_draft_submits() {
        let mut page = form_with_data(3);
        page.qty_input = "2".to_string();
        let _ = page.update(Msg::AddItem);

        let cmd = page.update(Msg::Submit);
        assert!(cmd.stream.is_some());
        assert!(page.save.is_loading());
        assert!(page.validation.is_none());
    }

    #[test]
    fn test_total_follows_draft_items() {
        let mut page = form_with_data(10);
        assert_eq!(page.total(), 0.0);
        page.qty_input = "3".to_string();
        let _ = page.update(Msg::AddItem);
        assert!((page.total() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_detail_advance_status_uses_next_in_chain() {
        let mut page = DetailPage::new(client(), 4);
        let token = page.order.begin();
        page.order.settle(token, Ok(order(4, OrderStatus::Pending)));

        let cmd = page.update(Msg::AdvanceStatus);
        assert!(cmd.stream.is_some());
        assert!(page.status.is_loading());
    }

    #[test]
    fn test_detail_advance_status_stops_at_end_of_chain() {
        let mut page = DetailPage::new(client(), 4);
        let token = page.order.begin();
        page.order.settle(token, Ok(order(4, OrderStatus::Delivered)));

        let cmd = page.update(Msg::AdvanceStatus);
        assert!(cmd.stream.is_none());
        assert_eq!(
            page.notice.as_deref(),
            Some("No further status after DELIVERED")
        );
    }

    #[test]
    fn test_detail_status_success_refetches_order() {
        let mut page = DetailPage::new(client(), 4);
        let token = page.order.begin();
        page.order.settle(token, Ok(order(4, OrderStatus::Pending)));
        let _ = page.update(Msg::AdvanceStatus);

        let before = page.subscriptions().remove(0).id();
        let _ = page.update(Msg::StatusUpdated(0, Ok(order(4, OrderStatus::Processing))));
        let after = page.subscriptions().remove(0).id();
        assert_ne!(before, after, "refresh bump must restart the order query");
    }

    #[test]
    fn test_list_buyer_filter_changes_query_identity() {
        let mut page = ListPage::new(client());
        let before = page.subscriptions().remove(0).id();

        let _ = page.update(Msg::PromptBuyerFilter);
        let _ = page.update(Msg::PromptInput('1'));
        let _ = page.update(Msg::PromptApply);

        assert_eq!(page.buyer_filter, Some(1));
        let after = page.subscriptions().remove(0).id();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_list_lookup_navigates_when_order_resolves() {
        use crate::subscription::SubscriptionSource;
        use futures::StreamExt;

        let mut page = ListPage::new(client());
        let _ = page.update(Msg::PromptNumberLookup);
        for c in "ORD-2025-0004".chars() {
            let _ = page.update(Msg::PromptInput(c));
        }
        let _ = page.update(Msg::PromptApply);
        assert_eq!(page.lookup.as_deref(), Some("ORD-2025-0004"));
        assert_eq!(page.subscriptions().len(), 2, "lookup adds a second query");

        // Drive the lookup with a stub fetcher in place of the real endpoint.
        let target = order(4, OrderStatus::Pending);
        let query = Query::new("order-by-number", &"ORD-2025-0004", move || {
            let order = target.clone();
            Box::pin(async move { Ok(order) })
        });
        let mut stream = query.stream();
        let mut navigated = false;
        while let Some(event) = stream.next().await {
            if page.update(Msg::LookupFetched(event)).stream.is_some() {
                navigated = true;
            }
        }

        assert!(navigated, "resolving the lookup should navigate to the order");
        assert!(page.lookup.is_none(), "lookup is cleared after navigating");
    }

    #[test]
    fn test_empty_list_renders_create_hint() {
        let mut page = ListPage::new(client());
        let token = page.orders.begin();
        page.orders.settle(token, Ok(vec![]));

        let text = render(|frame| page.view(frame));
        assert!(text.contains("No orders yet"));
        assert!(text.contains("'c'"));
    }

    #[test]
    fn test_detail_renders_items_and_total() {
        let mut page = DetailPage::new(client(), 4);
        let token = page.order.begin();
        let mut order = order(4, OrderStatus::Pending);
        order.tracking_number = Some("TRK-123".to_string());
        page.order.settle(token, Ok(order));

        let text = render(|frame| page.view(frame));
        assert!(text.contains("ORD-2025-0004"));
        assert!(text.contains("TRK-123"));
        assert!(text.contains("$20.00"));
    }
}
