//! Product pages: filterable list, detail, and the create/edit form.
//!
//! The list can be narrowed to one category; the filter string is a
//! dependency of the list query, so applying it cancels the unfiltered
//! request and fetches through the category endpoint instead.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::api::{ApiClient, ApiError, NewProduct, Product, ProductUpdate, Seller};
use crate::app::{Message, Route};
use crate::command::Command;
use crate::pages::{self, Field, FormMode, FormState};
use crate::subscription::Subscription;
use crate::subscription::http::{
    Mutation, MutationMachine, Query, QueryEvent, QueryMachine, RequestToken,
};

/// Messages handled by the product pages.
#[derive(Debug)]
pub enum Msg {
    // List
    ListFetched(QueryEvent<Vec<Product>>),
    SelectUp,
    SelectDown,
    OpenSelected,
    EditSelected,
    DeleteSelected,
    Deleted(RequestToken, Result<(), ApiError>),
    FilterStart,
    FilterInput(char),
    FilterBackspace,
    FilterApply,
    FilterCancel,
    FilterClear,
    // Detail and form prefill
    Fetched(QueryEvent<Product>),
    // Form
    SellersFetched(QueryEvent<Vec<Seller>>),
    SellerPrev,
    SellerNext,
    FocusNext,
    FocusPrev,
    Input(char),
    Backspace,
    Submit,
    Saved(RequestToken, Result<Product, ApiError>),
}

/// The product screen currently routed in.
pub enum Page {
    List(ListPage),
    Detail(DetailPage),
    Form(FormPage),
}

impl Page {
    pub fn list(client: Arc<ApiClient>) -> Self {
        Self::List(ListPage::new(client))
    }

    pub fn list_by_seller(client: Arc<ApiClient>, seller_id: u64) -> Self {
        Self::List(ListPage::for_seller(client, seller_id))
    }

    pub fn detail(client: Arc<ApiClient>, id: u64) -> Self {
        Self::Detail(DetailPage::new(client, id))
    }

    pub fn create(client: Arc<ApiClient>) -> Self {
        Self::Form(FormPage::new_create(client))
    }

    pub fn edit(client: Arc<ApiClient>, id: u64) -> Self {
        Self::Form(FormPage::new_edit(client, id))
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

/// All products, optionally narrowed to one category or one seller.
pub struct ListPage {
    client: Arc<ApiClient>,
    products: QueryMachine<Vec<Product>>,
    selected: usize,
    delete: MutationMachine<()>,
    refresh: u32,
    /// Applied category filter; routes the query to the category endpoint.
    category: Option<String>,
    /// Seller scope; routes the query to the by-seller endpoint.
    seller: Option<u64>,
    /// Filter text being typed; `Some` while the filter prompt is open.
    filter_entry: Option<String>,
}

impl ListPage {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            products: QueryMachine::new(),
            selected: 0,
            delete: MutationMachine::new(),
            refresh: 0,
            category: None,
            seller: None,
            filter_entry: None,
        }
    }

    pub fn for_seller(client: Arc<ApiClient>, seller_id: u64) -> Self {
        let mut page = Self::new(client);
        page.seller = Some(seller_id);
        page
    }

    fn selected_product(&self) -> Option<&Product> {
        self.products
            .data()
            .and_then(|products| products.get(self.selected))
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::ListFetched(event) => {
                self.products.on_event(event);
                let len = self.products.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::SelectUp => {
                self.selected = self.selected.saturating_sub(1);
                Command::none()
            }
            Msg::SelectDown => {
                let len = self.products.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::OpenSelected => match self.selected_product() {
                Some(product) => {
                    Command::single(Message::Navigate(Route::ProductDetail(product.id)))
                }
                None => Command::none(),
            },
            Msg::EditSelected => match self.selected_product() {
                Some(product) => Command::single(Message::Navigate(Route::ProductEdit(product.id))),
                None => Command::none(),
            },
            Msg::DeleteSelected => {
                if self.delete.is_loading() {
                    return Command::none();
                }
                let Some(product) = self.selected_product() else {
                    return Command::none();
                };
                let id = product.id;
                let client = self.client.clone();
                let token = self.delete.begin();
                Mutation::mutate(id, move |id| {
                    Box::pin(async move { client.delete_product(id).await })
                })
                .map(move |outcome| Message::Products(Msg::Deleted(token, outcome)))
            }
            Msg::Deleted(token, outcome) => {
                if self.delete.settle(token, outcome) && self.delete.is_success() {
                    self.refresh += 1;
                }
                Command::none()
            }
            Msg::FilterStart => {
                self.filter_entry = Some(self.category.clone().unwrap_or_default());
                Command::none()
            }
            Msg::FilterInput(c) => {
                if let Some(entry) = &mut self.filter_entry {
                    entry.push(c);
                }
                Command::none()
            }
            Msg::FilterBackspace => {
                if let Some(entry) = &mut self.filter_entry {
                    entry.pop();
                }
                Command::none()
            }
            Msg::FilterApply => {
                if let Some(entry) = self.filter_entry.take() {
                    let entry = entry.trim().to_string();
                    self.category = if entry.is_empty() { None } else { Some(entry) };
                    self.selected = 0;
                }
                Command::none()
            }
            Msg::FilterCancel => {
                self.filter_entry = None;
                Command::none()
            }
            Msg::FilterClear => {
                self.category = None;
                self.seller = None;
                self.selected = 0;
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        if self.filter_entry.is_some() {
            return match key.code {
                KeyCode::Enter => Command::single(Message::Products(Msg::FilterApply)),
                KeyCode::Esc => Command::single(Message::Products(Msg::FilterCancel)),
                KeyCode::Backspace => Command::single(Message::Products(Msg::FilterBackspace)),
                KeyCode::Char(c) => Command::single(Message::Products(Msg::FilterInput(c))),
                _ => Command::none(),
            };
        }

        match key.code {
            KeyCode::Up => Command::single(Message::Products(Msg::SelectUp)),
            KeyCode::Down => Command::single(Message::Products(Msg::SelectDown)),
            KeyCode::Enter => Command::single(Message::Products(Msg::OpenSelected)),
            KeyCode::Char('c') => Command::single(Message::Navigate(Route::ProductCreate)),
            KeyCode::Char('e') => Command::single(Message::Products(Msg::EditSelected)),
            KeyCode::Char('d') => Command::single(Message::Products(Msg::DeleteSelected)),
            KeyCode::Char('/') => Command::single(Message::Products(Msg::FilterStart)),
            KeyCode::Char('x') => Command::single(Message::Products(Msg::FilterClear)),
            KeyCode::Esc => Command::single(Message::Navigate(Route::Home)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        let title = match (&self.category, self.seller) {
            (Some(category), _) => format!("Products [category: {category}]"),
            (None, Some(seller_id)) => format!("Products [seller #{seller_id}]"),
            (None, None) => "Products".to_string(),
        };
        pages::render_title(frame, chrome.title, &title);

        if let Some(products) = self.products.data() {
            if products.is_empty() {
                let text = match (&self.category, self.seller) {
                    (Some(category), _) => {
                        format!("No products in category '{category}'. Press 'x' to clear the filter.")
                    }
                    (None, Some(seller_id)) => {
                        format!("Seller #{seller_id} has no products. Press 'x' to see all products.")
                    }
                    (None, None) => "No products yet. Press 'c' to create one.".to_string(),
                };
                let empty =
                    Paragraph::new(text).block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, chrome.content);
            } else {
                let items: Vec<ListItem> = products
                    .iter()
                    .enumerate()
                    .map(|(i, product)| {
                        let marker = if i == self.selected { ">" } else { " " };
                        ListItem::new(format!(
                            "{marker} {:<5} {:<28} {:>10} {:>6} {:<14} {}",
                            product.id,
                            product.name,
                            pages::format_price(product.price),
                            product.quantity,
                            product.status.as_str(),
                            product.seller.company_name,
                        ))
                    })
                    .collect();
                let title = if self.products.is_loading() {
                    "Products (refreshing...)"
                } else {
                    "Products"
                };
                let list =
                    List::new(items).block(Block::default().borders(Borders::ALL).title(title));
                frame.render_widget(list, chrome.content);
            }
        } else if let Some(error) = self.products.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "products");
        }

        if let Some(entry) = &self.filter_entry {
            pages::render_footer(frame, chrome.footer, &format!("Category filter: {entry}_"));
        } else if let Some(error) = self.delete.error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else {
            pages::render_footer(
                frame,
                chrome.footer,
                "↑/↓: select, Enter: view, c: create, e: edit, d: delete, /: filter, x: clear filter, Esc: back",
            );
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let sub = match (&self.category, self.seller) {
            (Some(category), _) => {
                let category = category.clone();
                Subscription::new(Query::new(
                    "products-by-category",
                    &(category.clone(), self.refresh),
                    move || {
                        let client = client.clone();
                        let category = category.clone();
                        Box::pin(async move { client.products_by_category(&category).await })
                    },
                ))
            }
            (None, Some(seller_id)) => Subscription::new(Query::new(
                "products-by-seller",
                &(seller_id, self.refresh),
                move || {
                    let client = client.clone();
                    Box::pin(async move { client.products_by_seller(seller_id).await })
                },
            )),
            (None, None) => Subscription::new(Query::new("products", &self.refresh, move || {
                let client = client.clone();
                Box::pin(async move { client.products().await })
            })),
        };

        vec![sub.map(|event| Message::Products(Msg::ListFetched(event)))]
    }
}

/// One product, read-only, with its seller.
pub struct DetailPage {
    client: Arc<ApiClient>,
    id: u64,
    product: QueryMachine<Product>,
}

impl DetailPage {
    pub fn new(client: Arc<ApiClient>, id: u64) -> Self {
        Self {
            client,
            id,
            product: QueryMachine::new(),
        }
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::Fetched(event) => {
                self.product.on_event(event);
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Char('e') => Command::single(Message::Navigate(Route::ProductEdit(self.id))),
            KeyCode::Esc => Command::single(Message::Navigate(Route::ProductList)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, &format!("Product #{}", self.id));

        if let Some(product) = self.product.data() {
            let text = format!(
                "Name:        {}\n\
                 Price:       {}\n\
                 In stock:    {}\n\
                 Status:      {}\n\
                 Category:    {}\n\
                 Description: {}\n\
                 Image URL:   {}\n\
                 \n\
                 Seller:      {} (#{})\n\
                 Contact:     {} <{}>",
                product.name,
                pages::format_price(product.price),
                product.quantity,
                product.status,
                product.category.as_deref().unwrap_or("-"),
                product.description.as_deref().unwrap_or("-"),
                product.image_url.as_deref().unwrap_or("-"),
                product.seller.company_name,
                product.seller.id,
                product.seller.full_name(),
                product.seller.email,
            );
            let body = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
            frame.render_widget(body, chrome.content);
        } else if self.product.is_not_found() {
            let text = format!(
                "Product #{} was not found.\n\nIt may have been deleted. Press Esc to return to the product list.",
                self.id
            );
            let body = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Not found"));
            frame.render_widget(body, chrome.content);
        } else if let Some(error) = self.product.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "product");
        }

        pages::render_footer(frame, chrome.footer, "e: edit, Esc: back, q: quit");
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let id = self.id;
        vec![
            Subscription::new(Query::new("product", &id, move || {
                let client = client.clone();
                Box::pin(async move { client.product(id).await })
            }))
            .map(|event| Message::Products(Msg::Fetched(event))),
        ]
    }
}

const NAME: &str = "Name";
const DESCRIPTION: &str = "Description";
const PRICE: &str = "Price";
const QUANTITY: &str = "Quantity";
const IMAGE_URL: &str = "Image URL";
const CATEGORY: &str = "Category";

fn parse_price(input: &str) -> Result<f64, String> {
    let price: f64 = input
        .parse()
        .map_err(|_| "Price must be a number".to_string())?;
    if price > 0.0 {
        Ok(price)
    } else {
        Err("Price must be greater than zero".to_string())
    }
}

fn parse_quantity(input: &str) -> Result<u32, String> {
    input
        .parse()
        .map_err(|_| "Quantity must be a whole number".to_string())
}

/// Create or edit a product.
///
/// Create picks the owning seller from a sellers query (←/→); edit cannot
/// move a product to another seller.
pub struct FormPage {
    client: Arc<ApiClient>,
    mode: FormMode,
    form: FormState,
    sellers: QueryMachine<Vec<Seller>>,
    seller_idx: usize,
    prefill: QueryMachine<Product>,
    prefilled: bool,
    save: MutationMachine<Product>,
    validation: Option<String>,
}

impl FormPage {
    fn fields() -> Vec<Field> {
        vec![
            Field::required(NAME),
            Field::optional(DESCRIPTION),
            Field::required(PRICE),
            Field::required(QUANTITY),
            Field::optional(IMAGE_URL),
            Field::optional(CATEGORY),
        ]
    }

    pub fn new_create(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            mode: FormMode::Create,
            form: FormState::new(Self::fields()),
            sellers: QueryMachine::new(),
            seller_idx: 0,
            prefill: QueryMachine::new(),
            prefilled: false,
            save: MutationMachine::new(),
            validation: None,
        }
    }

    pub fn new_edit(client: Arc<ApiClient>, id: u64) -> Self {
        Self {
            client,
            mode: FormMode::Edit(id),
            form: FormState::new(Self::fields()),
            sellers: QueryMachine::new(),
            seller_idx: 0,
            prefill: QueryMachine::new(),
            prefilled: false,
            save: MutationMachine::new(),
            validation: None,
        }
    }

    fn back_route(&self) -> Route {
        match self.mode {
            FormMode::Create => Route::ProductList,
            FormMode::Edit(id) => Route::ProductDetail(id),
        }
    }

    fn selected_seller(&self) -> Option<&Seller> {
        self.sellers
            .data()
            .and_then(|sellers| sellers.get(self.seller_idx))
    }

    fn apply_prefill(&mut self) {
        if self.prefilled {
            return;
        }
        let Some(product) = self.prefill.data() else {
            return;
        };
        let product = product.clone();
        self.form.set(NAME, &product.name);
        self.form
            .set(DESCRIPTION, product.description.as_deref().unwrap_or(""));
        self.form.set(PRICE, &product.price.to_string());
        self.form.set(QUANTITY, &product.quantity.to_string());
        self.form
            .set(IMAGE_URL, product.image_url.as_deref().unwrap_or(""));
        self.form
            .set(CATEGORY, product.category.as_deref().unwrap_or(""));
        self.prefilled = true;
    }

    fn submit(&mut self) -> Command<Message> {
        if self.save.is_loading() {
            return Command::none();
        }
        if let Some(missing) = self.form.first_missing_required() {
            self.validation = Some(format!("{missing} is required"));
            return Command::none();
        }
        let price = match parse_price(&self.form.value_of(PRICE)) {
            Ok(price) => price,
            Err(message) => {
                self.validation = Some(message);
                return Command::none();
            }
        };
        let quantity = match parse_quantity(&self.form.value_of(QUANTITY)) {
            Ok(quantity) => quantity,
            Err(message) => {
                self.validation = Some(message);
                return Command::none();
            }
        };

        let client = self.client.clone();
        match self.mode {
            FormMode::Create => {
                let Some(seller_id) = self.selected_seller().map(|seller| seller.id) else {
                    self.validation = Some("Select a seller first".to_string());
                    return Command::none();
                };
                self.validation = None;
                let payload = NewProduct {
                    name: self.form.value_of(NAME),
                    description: self.form.optional_of(DESCRIPTION),
                    price,
                    quantity,
                    image_url: self.form.optional_of(IMAGE_URL),
                    category: self.form.optional_of(CATEGORY),
                    seller_id,
                };
                let token = self.save.begin();
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.create_product(&payload).await })
                })
                .map(move |outcome| Message::Products(Msg::Saved(token, outcome)))
            }
            FormMode::Edit(id) => {
                self.validation = None;
                let payload = ProductUpdate {
                    name: self.form.value_of(NAME),
                    description: self.form.optional_of(DESCRIPTION),
                    price,
                    quantity,
                    image_url: self.form.optional_of(IMAGE_URL),
                    category: self.form.optional_of(CATEGORY),
                };
                let token = self.save.begin();
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.update_product(id, &payload).await })
                })
                .map(move |outcome| Message::Products(Msg::Saved(token, outcome)))
            }
        }
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::Fetched(event) => {
                self.prefill.on_event(event);
                self.apply_prefill();
                Command::none()
            }
            Msg::SellersFetched(event) => {
                self.sellers.on_event(event);
                let len = self.sellers.data().map_or(0, Vec::len);
                self.seller_idx = self.seller_idx.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::SellerPrev => {
                self.seller_idx = self.seller_idx.saturating_sub(1);
                Command::none()
            }
            Msg::SellerNext => {
                let len = self.sellers.data().map_or(0, Vec::len);
                self.seller_idx = (self.seller_idx + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::FocusNext => {
                self.form.focus_next();
                Command::none()
            }
            Msg::FocusPrev => {
                self.form.focus_prev();
                Command::none()
            }
            Msg::Input(c) => {
                self.form.input(c);
                Command::none()
            }
            Msg::Backspace => {
                self.form.backspace();
                Command::none()
            }
            Msg::Submit => self.submit(),
            Msg::Saved(token, outcome) => {
                if self.save.settle(token, outcome) && self.save.is_success() {
                    return Command::single(Message::Navigate(self.back_route()));
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Esc => Command::single(Message::Navigate(self.back_route())),
            KeyCode::Enter => Command::single(Message::Products(Msg::Submit)),
            KeyCode::Tab | KeyCode::Down => Command::single(Message::Products(Msg::FocusNext)),
            KeyCode::BackTab | KeyCode::Up => Command::single(Message::Products(Msg::FocusPrev)),
            KeyCode::Left if matches!(self.mode, FormMode::Create) => {
                Command::single(Message::Products(Msg::SellerPrev))
            }
            KeyCode::Right if matches!(self.mode, FormMode::Create) => {
                Command::single(Message::Products(Msg::SellerNext))
            }
            KeyCode::Backspace => Command::single(Message::Products(Msg::Backspace)),
            KeyCode::Char(c) => Command::single(Message::Products(Msg::Input(c))),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        let title = match self.mode {
            FormMode::Create => "New Product".to_string(),
            FormMode::Edit(id) => format!("Edit Product #{id}"),
        };
        pages::render_title(frame, chrome.title, &title);

        // Form plus, on create, the seller picker line.
        let mut lines = Vec::with_capacity(self.form.fields.len() + 2);
        for (i, field) in self.form.fields.iter().enumerate() {
            let marker = if i == self.form.focus { ">" } else { " " };
            let required = if field.required { " *" } else { "" };
            lines.push(format!("{marker} {}{required}: {}", field.label, field.value));
        }
        if matches!(self.mode, FormMode::Create) {
            let seller = match self.selected_seller() {
                Some(seller) => format!("< {} (#{}) >", seller.company_name, seller.id),
                None if self.sellers.is_loading() => "loading sellers...".to_string(),
                None => "no sellers available".to_string(),
            };
            lines.push(String::new());
            lines.push(format!("  Seller *: {seller}"));
        }
        let body =
            Paragraph::new(lines.join("\n")).block(Block::default().borders(Borders::ALL));
        frame.render_widget(body, chrome.content);

        if let Some(validation) = &self.validation {
            pages::render_error_footer(frame, chrome.footer, validation);
        } else if let Some(error) = self.save.error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else if self.save.is_loading() {
            pages::render_footer(frame, chrome.footer, "Saving...");
        } else {
            let hints = match self.mode {
                FormMode::Create => "Tab/↑/↓: fields, ←/→: seller, Enter: save, Esc: cancel",
                FormMode::Edit(_) => "Tab/↑/↓: fields, Enter: save, Esc: cancel",
            };
            pages::render_footer(frame, chrome.footer, hints);
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        match self.mode {
            FormMode::Create => {
                let client = self.client.clone();
                vec![
                    Subscription::new(Query::new("sellers", &(), move || {
                        let client = client.clone();
                        Box::pin(async move { client.sellers().await })
                    }))
                    .map(|event| Message::Products(Msg::SellersFetched(event))),
                ]
            }
            FormMode::Edit(id) => {
                let client = self.client.clone();
                vec![
                    Subscription::new(Query::new("product", &id, move || {
                        let client = client.clone();
                        Box::pin(async move { client.product(id).await })
                    }))
                    .map(|event| Message::Products(Msg::Fetched(event))),
                ]
            }
        }
    }
}
