//! Seller pages: list, detail, and the create/edit form.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::api::{ApiClient, ApiError, NewSeller, Seller, SellerUpdate};
use crate::app::{Message, Route};
use crate::command::Command;
use crate::pages::{self, Field, FormMode, FormState};
use crate::subscription::Subscription;
use crate::subscription::http::{
    Mutation, MutationMachine, Query, QueryEvent, QueryMachine, RequestToken,
};

/// Messages handled by the seller pages.
#[derive(Debug)]
pub enum Msg {
    ListFetched(QueryEvent<Vec<Seller>>),
    SelectUp,
    SelectDown,
    OpenSelected,
    EditSelected,
    DeleteSelected,
    Deleted(RequestToken, Result<(), ApiError>),
    Fetched(QueryEvent<Seller>),
    FocusNext,
    FocusPrev,
    Input(char),
    Backspace,
    Submit,
    Saved(RequestToken, Result<Seller, ApiError>),
}

/// The seller screen currently routed in.
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

/// All sellers, selectable.
pub struct ListPage {
    client: Arc<ApiClient>,
    sellers: QueryMachine<Vec<Seller>>,
    selected: usize,
    delete: MutationMachine<()>,
    refresh: u32,
}

impl ListPage {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            sellers: QueryMachine::new(),
            selected: 0,
            delete: MutationMachine::new(),
            refresh: 0,
        }
    }

    fn selected_seller(&self) -> Option<&Seller> {
        self.sellers
            .data()
            .and_then(|sellers| sellers.get(self.selected))
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::ListFetched(event) => {
                self.sellers.on_event(event);
                let len = self.sellers.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::SelectUp => {
                self.selected = self.selected.saturating_sub(1);
                Command::none()
            }
            Msg::SelectDown => {
                let len = self.sellers.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::OpenSelected => match self.selected_seller() {
                Some(seller) => Command::single(Message::Navigate(Route::SellerDetail(seller.id))),
                None => Command::none(),
            },
            Msg::EditSelected => match self.selected_seller() {
                Some(seller) => Command::single(Message::Navigate(Route::SellerEdit(seller.id))),
                None => Command::none(),
            },
            Msg::DeleteSelected => {
                if self.delete.is_loading() {
                    return Command::none();
                }
                let Some(seller) = self.selected_seller() else {
                    return Command::none();
                };
                let id = seller.id;
                let client = self.client.clone();
                let token = self.delete.begin();
                Mutation::mutate(id, move |id| {
                    Box::pin(async move { client.delete_seller(id).await })
                })
                .map(move |outcome| Message::Sellers(Msg::Deleted(token, outcome)))
            }
            Msg::Deleted(token, outcome) => {
                if self.delete.settle(token, outcome) && self.delete.is_success() {
                    self.refresh += 1;
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Up => Command::single(Message::Sellers(Msg::SelectUp)),
            KeyCode::Down => Command::single(Message::Sellers(Msg::SelectDown)),
            KeyCode::Enter => Command::single(Message::Sellers(Msg::OpenSelected)),
            KeyCode::Char('c') => Command::single(Message::Navigate(Route::SellerCreate)),
            KeyCode::Char('e') => Command::single(Message::Sellers(Msg::EditSelected)),
            KeyCode::Char('d') => Command::single(Message::Sellers(Msg::DeleteSelected)),
            KeyCode::Esc => Command::single(Message::Navigate(Route::Home)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, "Sellers");

        if let Some(sellers) = self.sellers.data() {
            if sellers.is_empty() {
                let empty = Paragraph::new("No sellers yet. Press 'c' to create one.")
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, chrome.content);
            } else {
                let items: Vec<ListItem> = sellers
                    .iter()
                    .enumerate()
                    .map(|(i, seller)| {
                        let marker = if i == self.selected { ">" } else { " " };
                        ListItem::new(format!(
                            "{marker} {:<5} {:<26} {:<24} {}",
                            seller.id,
                            seller.company_name,
                            seller.full_name(),
                            seller.email,
                        ))
                    })
                    .collect();
                let title = if self.sellers.is_loading() {
                    "Sellers (refreshing...)"
                } else {
                    "Sellers"
                };
                let list =
                    List::new(items).block(Block::default().borders(Borders::ALL).title(title));
                frame.render_widget(list, chrome.content);
            }
        } else if let Some(error) = self.sellers.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "sellers");
        }

        if let Some(error) = self.delete.error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else {
            pages::render_footer(
                frame,
                chrome.footer,
                "↑/↓: select, Enter: view, c: create, e: edit, d: delete, Esc: back, q: quit",
            );
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        vec![
            Subscription::new(Query::new("sellers", &self.refresh, move || {
                let client = client.clone();
                Box::pin(async move { client.sellers().await })
            }))
            .map(|event| Message::Sellers(Msg::ListFetched(event))),
        ]
    }
}

/// One seller, read-only.
pub struct DetailPage {
    client: Arc<ApiClient>,
    id: u64,
    seller: QueryMachine<Seller>,
}

impl DetailPage {
    pub fn new(client: Arc<ApiClient>, id: u64) -> Self {
        Self {
            client,
            id,
            seller: QueryMachine::new(),
        }
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::Fetched(event) => {
                self.seller.on_event(event);
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Char('e') => Command::single(Message::Navigate(Route::SellerEdit(self.id))),
            // Jump to this seller's catalog
            KeyCode::Char('p') => {
                Command::single(Message::Navigate(Route::ProductsBySeller(self.id)))
            }
            KeyCode::Esc => Command::single(Message::Navigate(Route::SellerList)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, &format!("Seller #{}", self.id));

        if let Some(seller) = self.seller.data() {
            let text = format!(
                "Company:          {}\n\
                 Contact:          {}\n\
                 Email:            {}\n\
                 Active:           {}\n\
                 Description:      {}\n\
                 Contact phone:    {}\n\
                 Business address: {}\n\
                 Tax id:           {}\n\
                 Created:          {}",
                seller.company_name,
                seller.full_name(),
                seller.email,
                if seller.active { "yes" } else { "no" },
                seller.company_description.as_deref().unwrap_or("-"),
                seller.contact_phone.as_deref().unwrap_or("-"),
                seller.business_address.as_deref().unwrap_or("-"),
                seller.tax_id.as_deref().unwrap_or("-"),
                pages::format_date(&seller.created_at),
            );
            let body = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
            frame.render_widget(body, chrome.content);
        } else if self.seller.is_not_found() {
            let text = format!(
                "Seller #{} was not found.\n\nIt may have been deleted. Press Esc to return to the seller list.",
                self.id
            );
            let body = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Not found"));
            frame.render_widget(body, chrome.content);
        } else if let Some(error) = self.seller.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "seller");
        }

        pages::render_footer(frame, chrome.footer, "e: edit, p: products, Esc: back, q: quit");
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let id = self.id;
        vec![
            Subscription::new(Query::new("seller", &id, move || {
                let client = client.clone();
                Box::pin(async move { client.seller(id).await })
            }))
            .map(|event| Message::Sellers(Msg::Fetched(event))),
        ]
    }
}

const FIRST_NAME: &str = "First name";
const LAST_NAME: &str = "Last name";
const EMAIL: &str = "Email";
const PASSWORD: &str = "Password";
const COMPANY_NAME: &str = "Company name";
const COMPANY_DESCRIPTION: &str = "Company description";
const CONTACT_PHONE: &str = "Contact phone";
const BUSINESS_ADDRESS: &str = "Business address";
const TAX_ID: &str = "Tax id";

/// Create or edit a seller.
pub struct FormPage {
    client: Arc<ApiClient>,
    mode: FormMode,
    form: FormState,
    prefill: QueryMachine<Seller>,
    prefilled: bool,
    save: MutationMachine<Seller>,
    validation: Option<String>,
}

impl FormPage {
    pub fn new_create(client: Arc<ApiClient>) -> Self {
        let form = FormState::new(vec![
            Field::required(FIRST_NAME),
            Field::required(LAST_NAME),
            Field::required(EMAIL),
            Field::secret(PASSWORD),
            Field::required(COMPANY_NAME),
            Field::optional(COMPANY_DESCRIPTION),
            Field::optional(CONTACT_PHONE),
            Field::optional(BUSINESS_ADDRESS),
            Field::optional(TAX_ID),
        ]);
        Self {
            client,
            mode: FormMode::Create,
            form,
            prefill: QueryMachine::new(),
            prefilled: false,
            save: MutationMachine::new(),
            validation: None,
        }
    }

    pub fn new_edit(client: Arc<ApiClient>, id: u64) -> Self {
        let form = FormState::new(vec![
            Field::required(FIRST_NAME),
            Field::required(LAST_NAME),
            Field::required(COMPANY_NAME),
            Field::optional(COMPANY_DESCRIPTION),
            Field::optional(CONTACT_PHONE),
            Field::optional(BUSINESS_ADDRESS),
            Field::optional(TAX_ID),
        ]);
        Self {
            client,
            mode: FormMode::Edit(id),
            form,
            prefill: QueryMachine::new(),
            prefilled: false,
            save: MutationMachine::new(),
            validation: None,
        }
    }

    fn back_route(&self) -> Route {
        match self.mode {
            FormMode::Create => Route::SellerList,
            FormMode::Edit(id) => Route::SellerDetail(id),
        }
    }

    fn apply_prefill(&mut self) {
        if self.prefilled {
            return;
        }
        let Some(seller) = self.prefill.data() else {
            return;
        };
        let seller = seller.clone();
        self.form.set(FIRST_NAME, &seller.first_name);
        self.form.set(LAST_NAME, &seller.last_name);
        self.form.set(COMPANY_NAME, &seller.company_name);
        self.form.set(
            COMPANY_DESCRIPTION,
            seller.company_description.as_deref().unwrap_or(""),
        );
        self.form
            .set(CONTACT_PHONE, seller.contact_phone.as_deref().unwrap_or(""));
        self.form.set(
            BUSINESS_ADDRESS,
            seller.business_address.as_deref().unwrap_or(""),
        );
        self.form.set(TAX_ID, seller.tax_id.as_deref().unwrap_or(""));
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
        self.validation = None;

        let client = self.client.clone();
        let token = self.save.begin();
        match self.mode {
            FormMode::Create => {
                let payload = NewSeller {
                    first_name: self.form.value_of(FIRST_NAME),
                    last_name: self.form.value_of(LAST_NAME),
                    email: self.form.value_of(EMAIL),
                    password: self.form.value_of(PASSWORD),
                    company_name: self.form.value_of(COMPANY_NAME),
                    company_description: self.form.optional_of(COMPANY_DESCRIPTION),
                    contact_phone: self.form.optional_of(CONTACT_PHONE),
                    business_address: self.form.optional_of(BUSINESS_ADDRESS),
                    tax_id: self.form.optional_of(TAX_ID),
                };
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.create_seller(&payload).await })
                })
                .map(move |outcome| Message::Sellers(Msg::Saved(token, outcome)))
            }
            FormMode::Edit(id) => {
                let payload = SellerUpdate {
                    first_name: self.form.value_of(FIRST_NAME),
                    last_name: self.form.value_of(LAST_NAME),
                    company_name: self.form.value_of(COMPANY_NAME),
                    company_description: self.form.optional_of(COMPANY_DESCRIPTION),
                    contact_phone: self.form.optional_of(CONTACT_PHONE),
                    business_address: self.form.optional_of(BUSINESS_ADDRESS),
                    tax_id: self.form.optional_of(TAX_ID),
                };
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.update_seller(id, &payload).await })
                })
                .map(move |outcome| Message::Sellers(Msg::Saved(token, outcome)))
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
            KeyCode::Enter => Command::single(Message::Sellers(Msg::Submit)),
            KeyCode::Tab | KeyCode::Down => Command::single(Message::Sellers(Msg::FocusNext)),
            KeyCode::BackTab | KeyCode::Up => Command::single(Message::Sellers(Msg::FocusPrev)),
            KeyCode::Backspace => Command::single(Message::Sellers(Msg::Backspace)),
            KeyCode::Char(c) => Command::single(Message::Sellers(Msg::Input(c))),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        let title = match self.mode {
            FormMode::Create => "New Seller".to_string(),
            FormMode::Edit(id) => format!("Edit Seller #{id}"),
        };
        pages::render_title(frame, chrome.title, &title);

        pages::render_form(frame, chrome.content, &self.form);

        if let Some(validation) = &self.validation {
            pages::render_error_footer(frame, chrome.footer, validation);
        } else if let Some(error) = self.save.error() {
            pages::render_error_footer(frame, chrome.footer, &error.message);
        } else if self.save.is_loading() {
            pages::render_footer(frame, chrome.footer, "Saving...");
        } else {
            pages::render_footer(
                frame,
                chrome.footer,
                "Tab/↑/↓: fields, Enter: save, Esc: cancel",
            );
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        match self.mode {
            FormMode::Create => vec![],
            FormMode::Edit(id) => {
                let client = self.client.clone();
                vec![
                    Subscription::new(Query::new("seller", &id, move || {
                        let client = client.clone();
                        Box::pin(async move { client.seller(id).await })
                    }))
                    .map(|event| Message::Sellers(Msg::Fetched(event))),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiConfig, Role};
    use crate::pages::buffer_text;
    use chrono::Utc;
    use ratatui::{Terminal, backend::TestBackend};

    fn client() -> Arc<ApiClient> {
        Arc::new(ApiClient::new(ApiConfig::default()).unwrap())
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
            tax_id: Some("US-12-3456789".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn render<F: Fn(&mut Frame)>(view: F) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| view(frame)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_list_renders_company_names() {
        let mut page = ListPage::new(client());
        let token = page.sellers.begin();
        page.sellers.settle(token, Ok(vec![seller(1)]));

        let text = render(|frame| page.view(frame));
        assert!(text.contains("Acme Compilers"));
        assert!(text.contains("Grace Hopper"));
    }

    #[test]
    fn test_create_requires_company_name() {
        let mut page = FormPage::new_create(client());
        page.form.set(FIRST_NAME, "Grace");
        page.form.set(LAST_NAME, "Hopper");
        page.form.set(EMAIL, "grace@acme.example");
        page.form.set(PASSWORD, "hunter2");

        let cmd = page.update(Msg::Submit);
        assert!(cmd.stream.is_none());
        assert_eq!(page.validation.as_deref(), Some("Company name is required"));
    }

    #[test]
    fn test_detail_not_found_rendering() {
        let mut page = DetailPage::new(client(), 8);
        let token = page.seller.begin();
        page.seller.settle(
            token,
            Err(ApiError::from_response(
                404,
                r#"{"message":"Seller not found with id: 8"}"#,
            )),
        );

        let text = render(|frame| page.view(frame));
        assert!(text.contains("Seller #8 was not found"));
    }

    #[test]
    fn test_delete_success_bumps_refresh() {
        let mut page = ListPage::new(client());
        let token = page.sellers.begin();
        page.sellers.settle(token, Ok(vec![seller(1)]));

        let cmd = page.update(Msg::DeleteSelected);
        assert!(cmd.stream.is_some());

        let refresh_before = page.refresh;
        let _ = page.update(Msg::Deleted(0, Ok(())));
        assert_eq!(page.refresh, refresh_before + 1);
    }
}
