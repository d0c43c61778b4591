//! Buyer pages: list, detail, and the create/edit form.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::api::{ApiClient, ApiError, Buyer, BuyerUpdate, NewBuyer};
use crate::app::{Message, Route};
use crate::command::Command;
use crate::pages::{self, Field, FormMode, FormState};
use crate::subscription::Subscription;
use crate::subscription::http::{
    Mutation, MutationMachine, Query, QueryEvent, QueryMachine, RequestToken,
};

/// Messages handled by the buyer pages.
#[derive(Debug)]
pub enum Msg {
    // List
    ListFetched(QueryEvent<Vec<Buyer>>),
    SelectUp,
    SelectDown,
    OpenSelected,
    EditSelected,
    DeleteSelected,
    Deleted(RequestToken, Result<(), ApiError>),
    // Detail and form prefill
    Fetched(QueryEvent<Buyer>),
    // Form
    FocusNext,
    FocusPrev,
    Input(char),
    Backspace,
    Submit,
    Saved(RequestToken, Result<Buyer, ApiError>),
}

/// The buyer screen currently routed in.
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

/// All buyers, selectable.
pub struct ListPage {
    client: Arc<ApiClient>,
    buyers: QueryMachine<Vec<Buyer>>,
    selected: usize,
    delete: MutationMachine<()>,
    refresh: u32,
}

impl ListPage {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            buyers: QueryMachine::new(),
            selected: 0,
            delete: MutationMachine::new(),
            refresh: 0,
        }
    }

    fn selected_buyer(&self) -> Option<&Buyer> {
        self.buyers.data().and_then(|buyers| buyers.get(self.selected))
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::ListFetched(event) => {
                self.buyers.on_event(event);
                let len = self.buyers.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
                Command::none()
            }
            Msg::SelectUp => {
                self.selected = self.selected.saturating_sub(1);
                Command::none()
            }
            Msg::SelectDown => {
                let len = self.buyers.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
                Command::none()
            }
            Msg::OpenSelected => match self.selected_buyer() {
                Some(buyer) => Command::single(Message::Navigate(Route::BuyerDetail(buyer.id))),
                None => Command::none(),
            },
            Msg::EditSelected => match self.selected_buyer() {
                Some(buyer) => Command::single(Message::Navigate(Route::BuyerEdit(buyer.id))),
                None => Command::none(),
            },
            Msg::DeleteSelected => {
                if self.delete.is_loading() {
                    return Command::none();
                }
                let Some(buyer) = self.selected_buyer() else {
                    return Command::none();
                };
                let id = buyer.id;
                let client = self.client.clone();
                let token = self.delete.begin();
                Mutation::mutate(id, move |id| {
                    Box::pin(async move { client.delete_buyer(id).await })
                })
                .map(move |outcome| Message::Buyers(Msg::Deleted(token, outcome)))
            }
            Msg::Deleted(token, outcome) => {
                if self.delete.settle(token, outcome) && self.delete.is_success() {
                    // Refetch with the row gone
                    self.refresh += 1;
                }
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Up => Command::single(Message::Buyers(Msg::SelectUp)),
            KeyCode::Down => Command::single(Message::Buyers(Msg::SelectDown)),
            KeyCode::Enter => Command::single(Message::Buyers(Msg::OpenSelected)),
            KeyCode::Char('c') => Command::single(Message::Navigate(Route::BuyerCreate)),
            KeyCode::Char('e') => Command::single(Message::Buyers(Msg::EditSelected)),
            KeyCode::Char('d') => Command::single(Message::Buyers(Msg::DeleteSelected)),
            KeyCode::Esc => Command::single(Message::Navigate(Route::Home)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, "Buyers");

        if let Some(buyers) = self.buyers.data() {
            if buyers.is_empty() {
                let empty = Paragraph::new("No buyers yet. Press 'c' to create one.")
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, chrome.content);
            } else {
                let items: Vec<ListItem> = buyers
                    .iter()
                    .enumerate()
                    .map(|(i, buyer)| {
                        let marker = if i == self.selected { ">" } else { " " };
                        let phone = buyer.phone_number.as_deref().unwrap_or("-");
                        ListItem::new(format!(
                            "{marker} {:<5} {:<24} {:<30} {phone}",
                            buyer.id,
                            buyer.full_name(),
                            buyer.email,
                        ))
                    })
                    .collect();
                let title = if self.buyers.is_loading() {
                    "Buyers (refreshing...)"
                } else {
                    "Buyers"
                };
                let list =
                    List::new(items).block(Block::default().borders(Borders::ALL).title(title));
                frame.render_widget(list, chrome.content);
            }
        } else if let Some(error) = self.buyers.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "buyers");
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
            Subscription::new(Query::new("buyers", &self.refresh, move || {
                let client = client.clone();
                Box::pin(async move { client.buyers().await })
            }))
            .map(|event| Message::Buyers(Msg::ListFetched(event))),
        ]
    }
}

/// One buyer, read-only.
pub struct DetailPage {
    client: Arc<ApiClient>,
    id: u64,
    buyer: QueryMachine<Buyer>,
}

impl DetailPage {
    pub fn new(client: Arc<ApiClient>, id: u64) -> Self {
        Self {
            client,
            id,
            buyer: QueryMachine::new(),
        }
    }

    fn update(&mut self, msg: Msg) -> Command<Message> {
        match msg {
            Msg::Fetched(event) => {
                self.buyer.on_event(event);
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_key(&self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Char('e') => Command::single(Message::Navigate(Route::BuyerEdit(self.id))),
            KeyCode::Esc => Command::single(Message::Navigate(Route::BuyerList)),
            KeyCode::Char('q') => Command::single(Message::Quit),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        pages::render_title(frame, chrome.title, &format!("Buyer #{}", self.id));

        if let Some(buyer) = self.buyer.data() {
            let text = format!(
                "Name:             {}\n\
                 Email:            {}\n\
                 Active:           {}\n\
                 Shipping address: {}\n\
                 Billing address:  {}\n\
                 Phone number:     {}\n\
                 Created:          {}\n\
                 Updated:          {}",
                buyer.full_name(),
                buyer.email,
                if buyer.active { "yes" } else { "no" },
                buyer.shipping_address.as_deref().unwrap_or("-"),
                buyer.billing_address.as_deref().unwrap_or("-"),
                buyer.phone_number.as_deref().unwrap_or("-"),
                pages::format_date(&buyer.created_at),
                pages::format_date(&buyer.updated_at),
            );
            let body = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
            frame.render_widget(body, chrome.content);
        } else if self.buyer.is_not_found() {
            let text = format!(
                "Buyer #{} was not found.\n\nIt may have been deleted. Press Esc to return to the buyer list.",
                self.id
            );
            let body = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Not found"));
            frame.render_widget(body, chrome.content);
        } else if let Some(error) = self.buyer.error() {
            pages::render_error(frame, chrome.content, error, "Press Esc to go back");
        } else {
            pages::render_loading(frame, chrome.content, "buyer");
        }

        pages::render_footer(frame, chrome.footer, "e: edit, Esc: back, q: quit");
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let client = self.client.clone();
        let id = self.id;
        vec![
            Subscription::new(Query::new("buyer", &id, move || {
                let client = client.clone();
                Box::pin(async move { client.buyer(id).await })
            }))
            .map(|event| Message::Buyers(Msg::Fetched(event))),
        ]
    }
}

const FIRST_NAME: &str = "First name";
const LAST_NAME: &str = "Last name";
const EMAIL: &str = "Email";
const PASSWORD: &str = "Password";
const SHIPPING_ADDRESS: &str = "Shipping address";
const BILLING_ADDRESS: &str = "Billing address";
const PHONE_NUMBER: &str = "Phone number";

/// Create or edit a buyer.
///
/// Create asks for email and password; edit does not, since identity and
/// credentials are not editable through the console.
pub struct FormPage {
    client: Arc<ApiClient>,
    mode: FormMode,
    form: FormState,
    prefill: QueryMachine<Buyer>,
    prefilled: bool,
    save: MutationMachine<Buyer>,
    validation: Option<String>,
}

impl FormPage {
    pub fn new_create(client: Arc<ApiClient>) -> Self {
        let form = FormState::new(vec![
            Field::required(FIRST_NAME),
            Field::required(LAST_NAME),
            Field::required(EMAIL),
            Field::secret(PASSWORD),
            Field::optional(SHIPPING_ADDRESS),
            Field::optional(BILLING_ADDRESS),
            Field::optional(PHONE_NUMBER),
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
            Field::optional(SHIPPING_ADDRESS),
            Field::optional(BILLING_ADDRESS),
            Field::optional(PHONE_NUMBER),
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
            FormMode::Create => Route::BuyerList,
            FormMode::Edit(id) => Route::BuyerDetail(id),
        }
    }

    fn apply_prefill(&mut self) {
        if self.prefilled {
            return;
        }
        let Some(buyer) = self.prefill.data() else {
            return;
        };
        let buyer = buyer.clone();
        self.form.set(FIRST_NAME, &buyer.first_name);
        self.form.set(LAST_NAME, &buyer.last_name);
        self.form
            .set(SHIPPING_ADDRESS, buyer.shipping_address.as_deref().unwrap_or(""));
        self.form
            .set(BILLING_ADDRESS, buyer.billing_address.as_deref().unwrap_or(""));
        self.form
            .set(PHONE_NUMBER, buyer.phone_number.as_deref().unwrap_or(""));
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
                let payload = NewBuyer {
                    first_name: self.form.value_of(FIRST_NAME),
                    last_name: self.form.value_of(LAST_NAME),
                    email: self.form.value_of(EMAIL),
                    password: self.form.value_of(PASSWORD),
                    shipping_address: self.form.optional_of(SHIPPING_ADDRESS),
                    billing_address: self.form.optional_of(BILLING_ADDRESS),
                    phone_number: self.form.optional_of(PHONE_NUMBER),
                };
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.create_buyer(&payload).await })
                })
                .map(move |outcome| Message::Buyers(Msg::Saved(token, outcome)))
            }
            FormMode::Edit(id) => {
                let payload = BuyerUpdate {
                    first_name: self.form.value_of(FIRST_NAME),
                    last_name: self.form.value_of(LAST_NAME),
                    shipping_address: self.form.optional_of(SHIPPING_ADDRESS),
                    billing_address: self.form.optional_of(BILLING_ADDRESS),
                    phone_number: self.form.optional_of(PHONE_NUMBER),
                };
                Mutation::mutate(payload, move |payload| {
                    Box::pin(async move { client.update_buyer(id, &payload).await })
                })
                .map(move |outcome| Message::Buyers(Msg::Saved(token, outcome)))
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
            KeyCode::Enter => Command::single(Message::Buyers(Msg::Submit)),
            KeyCode::Tab | KeyCode::Down => Command::single(Message::Buyers(Msg::FocusNext)),
            KeyCode::BackTab | KeyCode::Up => Command::single(Message::Buyers(Msg::FocusPrev)),
            KeyCode::Backspace => Command::single(Message::Buyers(Msg::Backspace)),
            KeyCode::Char(c) => Command::single(Message::Buyers(Msg::Input(c))),
            _ => Command::none(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let chrome = pages::chrome(frame.area());
        let title = match self.mode {
            FormMode::Create => "New Buyer".to_string(),
            FormMode::Edit(id) => format!("Edit Buyer #{id}"),
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
                    Subscription::new(Query::new("buyer", &id, move || {
                        let client = client.clone();
                        Box::pin(async move { client.buyer(id).await })
                    }))
                    .map(|event| Message::Buyers(Msg::Fetched(event))),
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

    fn render<F: Fn(&mut Frame)>(view: F) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| view(frame)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_empty_list_renders_create_hint() {
        let mut page = ListPage::new(client());
        let token = page.buyers.begin();
        page.buyers.settle(token, Ok(vec![]));

        let text = render(|frame| page.view(frame));
        assert!(text.contains("No buyers yet"));
        assert!(text.contains("'c'"), "empty state should point at the create form");
    }

    #[test]
    fn test_list_renders_rows_and_retains_them_while_refreshing() {
        let mut page = ListPage::new(client());
        let token = page.buyers.begin();
        page.buyers.settle(token, Ok(vec![buyer(1)]));

        let text = render(|frame| page.view(frame));
        assert!(text.contains("Ada Lovelace"));

        // Refetch in flight: rows stay visible.
        page.buyers.begin();
        let text = render(|frame| page.view(frame));
        assert!(text.contains("Ada Lovelace"));
        assert!(text.contains("refreshing"));
    }

    #[test]
    fn test_detail_not_found_is_distinct_from_error() {
        let mut page = DetailPage::new(client(), 42);
        let token = page.buyer.begin();
        page.buyer.settle(
            token,
            Err(ApiError::from_response(
                404,
                r#"{"message":"Buyer not found with id: 42"}"#,
            )),
        );

        let text = render(|frame| page.view(frame));
        assert!(text.contains("Buyer #42 was not found"));
        assert!(text.contains("Not found"));
        assert!(!text.contains("Error"), "404 must not render the generic banner");
    }

    #[test]
    fn test_detail_generic_error_renders_banner() {
        let mut page = DetailPage::new(client(), 42);
        let token = page.buyer.begin();
        page.buyer.settle(
            token,
            Err(ApiError::from_response(
                500,
                r#"{"message":"database unavailable"}"#,
            )),
        );

        let text = render(|frame| page.view(frame));
        assert!(text.contains("Error"));
        assert!(text.contains("database unavailable"));
    }

    #[test]
    fn test_create_submit_requires_fields_and_issues_no_command() {
        let mut page = FormPage::new_create(client());

        let cmd = page.update(Msg::Submit);
        assert!(cmd.stream.is_none(), "validation failure must not start a request");
        assert_eq!(page.validation.as_deref(), Some("First name is required"));
        assert!(!page.save.is_loading());
    }

    #[test]
    fn test_create_submit_with_all_required_fields_starts_mutation() {
        let mut page = FormPage::new_create(client());
        page.form.set(FIRST_NAME, "Ada");
        page.form.set(LAST_NAME, "Lovelace");
        page.form.set(EMAIL, "ada@example.com");
        page.form.set(PASSWORD, "hunter2");

        let cmd = page.update(Msg::Submit);
        assert!(cmd.stream.is_some());
        assert!(page.save.is_loading());
        assert!(page.validation.is_none());
    }

    #[test]
    fn test_saved_success_navigates_back_to_list() {
        let mut page = FormPage::new_create(client());
        page.form.set(FIRST_NAME, "Ada");
        page.form.set(LAST_NAME, "Lovelace");
        page.form.set(EMAIL, "ada@example.com");
        page.form.set(PASSWORD, "hunter2");
        let _ = page.update(Msg::Submit);

        // The begin above is token 0.
        let cmd = page.update(Msg::Saved(0, Ok(buyer(9))));
        assert!(cmd.stream.is_some(), "success should navigate");
        assert!(page.save.is_success());
    }

    #[test]
    fn test_edit_form_prefills_once() {
        let mut page = FormPage::new_edit(client(), 1);
        let token = page.prefill.begin();
        page.prefill.settle(token, Ok(buyer(1)));
        page.apply_prefill();

        assert_eq!(page.form.value_of(FIRST_NAME), "Ada");
        assert_eq!(page.form.value_of(SHIPPING_ADDRESS), "12 Analytical Way");

        // User edits; a second settle must not clobber the edit.
        page.form.set(FIRST_NAME, "Augusta");
        let token = page.prefill.begin();
        page.prefill.settle(token, Ok(buyer(1)));
        page.apply_prefill();
        assert_eq!(page.form.value_of(FIRST_NAME), "Augusta");
    }

    #[test]
    fn test_edit_form_has_no_credential_fields() {
        let page = FormPage::new_edit(client(), 1);
        assert!(page.form.fields.iter().all(|field| field.label != EMAIL));
        assert!(page.form.fields.iter().all(|field| field.label != PASSWORD));
    }
}
