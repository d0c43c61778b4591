//! Pages of the admin console.
//!
//! Each entity gets a list page, a detail page and a form page (create and
//! edit are the same form in two modes). Pages are plain structs owning
//! their request-state machines; they expose `update`, `on_key`, `view` and
//! `subscriptions`, and the root [`App`](crate::app::App) delegates to
//! whichever page the active route names.
//!
//! Shared here: the keyboard-driven form state and the small rendering
//! helpers every page uses (title bar, footers, error banner).

pub mod buyers;
pub mod orders;
pub mod products;
pub mod sellers;

use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::api::ApiError;

/// Whether a form creates a new resource or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(u64),
}

/// One keyboard-editable field of a form.
#[derive(Debug, Clone)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
    pub required: bool,
    pub secret: bool,
}

impl Field {
    pub fn required(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            required: true,
            secret: false,
        }
    }

    pub fn optional(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            required: false,
            secret: false,
        }
    }

    pub fn secret(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            required: true,
            secret: true,
        }
    }
}

/// Focus-tracking state for a keyboard-edited form.
#[derive(Debug, Clone)]
pub struct FormState {
    pub fields: Vec<Field>,
    pub focus: usize,
}

impl FormState {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, focus: 0 }
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = self.focus.checked_sub(1).unwrap_or(self.fields.len() - 1);
        }
    }

    pub fn input(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.pop();
        }
    }

    /// The trimmed value of a field, empty if the label is unknown.
    #[must_use]
    pub fn value_of(&self, label: &str) -> String {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| field.value.trim().to_string())
            .unwrap_or_default()
    }

    /// The trimmed value of an optional field, `None` when left blank.
    #[must_use]
    pub fn optional_of(&self, label: &str) -> Option<String> {
        let value = self.value_of(label);
        if value.is_empty() { None } else { Some(value) }
    }

    /// Sets a field's value, for prefilling edit forms.
    pub fn set(&mut self, label: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|field| field.label == label) {
            field.value = value.to_string();
        }
    }

    /// The label of the first required field left blank, if any.
    #[must_use]
    pub fn first_missing_required(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|field| field.required && field.value.trim().is_empty())
            .map(|field| field.label)
    }
}

/// Standard page layout: title bar, content, footer line.
pub(crate) struct Chrome {
    pub title: Rect,
    pub content: Rect,
    pub footer: Rect,
}

pub(crate) fn chrome(area: Rect) -> Chrome {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(area);

    Chrome {
        title: chunks[0],
        content: chunks[1],
        footer: chunks[2],
    }
}

pub(crate) fn render_title(frame: &mut Frame, area: Rect, text: &str) {
    let title = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, area);
}

pub(crate) fn render_footer(frame: &mut Frame, area: Rect, text: &str) {
    let footer = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

/// Inline error banner; pages park it in the footer slot so the content
/// stays visible.
pub(crate) fn render_error_footer(frame: &mut Frame, area: Rect, message: &str) {
    let footer = Paragraph::new(message)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Error"));
    frame.render_widget(footer, area);
}

/// Full-content error banner for pages with nothing else to show.
pub(crate) fn render_error(frame: &mut Frame, area: Rect, error: &ApiError, back_hint: &str) {
    let text = format!("{}\n\n{back_hint}", error.message);
    let banner = Paragraph::new(text)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Error"));
    frame.render_widget(banner, area);
}

pub(crate) fn render_loading(frame: &mut Frame, area: Rect, what: &str) {
    let loading = Paragraph::new(format!("Loading {what}..."))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(loading, area);
}

/// Renders a form as a focused field list.
pub(crate) fn render_form(frame: &mut Frame, area: Rect, form: &FormState) {
    let mut lines = Vec::with_capacity(form.fields.len());
    for (i, field) in form.fields.iter().enumerate() {
        let marker = if i == form.focus { ">" } else { " " };
        let value = if field.secret {
            "•".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let required = if field.required { " *" } else { "" };
        lines.push(format!("{marker} {}{required}: {value}", field.label));
    }

    let body = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, area);
}

pub(crate) fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

/// Flattens a test backend buffer into a string for containment assertions.
#[cfg(test)]
pub(crate) fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
    buffer.content.iter().map(|cell| cell.symbol()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormState {
        FormState::new(vec![
            Field::required("First name"),
            Field::secret("Password"),
            Field::optional("Phone number"),
        ])
    }

    #[test]
    fn test_focus_wraps_both_ways() {
        let mut form = form();
        assert_eq!(form.focus, 0);

        form.focus_prev();
        assert_eq!(form.focus, 2);

        form.focus_next();
        assert_eq!(form.focus, 0);
    }

    #[test]
    fn test_input_edits_focused_field() {
        let mut form = form();
        form.input('A');
        form.input('d');
        form.input('a');
        assert_eq!(form.value_of("First name"), "Ada");

        form.backspace();
        assert_eq!(form.value_of("First name"), "Ad");
    }

    #[test]
    fn test_first_missing_required_skips_optional() {
        let mut form = form();
        assert_eq!(form.first_missing_required(), Some("First name"));

        form.set("First name", "Ada");
        assert_eq!(form.first_missing_required(), Some("Password"));

        form.set("Password", "hunter2");
        assert_eq!(form.first_missing_required(), None);
    }

    #[test]
    fn test_optional_of_treats_blank_as_absent() {
        let mut form = form();
        assert_eq!(form.optional_of("Phone number"), None);

        form.set("Phone number", "  ");
        assert_eq!(form.optional_of("Phone number"), None);

        form.set("Phone number", "555-0199");
        assert_eq!(form.optional_of("Phone number"), Some("555-0199".to_string()));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(59.979_999), "$59.98");
        assert_eq!(format_price(5.0), "$5.00");
    }
}
