//! Date entry and format conversion.
//!
//! Formats use the `YYYY`/`YY`/`MM`/`DD`/`M`/`D` tokens that appear in
//! command payloads; anything else is a literal separator.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};
use tracing::debug;

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::FillCommand;
use crate::error::AutofillError;

/// Layouts tried after the target format when reading an input value.
const FALLBACK_LAYOUTS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    Month2,
    Day2,
    Month,
    Day,
    Literal(char),
}

fn tokenize(format: &str) -> Vec<Token> {
    const PATTERNS: [(&str, Token); 6] = [
        ("YYYY", Token::Year4),
        ("YY", Token::Year2),
        ("MM", Token::Month2),
        ("DD", Token::Day2),
        ("M", Token::Month),
        ("D", Token::Day),
    ];

    let mut tokens = Vec::new();
    let mut rest = format;
    'outer: while !rest.is_empty() {
        for (pattern, token) in PATTERNS {
            if let Some(tail) = rest.strip_prefix(pattern) {
                tokens.push(token);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            tokens.push(Token::Literal(c));
        }
        rest = chars.as_str();
    }
    tokens
}

fn chrono_layout(format: &str) -> String {
    tokenize(format)
        .into_iter()
        .map(|t| match t {
            Token::Year4 => "%Y".to_string(),
            Token::Year2 => "%y".to_string(),
            Token::Month2 | Token::Month => "%m".to_string(),
            Token::Day2 | Token::Day => "%d".to_string(),
            Token::Literal('%') => "%%".to_string(),
            Token::Literal(c) => c.to_string(),
        })
        .collect()
}

/// Render `date` in a token format such as `MM/DD/YYYY`.
pub fn format_date(date: NaiveDate, format: &str) -> String {
    tokenize(format)
        .into_iter()
        .map(|t| match t {
            Token::Year4 => format!("{:04}", date.year()),
            Token::Year2 => format!("{:02}", date.year().rem_euclid(100)),
            Token::Month2 => format!("{:02}", date.month()),
            Token::Day2 => format!("{:02}", date.day()),
            Token::Month => date.month().to_string(),
            Token::Day => date.day().to_string(),
            Token::Literal(c) => c.to_string(),
        })
        .collect()
}

/// Read a date, trying `format` first and then the common layouts.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let preferred = chrono_layout(format);
    std::iter::once(preferred.as_str())
        .chain(FALLBACK_LAYOUTS)
        .find_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
}

/// Re-render `value` in `format`; unparseable input is returned unchanged.
pub fn convert_date(value: &str, format: &str) -> String {
    match parse_date(value, format) {
        Some(date) => format_date(date, format),
        None => value.to_string(),
    }
}

/// `enter_date`: native date pickers get ISO through the value setter,
/// text fields get the formatted date typed in.
pub struct EnterDateHandler;

#[async_trait]
impl ActionHandler for EnterDateHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let raw = command.value_text();
        let parsed = parse_date(&raw, &command.date_format);
        let state = ctx.driver.element_state(&el).await?;

        if state.input_type.as_deref() == Some("date") {
            let iso = parsed
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| raw.clone());
            ctx.driver.set_value_js(&el, &iso).await?;
            ctx.trigger_events(&el).await;
            return Ok(json!(iso));
        }

        let formatted = match parsed {
            Some(date) => format_date(date, &command.date_format),
            None => {
                debug!(value = %raw, format = %command.date_format, "Unrecognized date, entering as given");
                raw.clone()
            }
        };

        if command.clear_first && !ctx.clear_field(&el).await {
            debug!(element = %el, "Date field did not clear completely");
        }
        ctx.driver.send_keys(&el, &formatted).await?;
        ctx.trigger_events(&el).await;
        Ok(json!(formatted))
    }
}
