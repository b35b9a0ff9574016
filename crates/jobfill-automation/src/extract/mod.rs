//! Page snapshots: what is on the page, in a shape the oracle can read.

mod filter;
mod script;

pub use filter::{MAX_HTML_CHARS, filter_html, truncate_chars};
pub use script::EXTRACT_MARKER;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobfill_browser::{DriverError, PageDriver};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use script::EXTRACT_SCRIPT;

pub const MAX_FORMS: usize = 10;
pub const MAX_INPUTS: usize = 100;
pub const MAX_BUTTONS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub text: String,
}

/// One form control as seen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InputDescriptor {
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub id: String,
    pub name: String,
    pub label: String,
    pub placeholder: String,
    #[serde(rename = "aria-label")]
    pub aria_label: String,
    #[serde(rename = "data-automation-id")]
    pub automation_id: String,
    pub required: bool,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDescriptor>,
}

impl InputDescriptor {
    /// Best human-readable name: label, then aria-label, name, id.
    pub fn display_name(&self) -> &str {
        [&self.label, &self.aria_label, &self.name, &self.id]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// What a button probably does, from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonPurpose {
    Next,
    Submit,
    Back,
    Cancel,
    #[default]
    Unknown,
}

impl ButtonPurpose {
    pub fn classify(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["next", "continue", "proceed"]) {
            ButtonPurpose::Next
        } else if has(&["submit", "apply", "send application", "finish"]) {
            ButtonPurpose::Submit
        } else if has(&["back", "previous"]) {
            ButtonPurpose::Back
        } else if has(&["cancel"]) {
            ButtonPurpose::Cancel
        } else {
            ButtonPurpose::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ButtonDescriptor {
    pub tag: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub button_type: String,
    pub text: String,
    #[serde(rename = "aria-label")]
    pub aria_label: String,
    #[serde(rename = "data-automation-id")]
    pub automation_id: String,
    #[serde(rename = "data-testid")]
    pub test_id: String,
    pub purpose: ButtonPurpose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FormDescriptor {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub action: String,
    pub method: String,
}

/// Structural view of one loaded page. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub filtered_html: String,
    pub inputs: Vec<InputDescriptor>,
    pub buttons: Vec<ButtonDescriptor>,
    pub forms: Vec<FormDescriptor>,
    pub timestamp: DateTime<Utc>,
    /// Position in the job's history; set when the snapshot is recorded.
    #[serde(default)]
    pub page_number: usize,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            filtered_html: String::new(),
            inputs: Vec::new(),
            buttons: Vec::new(),
            forms: Vec::new(),
            timestamp: Utc::now(),
            page_number: 0,
        }
    }

    pub fn buttons_for(&self, purpose: ButtonPurpose) -> impl Iterator<Item = &ButtonDescriptor> {
        self.buttons.iter().filter(move |b| b.purpose == purpose)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawExtract {
    url: String,
    title: String,
    forms: Vec<FormDescriptor>,
    inputs: Vec<InputDescriptor>,
    buttons: Vec<ButtonDescriptor>,
}

/// Captures [`PageSnapshot`]s from a live page.
pub struct PageExtractor {
    driver: Arc<dyn PageDriver>,
}

impl PageExtractor {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }

    /// Snapshot the current page.
    ///
    /// Only a dead page is an error. A failing structure query leaves the
    /// control lists empty and the HTML still gets captured.
    pub async fn extract(&self) -> Result<PageSnapshot, DriverError> {
        let url = self.driver.current_url().await?;
        let title = self.driver.title().await.unwrap_or_default();

        let raw = match self.driver.execute_script(EXTRACT_SCRIPT, &[]).await {
            Ok(value) => serde_json::from_value::<RawExtract>(value).unwrap_or_default(),
            Err(DriverError::Closed) => return Err(DriverError::Closed),
            Err(e) => {
                warn!(url = %url, "Structure query failed: {}", e);
                RawExtract::default()
            }
        };

        let html = match self.driver.page_source().await {
            Ok(html) => filter_html(&html),
            Err(DriverError::Closed) => return Err(DriverError::Closed),
            Err(e) => {
                warn!(url = %url, "Could not read page source: {}", e);
                String::new()
            }
        };

        let mut buttons = raw.buttons;
        buttons.truncate(MAX_BUTTONS);
        for button in buttons.iter_mut() {
            button.purpose = ButtonPurpose::classify(&button.text);
        }
        let mut inputs = raw.inputs;
        inputs.truncate(MAX_INPUTS);
        let mut forms = raw.forms;
        forms.truncate(MAX_FORMS);

        let snapshot = PageSnapshot {
            url: if raw.url.is_empty() { url } else { raw.url },
            title: if raw.title.is_empty() { title } else { raw.title },
            filtered_html: html,
            inputs,
            buttons,
            forms,
            timestamp: Utc::now(),
            page_number: 0,
        };
        debug!(
            url = %snapshot.url,
            inputs = snapshot.inputs.len(),
            buttons = snapshot.buttons.len(),
            forms = snapshot.forms.len(),
            html_chars = snapshot.filtered_html.len(),
            "Page extracted"
        );
        Ok(snapshot)
    }
}
