//! Page driver abstraction.
//!
//! The autofill engine never talks CDP directly. It programs against
//! [`PageDriver`], which [`CdpDriver`] implements over a live Chrome page
//! and `FakePage` (feature `testing`) implements in memory.

mod cdp_driver;
mod scripts;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cdp::CdpError;

pub use cdp_driver::CdpDriver;

/// Opaque handle to a live element.
///
/// Handles go stale when the element leaves the document or the page
/// navigates; every operation on a stale handle fails with
/// [`DriverError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "query", rename_all = "lowercase")]
pub enum By {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
}

impl By {
    pub fn css(selector: impl Into<String>) -> Self {
        By::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        By::XPath(expr.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            By::Css(_) => "css",
            By::XPath(_) => "xpath",
            By::Id(_) => "id",
            By::Name(_) => "name",
        }
    }

    pub fn query(&self) -> &str {
        match self {
            By::Css(q) | By::XPath(q) | By::Id(q) | By::Name(q) => q,
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind(), self.query())
    }
}

/// Argument to an injected script; elements arrive as DOM nodes.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Value(Value),
    Element(ElementRef),
}

impl From<Value> for ScriptArg {
    fn from(v: Value) -> Self {
        ScriptArg::Value(v)
    }
}

impl From<&ElementRef> for ScriptArg {
    fn from(el: &ElementRef) -> Self {
        ScriptArg::Element(el.clone())
    }
}

/// Snapshot of the properties handlers decide on, read in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    pub connected: bool,
    pub displayed: bool,
    pub enabled: bool,
    pub read_only: bool,
    pub tag: String,
    pub input_type: Option<String>,
    pub value: Option<String>,
    pub text: String,
    /// Native `checked` for checkbox/radio inputs.
    pub checked: Option<bool>,
    /// Native `selected` for `<option>`.
    pub selected: Option<bool>,
}

/// One `<option>` of a native select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
    pub index: usize,
    pub selected: bool,
}

/// Low-level driver failures.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Browser session closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<CdpError> for DriverError {
    fn from(e: CdpError) -> Self {
        if e.is_stale_reference() {
            return DriverError::StaleElement(e.to_string());
        }
        match e {
            CdpError::JavaScript(msg) => DriverError::Script(msg),
            CdpError::NavigationFailed(msg) => DriverError::Navigation(msg),
            CdpError::Timeout(msg) => DriverError::Timeout(msg),
            CdpError::SessionClosed | CdpError::WebSocket(_) => DriverError::Closed,
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

/// Everything the autofill layer needs from a browser page.
///
/// Script-injection operations (`set_value_js`, `set_checked_js`,
/// `js_click`, `dispatch_event`) are the low-level fallback path: they
/// mutate the control directly and fire synthetic events so framework
/// listeners observe the change.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
    async fn current_url(&self) -> Result<String, DriverError>;
    async fn title(&self) -> Result<String, DriverError>;
    async fn page_source(&self) -> Result<String, DriverError>;

    /// Run a function body (Selenium style: `arguments[i]`, `return ...`).
    async fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value, DriverError>;

    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>, DriverError>;
    async fn find_child_elements(
        &self,
        parent: &ElementRef,
        by: &By,
    ) -> Result<Vec<ElementRef>, DriverError>;

    async fn element_state(&self, el: &ElementRef) -> Result<ElementState, DriverError>;
    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, DriverError>;

    async fn click(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn double_click(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn context_click(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn hover(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn drag_and_drop(&self, source: &ElementRef, target: &ElementRef) -> Result<(), DriverError>;

    /// Native clear: empty the value and fire input/change.
    async fn clear(&self, el: &ElementRef) -> Result<(), DriverError>;
    /// Focus `el` and type `text` at the caret.
    async fn send_keys(&self, el: &ElementRef, text: &str) -> Result<(), DriverError>;
    /// Key transitions go to whatever element has focus.
    async fn key_down(&self, key: &str) -> Result<(), DriverError>;
    async fn key_up(&self, key: &str) -> Result<(), DriverError>;

    async fn focus(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn blur(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn scroll_into_view(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<(), DriverError>;

    async fn set_files(&self, el: &ElementRef, paths: &[PathBuf]) -> Result<(), DriverError>;

    async fn select_options(&self, el: &ElementRef) -> Result<Vec<SelectOption>, DriverError>;
    /// Native option toggle on a `<select>`, firing change.
    async fn set_option_selected(
        &self,
        el: &ElementRef,
        index: usize,
        selected: bool,
    ) -> Result<(), DriverError>;

    /// Set the value through the native setter and fire input/change.
    /// Returns the value read back afterwards.
    async fn set_value_js(&self, el: &ElementRef, value: &str) -> Result<String, DriverError>;
    async fn set_checked_js(&self, el: &ElementRef, checked: bool) -> Result<(), DriverError>;
    async fn js_click(&self, el: &ElementRef) -> Result<(), DriverError>;
    async fn dispatch_event(&self, el: &ElementRef, event: &str) -> Result<(), DriverError>;

    /// Enter an iframe (`Some`) or return to the top document (`None`).
    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> Result<(), DriverError>;
    async fn switch_to_parent_frame(&self) -> Result<(), DriverError>;

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.key_down(key).await?;
        self.key_up(key).await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        self.execute_script(&format!("return ({});", expression), &[])
            .await
    }

    async fn find_element(&self, by: &By) -> Result<ElementRef, DriverError> {
        self.find_elements(by)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NoSuchElement(by.to_string()))
    }

    async fn is_displayed(&self, el: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element_state(el).await?.displayed)
    }

    async fn value(&self, el: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element_state(el).await?.value.unwrap_or_default())
    }

    async fn text(&self, el: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element_state(el).await?.text)
    }

    /// Cheap liveness probe used before resuming a paused job.
    async fn is_alive(&self) -> bool {
        self.current_url().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_display() {
        assert_eq!(By::css("#email").to_string(), "css=#email");
        assert_eq!(By::Name("first".into()).to_string(), "name=first");
    }

    #[test]
    fn test_by_serde_shape() {
        let json = serde_json::to_value(By::xpath("//button")).unwrap();
        assert_eq!(json, serde_json::json!({"by": "xpath", "query": "//button"}));
    }

    #[test]
    fn test_stale_cdp_error_maps_to_stale_element() {
        let err = DriverError::from(CdpError::Protocol {
            code: -32000,
            message: "Could not find object with given id".to_string(),
        });
        assert!(matches!(err, DriverError::StaleElement(_)));
    }

    #[test]
    fn test_closed_socket_maps_to_closed() {
        assert!(matches!(DriverError::from(CdpError::SessionClosed), DriverError::Closed));
        assert!(matches!(
            DriverError::from(CdpError::WebSocket("reset".into())),
            DriverError::Closed
        ));
    }

    #[test]
    fn test_element_state_camel_case() {
        let state: ElementState = serde_json::from_value(serde_json::json!({
            "connected": true,
            "displayed": true,
            "enabled": true,
            "readOnly": false,
            "tag": "input",
            "inputType": "checkbox",
            "value": "on",
            "text": "",
            "checked": true,
            "selected": null
        }))
        .unwrap();
        assert_eq!(state.checked, Some(true));
        assert_eq!(state.input_type.as_deref(), Some("checkbox"));
    }
}
