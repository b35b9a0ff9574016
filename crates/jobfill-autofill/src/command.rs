//! Command and result model.
//!
//! A [`FillCommand`] describes one UI action; executing it yields a
//! [`FillResult`]. Commands arrive mostly as JSON from the decision
//! oracle, so every field except `action` has a serde default.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AutofillError;

/// Kind of UI action.
///
/// Kinds outside the built-in vocabulary deserialize to
/// [`ActionType::Custom`]; they only dispatch when a handler was registered
/// for them, otherwise dispatch fails with "Unknown action type".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    TypeText,
    TypeNumber,
    SelectOption,
    SelectMultiple,
    SelectAutocomplete,
    Check,
    SelectRadio,
    UploadFile,
    EnterDate,
    Click,
    DoubleClick,
    RightClick,
    Hover,
    Clear,
    Focus,
    Blur,
    ScrollTo,
    ScrollBy,
    Wait,
    PressKey,
    DragDrop,
    SetValue,
    ExecuteJs,
    SwitchIframe,
    SwitchDefault,
    Custom(String),
}

impl ActionType {
    /// Every built-in kind, in registry order.
    pub const BUILTIN: [ActionType; 25] = [
        ActionType::TypeText,
        ActionType::TypeNumber,
        ActionType::SelectOption,
        ActionType::SelectMultiple,
        ActionType::SelectAutocomplete,
        ActionType::Check,
        ActionType::SelectRadio,
        ActionType::UploadFile,
        ActionType::EnterDate,
        ActionType::Click,
        ActionType::DoubleClick,
        ActionType::RightClick,
        ActionType::Hover,
        ActionType::Clear,
        ActionType::Focus,
        ActionType::Blur,
        ActionType::ScrollTo,
        ActionType::ScrollBy,
        ActionType::Wait,
        ActionType::PressKey,
        ActionType::DragDrop,
        ActionType::SetValue,
        ActionType::ExecuteJs,
        ActionType::SwitchIframe,
        ActionType::SwitchDefault,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::TypeText => "type_text",
            ActionType::TypeNumber => "type_number",
            ActionType::SelectOption => "select_option",
            ActionType::SelectMultiple => "select_multiple",
            ActionType::SelectAutocomplete => "select_autocomplete",
            ActionType::Check => "check",
            ActionType::SelectRadio => "select_radio",
            ActionType::UploadFile => "upload_file",
            ActionType::EnterDate => "enter_date",
            ActionType::Click => "click",
            ActionType::DoubleClick => "double_click",
            ActionType::RightClick => "right_click",
            ActionType::Hover => "hover",
            ActionType::Clear => "clear",
            ActionType::Focus => "focus",
            ActionType::Blur => "blur",
            ActionType::ScrollTo => "scroll_to",
            ActionType::ScrollBy => "scroll_by",
            ActionType::Wait => "wait",
            ActionType::PressKey => "press_key",
            ActionType::DragDrop => "drag_drop",
            ActionType::SetValue => "set_value",
            ActionType::ExecuteJs => "execute_js",
            ActionType::SwitchIframe => "switch_iframe",
            ActionType::SwitchDefault => "switch_default",
            ActionType::Custom(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, ActionType::Custom(_))
    }

    /// Actions that operate on a located element and need a selector.
    fn needs_selector(&self) -> bool {
        !matches!(
            self,
            ActionType::Wait
                | ActionType::ScrollBy
                | ActionType::PressKey
                | ActionType::ExecuteJs
                | ActionType::SwitchDefault
                | ActionType::SelectRadio
                | ActionType::Custom(_)
        )
    }
}

impl From<&str> for ActionType {
    fn from(s: &str) -> Self {
        ActionType::BUILTIN
            .iter()
            .find(|a| a.as_str() == s)
            .cloned()
            .unwrap_or_else(|| ActionType::Custom(s.to_string()))
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        ActionType::from(s.as_str())
    }
}

impl From<ActionType> for String {
    fn from(a: ActionType) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `selector` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    #[default]
    Css,
    Xpath,
    Id,
    Name,
}

impl fmt::Display for SelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectorType::Css => "css",
            SelectorType::Xpath => "xpath",
            SelectorType::Id => "id",
            SelectorType::Name => "name",
        })
    }
}

/// Preferred matching for native `<select>` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectBy {
    #[default]
    Text,
    Value,
    Index,
}

/// Condition for selector-based waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitCondition {
    #[default]
    Visible,
    Hidden,
    Clickable,
    Present,
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitCondition::Visible => "visible",
            WaitCondition::Hidden => "hidden",
            WaitCondition::Clickable => "clickable",
            WaitCondition::Present => "present",
        })
    }
}

/// One requested UI action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillCommand {
    pub action: ActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default)]
    pub selector_type: SelectorType,

    /// String, number, bool, list or object depending on the action.
    #[serde(default)]
    pub value: Value,

    #[serde(default = "default_true")]
    pub clear_first: bool,

    /// Per-character typing delay; 0 types the whole string at once.
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default)]
    pub select_by: SelectBy,

    #[serde(default = "default_true")]
    pub checked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_paths: Vec<String>,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub wait_after_ms: u64,

    #[serde(default)]
    pub double_click: bool,

    /// Fixed sleep for `wait`.
    #[serde(default)]
    pub time_ms: u64,

    #[serde(default)]
    pub condition: WaitCondition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Radio group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Element wait budget; the engine's configured default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Action-specific extensions (`target`, `script`, `field_name`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_date_format() -> String {
    "YYYY-MM-DD".to_string()
}

impl FillCommand {
    pub fn new(action: impl Into<ActionType>) -> Self {
        Self {
            action: action.into(),
            selector: None,
            selector_type: SelectorType::Css,
            value: Value::Null,
            clear_first: true,
            delay_ms: 0,
            select_by: SelectBy::Text,
            checked: true,
            file_path: None,
            file_paths: Vec::new(),
            date_format: default_date_format(),
            wait_after_ms: 0,
            double_click: false,
            time_ms: 0,
            condition: WaitCondition::Visible,
            key: None,
            name: None,
            timeout_ms: None,
            options: Map::new(),
        }
    }

    pub fn click(selector: &str) -> Self {
        Self::new(ActionType::Click).with_selector(selector)
    }

    pub fn type_text(selector: &str, value: &str) -> Self {
        Self::new(ActionType::TypeText)
            .with_selector(selector)
            .with_value(value)
    }

    pub fn press_key(key: &str) -> Self {
        Self::new(ActionType::PressKey).with_key(key)
    }

    pub fn sleep(time_ms: u64) -> Self {
        let mut cmd = Self::new(ActionType::Wait);
        cmd.time_ms = time_ms;
        cmd
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    pub fn with_selector_type(mut self, selector_type: SelectorType) -> Self {
        self.selector_type = selector_type;
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_clear_first(mut self, clear_first: bool) -> Self {
        self.clear_first = clear_first;
        self
    }

    pub fn with_select_by(mut self, select_by: SelectBy) -> Self {
        self.select_by = select_by;
        self
    }

    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn with_file_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_condition(mut self, condition: WaitCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_wait_after(mut self, wait_after_ms: u64) -> Self {
        self.wait_after_ms = wait_after_ms;
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }

    /// Human label of the field this command fills, when the oracle gave one.
    pub fn field_name(&self) -> Option<&str> {
        self.option_str("field_name")
    }

    /// Selector or an empty string, for messages.
    pub fn selector_str(&self) -> &str {
        self.selector.as_deref().unwrap_or("")
    }

    /// `value` rendered as the text a user would type.
    pub fn value_text(&self) -> String {
        value_as_text(&self.value)
    }

    /// Check the fields the action kind cannot do without.
    pub fn validate(&self) -> Result<(), AutofillError> {
        let has_selector = self.selector.as_deref().is_some_and(|s| !s.trim().is_empty());
        if self.action.needs_selector() && !has_selector {
            return Err(AutofillError::InvalidCommand(format!(
                "{} requires a selector",
                self.action
            )));
        }

        match &self.action {
            ActionType::PressKey if self.key.is_none() && self.value.is_null() => Err(
                AutofillError::InvalidCommand("press_key requires a key".to_string()),
            ),
            ActionType::SelectRadio
                if !has_selector && (self.name.is_none() || self.value.is_null()) =>
            {
                Err(AutofillError::InvalidCommand(
                    "select_radio requires a selector or a name and value".to_string(),
                ))
            }
            ActionType::DragDrop
                if self.option_str("target").is_none() && !self.value.is_string() =>
            {
                Err(AutofillError::InvalidCommand(
                    "drag_drop requires a target selector".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Render a JSON value as plain text (`"a"` → `a`, `null` → empty).
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Outcome of one command.
///
/// Built only through [`FillResult::ok`] and [`FillResult::failed`], which
/// keep `success=false ⇒ error.is_some()` and
/// `element_found=false ⇒ success=false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub success: bool,
    pub action: ActionType,
    pub selector: Option<String>,
    /// What was actually applied, which may differ from what was requested.
    pub value_used: Value,
    pub element_found: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FillResult {
    pub fn ok(command: &FillCommand, value_used: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            action: command.action.clone(),
            selector: command.selector.clone(),
            value_used,
            element_found: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(
        command: &FillCommand,
        error: impl Into<String>,
        element_found: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: false,
            action: command.action.clone(),
            selector: command.selector.clone(),
            value_used: Value::Null,
            element_found,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_type_round_trips_through_strings() {
        for action in ActionType::BUILTIN.iter() {
            assert_eq!(&ActionType::from(action.as_str()), action);
        }
        assert_eq!(
            ActionType::from("workday_radio"),
            ActionType::Custom("workday_radio".into())
        );
    }

    #[test]
    fn test_command_from_oracle_json_applies_defaults() {
        let cmd: FillCommand = serde_json::from_value(json!({
            "action": "type_text",
            "selector": "#first_name",
            "value": "Ada",
        }))
        .unwrap();

        assert_eq!(cmd.action, ActionType::TypeText);
        assert_eq!(cmd.selector_type, SelectorType::Css);
        assert!(cmd.clear_first);
        assert!(cmd.checked);
        assert_eq!(cmd.select_by, SelectBy::Text);
        assert_eq!(cmd.date_format, "YYYY-MM-DD");
        assert_eq!(cmd.timeout_ms, None);
    }

    #[test]
    fn test_unknown_action_deserializes_as_custom() {
        let cmd: FillCommand = serde_json::from_value(json!({"action": "teleport"})).unwrap();
        assert_eq!(cmd.action, ActionType::Custom("teleport".into()));
        assert_eq!(serde_json::to_value(&cmd).unwrap()["action"], "teleport");
    }

    #[test]
    fn test_validate_requires_selector_for_element_actions() {
        assert!(FillCommand::new(ActionType::Click).validate().is_err());
        assert!(FillCommand::click("#go").validate().is_ok());
        assert!(FillCommand::sleep(10).validate().is_ok());
    }

    #[test]
    fn test_validate_kind_specific_fields() {
        assert!(FillCommand::new(ActionType::PressKey).validate().is_err());
        assert!(FillCommand::press_key("Enter").validate().is_ok());

        let radio = FillCommand::new(ActionType::SelectRadio).with_name("relocate");
        assert!(radio.validate().is_err());
        assert!(radio.with_value("yes").validate().is_ok());

        let drag = FillCommand::new(ActionType::DragDrop).with_selector("#a");
        assert!(drag.clone().validate().is_err());
        assert!(drag.with_option("target", "#b").validate().is_ok());
    }

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&json!("x")), "x");
        assert_eq!(value_as_text(&json!(42)), "42");
        assert_eq!(value_as_text(&json!(true)), "true");
        assert_eq!(value_as_text(&Value::Null), "");
    }

    #[test]
    fn test_result_constructors_keep_invariants() {
        let cmd = FillCommand::click("#go");
        let ok = FillResult::ok(&cmd, json!("click"), 3);
        assert!(ok.success && ok.element_found && ok.error.is_none());

        let missing = FillResult::failed(&cmd, "Element not found: css=#go", false, 10);
        assert!(!missing.success);
        assert!(!missing.element_found);
        assert!(missing.error.is_some());
    }
}
