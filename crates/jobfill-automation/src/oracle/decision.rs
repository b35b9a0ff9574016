//! Structured answers from the decision oracle.

use jobfill_autofill::{ActionType, FillCommand, SelectBy, SelectorType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn default_unknown() -> String {
    "unknown".to_string()
}

/// Models often write `null` where they mean "absent"; read it the same way.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_unknown))
}

fn null_as_type_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActionType, D::Error> {
    Ok(Option::<ActionType>::deserialize(deserializer)?.unwrap_or_else(default_action))
}

fn null_as_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn null_as_full_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_confidence))
}

fn default_action() -> ActionType {
    ActionType::TypeText
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> f64 {
    1.0
}

/// One profile value the oracle wants written into one control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default = "default_action", deserialize_with = "null_as_type_text")]
    pub action: ActionType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selector: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selector_type: SelectorType,
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub select_by: SelectBy,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub checked: bool,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub clear_first: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_name: String,
    #[serde(default = "default_confidence", deserialize_with = "null_as_full_confidence")]
    pub confidence: f64,
}

impl FieldMapping {
    pub fn to_command(&self) -> FillCommand {
        let mut command = FillCommand::new(self.action.clone())
            .with_selector(&self.selector)
            .with_selector_type(self.selector_type)
            .with_value(self.value.clone())
            .with_select_by(self.select_by)
            .with_checked(self.checked)
            .with_clear_first(self.clear_first)
            .with_wait_after(100);
        command.file_path = self.file_path.clone();
        if !self.field_name.is_empty() {
            command = command.with_option("field_name", self.field_name.as_str());
        }
        command
    }
}

/// A control that moves the application along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavTarget {
    #[serde(default, deserialize_with = "null_as_default")]
    pub selector: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selector_type: SelectorType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

impl NavTarget {
    pub fn css(selector: &str, text: &str) -> Self {
        Self {
            selector: selector.to_string(),
            selector_type: SelectorType::Css,
            text: text.to_string(),
        }
    }

    pub fn to_command(&self) -> FillCommand {
        FillCommand::click(&self.selector)
            .with_selector_type(self.selector_type)
            .with_wait_after(2000)
            .with_option("field_name", self.text.as_str())
    }
}

/// What the oracle made of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDecision {
    #[serde(default = "default_unknown", deserialize_with = "null_as_unknown")]
    pub platform: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_form_page: bool,
    #[serde(default = "default_unknown", deserialize_with = "null_as_unknown")]
    pub page_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, alias = "field_mappings", deserialize_with = "null_as_default")]
    pub autofill_commands: Vec<FieldMapping>,
    #[serde(default)]
    pub apply_button: Option<NavTarget>,
    #[serde(default)]
    pub next_button: Option<NavTarget>,
    #[serde(default)]
    pub submit_button: Option<NavTarget>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs_navigation: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unmapped_fields: Vec<String>,
}

impl Default for PageDecision {
    fn default() -> Self {
        Self {
            platform: default_unknown(),
            is_form_page: false,
            page_type: default_unknown(),
            confidence: 0.0,
            autofill_commands: Vec::new(),
            apply_button: None,
            next_button: None,
            submit_button: None,
            needs_navigation: false,
            unmapped_fields: Vec::new(),
        }
    }
}

impl PageDecision {
    /// Parse an oracle reply, tolerating a markdown fence around the JSON.
    ///
    /// A navigation target without a selector (`"next_button": {}`) is
    /// treated as absent.
    pub fn parse(text: &str) -> Result<Self, OracleError> {
        let mut decision: Self =
            serde_json::from_str(strip_code_fences(text)).map_err(|e| OracleError::Malformed(e.to_string()))?;
        for target in [
            &mut decision.apply_button,
            &mut decision.next_button,
            &mut decision.submit_button,
        ] {
            if target.as_ref().is_some_and(|t| t.selector.trim().is_empty()) {
                *target = None;
            }
        }
        Ok(decision)
    }

    pub fn commands(&self) -> Vec<FillCommand> {
        self.autofill_commands.iter().map(FieldMapping::to_command).collect()
    }

    pub fn has_apply(&self) -> bool {
        self.apply_button.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.next_button.is_some()
    }

    pub fn has_submit(&self) -> bool {
        self.submit_button.is_some()
    }

    /// Apply starts, next continues, submit finishes.
    pub fn primary_navigation(&self) -> Option<&NavTarget> {
        self.apply_button
            .as_ref()
            .or(self.next_button.as_ref())
            .or(self.submit_button.as_ref())
    }
}

/// Job details read off a listing page, kept for answering free-text
/// questions later in the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobContext {
    #[serde(deserialize_with = "null_as_default")]
    pub job_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub job_description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub job_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub salary_range: String,
    #[serde(deserialize_with = "null_as_default")]
    pub requirements: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub responsibilities: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub qualifications: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_button_selector: Option<String>,
}

impl JobContext {
    pub fn parse(text: &str) -> Result<Self, OracleError> {
        serde_json::from_str(strip_code_fences(text)).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_parse_applies_defaults() {
        let decision = PageDecision::parse(
            r##"```json
            {
                "is_form_page": true,
                "autofill_commands": [
                    {"selector": "#email", "value": "a@b.c", "field_name": "Email"},
                    {"action": "check", "selector": "#terms", "checked": false}
                ],
                "next_button": {"selector": "#next", "text": "Next"}
            }
            ```"##,
        )
        .unwrap();

        assert_eq!(decision.platform, "unknown");
        assert_eq!(decision.page_type, "unknown");
        assert_eq!(decision.confidence, 0.0);
        let email = &decision.autofill_commands[0];
        assert_eq!(email.action, ActionType::TypeText);
        assert_eq!(email.selector_type, SelectorType::Css);
        assert_eq!(email.select_by, SelectBy::Text);
        assert!(email.checked);
        assert_eq!(email.confidence, 1.0);
        assert!(!decision.autofill_commands[1].checked);
        assert!(decision.has_next());
        assert!(!decision.has_submit());
    }

    #[test]
    fn test_parse_reads_null_as_absent() {
        let decision = PageDecision::parse(
            r##"{
                "platform": null,
                "page_type": null,
                "confidence": null,
                "autofill_commands": [
                    {"action": null, "selector": "#email", "selector_type": null, "value": "a@b.c",
                     "field_name": null, "checked": null, "clear_first": null, "confidence": null}
                ],
                "next_button": {"selector": "#next", "selector_type": null, "text": null},
                "unmapped_fields": null
            }"##,
        )
        .unwrap();

        assert_eq!(decision.platform, "unknown");
        assert_eq!(decision.page_type, "unknown");
        assert!(decision.unmapped_fields.is_empty());
        let email = &decision.autofill_commands[0];
        assert_eq!(email.action, ActionType::TypeText);
        assert_eq!(email.selector_type, SelectorType::Css);
        assert!(email.field_name.is_empty());
        assert!(email.checked && email.clear_first);
        assert_eq!(email.confidence, 1.0);
        assert_eq!(decision.next_button.as_ref().map(|t| t.text.as_str()), Some(""));
    }

    #[test]
    fn test_parse_drops_targets_without_selector() {
        let decision = PageDecision::parse(
            r##"{
                "next_button": {},
                "apply_button": {"selector": "  ", "text": "Apply"},
                "submit_button": {"selector": "#submit", "text": "Submit"}
            }"##,
        )
        .unwrap();
        assert!(!decision.has_next());
        assert!(!decision.has_apply());
        assert!(decision.has_submit());
        assert_eq!(decision.primary_navigation().unwrap().selector, "#submit");
    }

    #[test]
    fn test_parse_accepts_field_mappings_alias() {
        let decision = PageDecision::parse(r##"{"field_mappings": [{"selector": "#a", "action": "workday_dropdown"}]}"##).unwrap();
        assert_eq!(
            decision.autofill_commands[0].action,
            ActionType::Custom("workday_dropdown".into())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = PageDecision::parse("I think this is a form page").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse AI response:"));
    }

    #[test]
    fn test_mapping_to_command() {
        let mapping: FieldMapping = serde_json::from_value(json!({
            "action": "select_option",
            "selector": "country",
            "selector_type": "name",
            "value": "Canada",
            "select_by": "value",
            "field_name": "Country"
        }))
        .unwrap();
        let command = mapping.to_command();
        assert_eq!(command.action, ActionType::SelectOption);
        assert_eq!(command.selector_type, SelectorType::Name);
        assert_eq!(command.select_by, SelectBy::Value);
        assert_eq!(command.wait_after_ms, 100);
        assert_eq!(command.field_name(), Some("Country"));
    }

    #[test]
    fn test_navigation_priority_and_command() {
        let mut decision = PageDecision {
            next_button: Some(NavTarget::css("#next", "Next")),
            submit_button: Some(NavTarget::css("#submit", "Submit")),
            ..Default::default()
        };
        assert_eq!(decision.primary_navigation().unwrap().selector, "#next");
        decision.apply_button = Some(NavTarget::css("#apply", "Apply"));
        let target = decision.primary_navigation().unwrap();
        assert_eq!(target.selector, "#apply");

        let command = target.to_command();
        assert_eq!(command.action, ActionType::Click);
        assert_eq!(command.wait_after_ms, 2000);
    }

    #[test]
    fn test_job_context_parse() {
        let ctx = JobContext::parse(
            r#"{"job_title": "Engineer", "requirements": ["Rust"], "apply_button_selector": "[data-automation-id='jobPostingApplyButton']"}"#,
        )
        .unwrap();
        assert_eq!(ctx.job_title, "Engineer");
        assert_eq!(ctx.requirements, vec!["Rust".to_string()]);
        assert!(ctx.company_name.is_empty());
        assert!(ctx.apply_button_selector.is_some());
    }

    #[test]
    fn test_job_context_reads_null_as_empty() {
        let ctx = JobContext::parse(r#"{"job_title": "Engineer", "salary_range": null, "requirements": null}"#).unwrap();
        assert!(ctx.salary_range.is_empty());
        assert!(ctx.requirements.is_empty());
    }
}
