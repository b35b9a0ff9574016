//! Handlers for Workday's own widgets.
//!
//! Workday renders most selects as type-to-search prompts whose options
//! load from the server, so the reliable move is: focus, type, Enter to
//! search, wait, Enter to take the best match. Checkboxes and radios are
//! usually ARIA widgets rather than inputs.

use std::sync::Arc;

use async_trait::async_trait;
use jobfill_autofill::{
    ActionContext, ActionHandler, ActionRegistry, ActionType, AutofillError, FillCommand, SelectorType, css_quote,
    value_as_text, xpath_literal,
};
use jobfill_browser::ElementRef;
use serde_json::{Value, json};
use tracing::debug;

use super::selectors::{MULTISELECT_INPUT, PROMPT_OPTION, SEARCH_BOX_INPUT, SELECT_INPUT};

pub const SEARCHABLE_SELECT: &str = "workday_searchable_select";
pub const MULTISELECT: &str = "workday_multiselect";
pub const DROPDOWN: &str = "workday_dropdown";
pub const CHECKBOX: &str = "workday_checkbox";
pub const RADIO: &str = "workday_radio";

/// Built-in registry with the Workday kinds added and `type_text`,
/// `select_option`, `check` and `select_radio` replaced.
pub fn workday_registry() -> Arc<ActionRegistry> {
    let registry = ActionRegistry::new();
    macro_rules! handlers {
        ($($kind:expr => $handler:ident),* $(,)?) => {
            $(registry.register($kind, || Arc::new($handler) as Arc<dyn ActionHandler>);)*
        };
    }

    handlers! {
        ActionType::from(SEARCHABLE_SELECT) => SearchableSelectHandler,
        ActionType::from(MULTISELECT) => MultiselectHandler,
        ActionType::from(DROPDOWN) => DropdownHandler,
        ActionType::from(CHECKBOX) => CheckboxHandler,
        ActionType::from(RADIO) => RadioHandler,
        ActionType::TypeText => TextHandler,
        ActionType::SelectOption => DropdownHandler,
        ActionType::Check => CheckboxHandler,
        ActionType::SelectRadio => RadioHandler,
    }
    Arc::new(registry)
}

fn selector_of(command: &FillCommand) -> Result<&str, AutofillError> {
    command
        .selector
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AutofillError::InvalidCommand(format!("{} requires a selector", command.action)))
}

fn field_label(command: &FillCommand) -> &str {
    command.field_name().unwrap_or(command.selector_str())
}

fn truthy(value: &Value, fallback: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => fallback,
    }
}

/// The command's own selector (waited for), then descendants of it, then
/// the page's generic prompt inputs.
async fn prompt_input(ctx: &ActionContext, command: &FillCommand) -> Result<ElementRef, AutofillError> {
    let selector = selector_of(command)?;
    if let Some(el) = ctx
        .locator
        .try_find_visible(selector, command.selector_type, ctx.timeout_ms(command))
        .await
    {
        return Ok(el);
    }

    let mut candidates = Vec::new();
    if command.selector_type == SelectorType::Css {
        candidates.push(format!("{} input", selector));
        candidates.push(format!("{} input[type='text']", selector));
    }
    candidates.extend([SEARCH_BOX_INPUT, SELECT_INPUT, MULTISELECT_INPUT].map(str::to_string));
    for candidate in &candidates {
        if let Some(el) = ctx.locator.first_visible(candidate, SelectorType::Css).await {
            debug!(selector = %candidate, "Prompt input found");
            return Ok(el);
        }
    }
    Err(AutofillError::not_found(command.selector_type, selector))
}

/// Focus, type `text`, Enter to search, wait for results, Enter to pick.
async fn search_and_pick(
    ctx: &ActionContext,
    el: &ElementRef,
    text: &str,
    delay_ms: u64,
) -> Result<(), AutofillError> {
    ctx.locator.scroll_into_view(el).await;
    ctx.locator.click_with_fallback(el).await?;
    ctx.clear_field(el).await;
    ctx.type_into(el, text, delay_ms).await?;
    ctx.driver.press_key("Enter").await?;
    ctx.pause(ctx.config.suggestion_wait_ms).await;
    ctx.driver.press_key("Enter").await?;
    ctx.pause(ctx.config.dropdown_open_ms).await;
    Ok(())
}

/// `type_text` the way Workday inputs accept it: click, clear, type.
pub struct TextHandler;

#[async_trait]
impl ActionHandler for TextHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = selector_of(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;
        ctx.locator.click_with_fallback(&el).await?;
        if command.clear_first {
            ctx.clear_field(&el).await;
        }
        let text = command.value_text();
        ctx.type_into(&el, &text, command.delay_ms).await?;
        Ok(json!(text))
    }
}

/// `workday_searchable_select`: one value through the search prompt.
pub struct SearchableSelectHandler;

#[async_trait]
impl ActionHandler for SearchableSelectHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let text = command.value_text().trim().to_string();
        let el = prompt_input(ctx, command).await?;
        search_and_pick(ctx, &el, &text, command.delay_ms).await?;
        Ok(json!(text))
    }
}

/// `workday_multiselect`: each value becomes a chip through its own search.
pub struct MultiselectHandler;

#[async_trait]
impl ActionHandler for MultiselectHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let values: Vec<String> = match &command.value {
            Value::Array(items) => items.iter().map(value_as_text).collect(),
            other => vec![value_as_text(other)],
        }
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
        if values.is_empty() {
            return Err(AutofillError::failed(
                command.action.as_str(),
                "No values provided for multiselect",
            ));
        }

        let el = prompt_input(ctx, command).await?;
        for value in &values {
            search_and_pick(ctx, &el, value, command.delay_ms).await?;
        }
        Ok(json!(values.join(", ")))
    }
}

/// `workday_dropdown` (and `select_option`): native `<select>`, then a
/// click-to-open listbox, then the search prompt.
pub struct DropdownHandler;

impl DropdownHandler {
    async fn pick_native(
        &self,
        ctx: &ActionContext,
        el: &ElementRef,
        wanted: &str,
        action: &str,
    ) -> Result<Value, AutofillError> {
        let options = ctx.driver.select_options(el).await?;
        let lower = wanted.to_lowercase();
        let chosen = options
            .iter()
            .find(|o| o.text.trim().eq_ignore_ascii_case(wanted))
            .or_else(|| options.iter().find(|o| o.text.to_lowercase().contains(&lower)))
            .or_else(|| options.iter().find(|o| o.value == wanted))
            .ok_or_else(|| AutofillError::failed(action, format!("No option matching '{}'", wanted)))?;
        ctx.driver.set_option_selected(el, chosen.index, true).await?;
        Ok(json!(chosen.text.trim()))
    }

    async fn pick_listbox(&self, ctx: &ActionContext, el: &ElementRef, wanted: &str) -> Option<Value> {
        ctx.locator.scroll_into_view(el).await;
        if ctx.locator.click_with_fallback(el).await.is_err() {
            return None;
        }
        ctx.pause(ctx.config.dropdown_open_ms).await;

        let literal = xpath_literal(wanted);
        let candidates = [
            format!("//*[@role='option'][contains(normalize-space(.), {})]", literal),
            format!("//*[@data-automation-id='promptOption'][contains(normalize-space(.), {})]", literal),
            format!("//li[contains(normalize-space(.), {})]", literal),
        ];
        for candidate in &candidates {
            if let Some(option) = ctx.locator.first_visible(candidate, SelectorType::Xpath).await {
                if ctx.locator.click_with_fallback(&option).await.is_ok() {
                    let text = ctx.driver.text(&option).await.unwrap_or_default();
                    let shown = if text.trim().is_empty() { wanted } else { text.trim() };
                    return Some(json!(shown));
                }
            }
        }
        for option in ctx.locator.find_all(PROMPT_OPTION, SelectorType::Css).await.into_iter().take(20) {
            let text = ctx.driver.text(&option).await.unwrap_or_default();
            if text.to_lowercase().contains(&wanted.to_lowercase())
                && ctx.locator.click_with_fallback(&option).await.is_ok()
            {
                return Some(json!(text.trim()));
            }
        }
        ctx.driver.press_key("Escape").await.ok();
        None
    }
}

#[async_trait]
impl ActionHandler for DropdownHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = selector_of(command)?;
        let wanted = command.value_text().trim().to_string();
        let found = ctx
            .locator
            .try_find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await;

        if let Some(el) = found {
            if ctx.driver.element_state(&el).await?.tag == "select" {
                return self.pick_native(ctx, &el, &wanted, command.action.as_str()).await;
            }
            if let Some(value) = self.pick_listbox(ctx, &el, &wanted).await {
                return Ok(value);
            }
            debug!(selector, "Listbox had no matching option, trying the search prompt");
        }
        SearchableSelectHandler.perform(ctx, command).await
    }
}

/// `workday_checkbox` (and `check`): set the box to the requested state,
/// clicking only when it differs.
pub struct CheckboxHandler;

impl CheckboxHandler {
    async fn locate(&self, ctx: &ActionContext, command: &FillCommand) -> Option<ElementRef> {
        if let Some(selector) = command.selector.as_deref().filter(|s| !s.is_empty()) {
            if let Some(el) = ctx
                .locator
                .try_find_visible(selector, command.selector_type, ctx.timeout_ms(command))
                .await
            {
                return Some(el);
            }
        }

        let mut candidates = Vec::new();
        if let Some(field) = command.field_name() {
            candidates.push((format!("[role='checkbox'][aria-label*={}]", css_quote(field)), SelectorType::Css));
            candidates.push((
                format!(
                    "//label[contains(normalize-space(.), {})]//input[@type='checkbox']",
                    xpath_literal(field)
                ),
                SelectorType::Xpath,
            ));
        }
        if let (Some(selector), SelectorType::Css) = (command.selector.as_deref(), command.selector_type) {
            candidates.push((format!("{} input[type='checkbox']", selector), SelectorType::Css));
        }
        for (candidate, selector_type) in &candidates {
            if let Some(el) = ctx.locator.first_visible(candidate, *selector_type).await {
                return Some(el);
            }
        }
        None
    }

    async fn is_checked(&self, ctx: &ActionContext, el: &ElementRef) -> Result<bool, AutofillError> {
        if let Some(checked) = ctx.driver.element_state(el).await?.checked {
            return Ok(checked);
        }
        Ok(ctx.driver.attribute(el, "aria-checked").await?.as_deref() == Some("true"))
    }
}

#[async_trait]
impl ActionHandler for CheckboxHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let desired = truthy(&command.value, command.checked);
        let Some(el) = self.locate(ctx, command).await else {
            return Err(AutofillError::failed(
                command.action.as_str(),
                format!("Checkbox not found: {}", field_label(command)),
            ));
        };
        ctx.locator.scroll_into_view(&el).await;
        if self.is_checked(ctx, &el).await? != desired {
            ctx.locator.click_with_fallback(&el).await?;
        }
        Ok(json!(desired))
    }
}

/// `workday_radio` (and `select_radio`): click the option whose label
/// matches the value. Yes/no style values try their common spellings.
pub struct RadioHandler;

fn spellings(value: &str) -> Vec<String> {
    let lower = value.to_lowercase();
    let mut out: Vec<String> = match lower.as_str() {
        "true" | "yes" | "1" => vec!["Yes".into(), "True".into()],
        "false" | "no" | "0" => vec!["No".into(), "False".into()],
        _ => {
            let mut chars = value.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            vec![value.to_string(), capitalized, lower.clone(), value.to_uppercase()]
        }
    };
    out.dedup();
    out
}

fn radio_candidates(value: &str) -> Vec<(String, SelectorType)> {
    let css = css_quote(value);
    let xp = xpath_literal(value);
    vec![
        (format!("[role='radio'][aria-label={}]", css), SelectorType::Css),
        (format!("input[type='radio'][value={}]", css), SelectorType::Css),
        (format!("//*[@role='radio'][normalize-space(.)={}]", xp), SelectorType::Xpath),
        (format!("//label[normalize-space(.)={}]", xp), SelectorType::Xpath),
        (format!("//span[normalize-space(.)={}]/ancestor::label", xp), SelectorType::Xpath),
    ]
}

#[async_trait]
impl ActionHandler for RadioHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let value = command.value_text().trim().to_string();
        let options = spellings(&value);

        for option in &options {
            for (candidate, selector_type) in radio_candidates(option) {
                if let Some(el) = ctx.locator.first_visible(&candidate, selector_type).await {
                    ctx.locator.scroll_into_view(&el).await;
                    if ctx.locator.click_with_fallback(&el).await.is_ok() {
                        debug!(selector = %candidate, "Radio option selected");
                        return Ok(json!(option));
                    }
                }
            }
        }

        // Same options, scoped to the question's group.
        if let Some(field) = command.field_name() {
            let question: String = field.chars().take(30).collect();
            for option in &options {
                let xpath = format!(
                    "//*[self::fieldset or @role='radiogroup'][contains(normalize-space(.), {})]//label[contains(normalize-space(.), {})]",
                    xpath_literal(&question),
                    xpath_literal(option)
                );
                if let Some(el) = ctx.locator.first_visible(&xpath, SelectorType::Xpath).await {
                    if ctx.locator.click_with_fallback(&el).await.is_ok() {
                        return Ok(json!(option));
                    }
                }
            }
        }

        Err(AutofillError::failed(
            command.action.as_str(),
            format!("Radio option not found: {} = {}", field_label(command), value),
        ))
    }
}
