//! Dropdowns: native `<select>`, custom listbox widgets, multi-select and
//! type-ahead autocomplete.

use async_trait::async_trait;
use jobfill_browser::{By, ElementRef, ScriptArg, SelectOption};
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::{FillCommand, SelectBy, SelectorType, value_as_text};
use crate::error::AutofillError;
use crate::locator::css_quote;

/// Clicks the first rendered option whose text or `data-value` matches.
const CLICK_MATCHING_OPTION: &str = r#"/* jobfill:click-option */
    var wanted = String(arguments[0]).trim().toLowerCase();
    var exact = !!arguments[1];
    var options = document.querySelectorAll(
        '[role="option"], [role="listbox"] li, .dropdown-option, .select-option, .checkbox-option');
    for (var i = 0; i < options.length; i++) {
        var text = (options[i].textContent || '').trim().toLowerCase();
        var val = (options[i].getAttribute('data-value') || '').toLowerCase();
        var hit = exact ? (text === wanted || val === wanted)
                        : (text.indexOf(wanted) !== -1 || val.indexOf(wanted) !== -1);
        if (hit) { options[i].click(); return true; }
    }
    return false;
"#;

const SUGGESTION_SELECTORS: [&str; 7] = [
    "[role='listbox'] [role='option']",
    ".autocomplete-suggestion",
    ".suggestion-item",
    ".dropdown-item",
    ".pac-item",
    "[class*='suggestion']",
    "[class*='option']",
];

/// Ways of matching a requested value against native options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionMatch {
    Text,
    Value,
    Index,
    PartialText,
    PartialValue,
}

impl OptionMatch {
    /// Preferred kind first, then text → value → index, then partial matches.
    fn order(preferred: SelectBy) -> Vec<OptionMatch> {
        let first = match preferred {
            SelectBy::Text => OptionMatch::Text,
            SelectBy::Value => OptionMatch::Value,
            SelectBy::Index => OptionMatch::Index,
        };
        let mut order = vec![first];
        for m in [
            OptionMatch::Text,
            OptionMatch::Value,
            OptionMatch::Index,
            OptionMatch::PartialText,
            OptionMatch::PartialValue,
        ] {
            if !order.contains(&m) {
                order.push(m);
            }
        }
        order
    }

    fn find<'a>(self, options: &'a [SelectOption], wanted: &str) -> Option<&'a SelectOption> {
        let wanted_trim = wanted.trim();
        let lower = wanted_trim.to_lowercase();
        match self {
            OptionMatch::Text => options.iter().find(|o| o.text.trim() == wanted_trim),
            OptionMatch::Value => options.iter().find(|o| o.value == wanted_trim),
            OptionMatch::Index => wanted_trim
                .parse::<usize>()
                .ok()
                .and_then(|i| options.iter().find(|o| o.index == i)),
            OptionMatch::PartialText if !lower.is_empty() => options
                .iter()
                .find(|o| o.text.to_lowercase().contains(&lower)),
            OptionMatch::PartialValue if !lower.is_empty() => options
                .iter()
                .find(|o| !o.value.is_empty() && o.value.to_lowercase().contains(&lower)),
            _ => None,
        }
    }

    fn applied(self, option: &SelectOption) -> Value {
        match self {
            OptionMatch::Text | OptionMatch::PartialText => json!(option.text.trim()),
            _ => json!(option.value),
        }
    }
}

/// Select one option of a native `<select>`; returns what was applied.
async fn select_native(
    ctx: &ActionContext,
    el: &ElementRef,
    wanted: &str,
    preferred: SelectBy,
) -> Result<Option<Value>, AutofillError> {
    let options = ctx.driver.select_options(el).await?;
    for strategy in OptionMatch::order(preferred) {
        if let Some(option) = strategy.find(&options, wanted) {
            trace!(element = %el, ?strategy, index = option.index, "Selecting native option");
            ctx.driver.set_option_selected(el, option.index, true).await?;
            ctx.driver.dispatch_event(el, "change").await.ok();
            return Ok(Some(strategy.applied(option)));
        }
    }
    Ok(None)
}

/// Open a custom dropdown widget.
async fn open_widget(ctx: &ActionContext, el: &ElementRef) -> Result<(), AutofillError> {
    ctx.locator.click_with_fallback(el).await?;
    ctx.pause(ctx.config.dropdown_open_ms).await;
    Ok(())
}

async fn click_matching_option(ctx: &ActionContext, wanted: &str, exact: bool) -> bool {
    ctx.driver
        .execute_script(
            CLICK_MATCHING_OPTION,
            &[ScriptArg::Value(json!(wanted)), ScriptArg::Value(json!(exact))],
        )
        .await
        .map(|v| v.as_bool().unwrap_or(false))
        .unwrap_or(false)
}

/// Fallbacks for non-native dropdowns, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomStrategy {
    DataValue,
    OptionText,
    TypeAndEnter,
}

impl CustomStrategy {
    const ORDER: [CustomStrategy; 3] = [
        CustomStrategy::DataValue,
        CustomStrategy::OptionText,
        CustomStrategy::TypeAndEnter,
    ];

    async fn attempt(self, ctx: &ActionContext, el: &ElementRef, wanted: &str) -> Result<bool, AutofillError> {
        match self {
            CustomStrategy::DataValue => {
                let q = css_quote(wanted);
                let selectors = [
                    format!("[role='option'][data-value={}]", q),
                    format!("[role='listbox'] [data-value={}]", q),
                    format!(".dropdown-option[data-value={}]", q),
                    format!(".option[data-value={}]", q),
                    format!("li[data-value={}]", q),
                ];
                for selector in selectors.iter() {
                    if let Some(option) = ctx.locator.first_visible(selector, SelectorType::Css).await {
                        ctx.locator.click_with_fallback(&option).await?;
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CustomStrategy::OptionText => Ok(click_matching_option(ctx, wanted, true).await
                || click_matching_option(ctx, wanted, false).await),
            CustomStrategy::TypeAndEnter => {
                let inner = ctx
                    .driver
                    .find_child_elements(el, &By::css("input"))
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .next();
                let target = inner.as_ref().unwrap_or(el);
                ctx.clear_field(target).await;
                ctx.driver.send_keys(target, wanted).await?;
                ctx.pause(ctx.config.suggestion_wait_ms).await;
                ctx.driver.focus(target).await.ok();
                ctx.driver.press_key("Enter").await?;
                Ok(true)
            }
        }
    }
}

async fn select_custom(ctx: &ActionContext, el: &ElementRef, wanted: &str) -> Result<bool, AutofillError> {
    open_widget(ctx, el).await?;
    for strategy in CustomStrategy::ORDER {
        match strategy.attempt(ctx, el, wanted).await {
            Ok(true) => {
                debug!(element = %el, ?strategy, "Custom dropdown option selected");
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => trace!(element = %el, ?strategy, "Dropdown strategy failed: {}", e),
        }
    }
    Ok(false)
}

async fn is_native_select(ctx: &ActionContext, el: &ElementRef) -> Result<bool, AutofillError> {
    Ok(ctx.driver.element_state(el).await?.tag == "select")
}

/// `select_option`: one value from a native or custom dropdown.
pub struct SelectOptionHandler;

#[async_trait]
impl ActionHandler for SelectOptionHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let wanted = command.value_text();
        let applied = if is_native_select(ctx, &el).await? {
            select_native(ctx, &el, &wanted, command.select_by).await?
        } else if select_custom(ctx, &el, &wanted).await? {
            Some(json!(wanted))
        } else {
            None
        };

        applied.ok_or_else(|| {
            AutofillError::failed(command.action.as_str(), format!("Failed to select option: {}", wanted))
        })
    }
}

fn requested_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_as_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_as_text(other)],
    }
}

/// `select_multiple`: clear the current selection, then add each value.
/// Succeeds when at least one value was applied.
pub struct SelectMultipleHandler;

#[async_trait]
impl ActionHandler for SelectMultipleHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let values = requested_values(&command.value);
        let mut applied = Vec::new();

        if is_native_select(ctx, &el).await? {
            for option in ctx.driver.select_options(&el).await? {
                if option.selected {
                    ctx.driver.set_option_selected(&el, option.index, false).await?;
                }
            }
            let options = ctx.driver.select_options(&el).await?;
            let first = OptionMatch::order(command.select_by)[0];
            for wanted in values.iter() {
                let hit = first
                    .find(&options, wanted)
                    .map(|o| (first, o))
                    .or_else(|| OptionMatch::PartialValue.find(&options, wanted).map(|o| (OptionMatch::PartialValue, o)))
                    .or_else(|| OptionMatch::PartialText.find(&options, wanted).map(|o| (OptionMatch::PartialText, o)));
                match hit {
                    Some((strategy, option)) => {
                        ctx.driver.set_option_selected(&el, option.index, true).await?;
                        applied.push(strategy.applied(option));
                    }
                    None => debug!(element = %el, value = %wanted, "No option matched"),
                }
            }
            ctx.driver.dispatch_event(&el, "change").await.ok();
        } else {
            open_widget(ctx, &el).await?;
            for wanted in values.iter() {
                if click_matching_option(ctx, wanted, false).await {
                    applied.push(json!(wanted));
                    ctx.pause(ctx.config.dropdown_open_ms / 2).await;
                }
            }
            ctx.driver.focus(&el).await.ok();
            ctx.driver.press_key("Escape").await.ok();
        }

        if applied.is_empty() {
            return Err(AutofillError::failed(
                command.action.as_str(),
                format!("Failed to select options: {:?}", values),
            ));
        }
        Ok(Value::Array(applied))
    }
}

/// `select_autocomplete`: type, wait for suggestions, pick the matching one
/// (or the first via ArrowDown+Enter).
pub struct SelectAutocompleteHandler;

#[async_trait]
impl ActionHandler for SelectAutocompleteHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let value = command.value_text();
        ctx.locator.click_with_fallback(&el).await?;
        if !ctx.clear_field(&el).await {
            debug!(element = %el, "Autocomplete input did not clear completely");
        }
        ctx.driver.send_keys(&el, &value).await?;
        ctx.pause(ctx.config.suggestion_wait_ms).await;

        let wanted = value.to_lowercase();
        for selector in SUGGESTION_SELECTORS {
            for suggestion in ctx.locator.find_all(selector, SelectorType::Css).await {
                let Ok(state) = ctx.driver.element_state(&suggestion).await else {
                    continue;
                };
                if state.displayed && state.text.to_lowercase().contains(&wanted) {
                    ctx.locator.click_with_fallback(&suggestion).await?;
                    return Ok(json!(state.text.trim()));
                }
            }
        }

        debug!(element = %el, "No matching suggestion, taking the first one");
        ctx.driver.focus(&el).await.ok();
        ctx.driver.press_key("ArrowDown").await?;
        ctx.driver.press_key("Enter").await?;
        Ok(json!(value))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, page};
    use super::*;
    use crate::ActionType;
    use jobfill_browser::fake::{FakeDocument, FakeElement};

    fn countries() -> FakeElement {
        FakeElement::select(
            "country",
            &[("", "Select..."), ("us", "United States"), ("ca", "Canada"), ("gb", "United Kingdom")],
        )
    }

    fn select_cmd(value: &str) -> FillCommand {
        FillCommand::new(ActionType::SelectOption)
            .with_selector("#country")
            .with_value(value)
    }

    #[test]
    fn test_option_match_order_starts_with_preference() {
        assert_eq!(OptionMatch::order(SelectBy::Value)[0], OptionMatch::Value);
        assert_eq!(
            OptionMatch::order(SelectBy::Text),
            vec![
                OptionMatch::Text,
                OptionMatch::Value,
                OptionMatch::Index,
                OptionMatch::PartialText,
                OptionMatch::PartialValue
            ]
        );
    }

    #[tokio::test]
    async fn test_native_select_by_text() {
        let page = page(FakeDocument::new("https://a", "A").with_element(countries()));
        let used = SelectOptionHandler
            .perform(&ctx(&page), &select_cmd("Canada"))
            .await
            .unwrap();
        assert_eq!(used, json!("Canada"));
        assert_eq!(page.selected_values("country"), vec!["ca"]);
    }

    #[tokio::test]
    async fn test_native_select_falls_back_to_value_then_partial() {
        let page = page(FakeDocument::new("https://a", "A").with_element(countries()));
        let c = ctx(&page);

        let used = SelectOptionHandler.perform(&c, &select_cmd("gb")).await.unwrap();
        assert_eq!(used, json!("gb"));

        let used = SelectOptionHandler.perform(&c, &select_cmd("united st")).await.unwrap();
        assert_eq!(used, json!("United States"));
        assert_eq!(page.selected_values("country"), vec!["us"]);
    }

    #[tokio::test]
    async fn test_native_select_no_match_fails() {
        let page = page(FakeDocument::new("https://a", "A").with_element(countries()));
        let err = SelectOptionHandler
            .perform(&ctx(&page), &select_cmd("Atlantis"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to select option: Atlantis"));
    }

    #[tokio::test]
    async fn test_custom_dropdown_uses_data_value_option() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::new("degree", "div").attr("role", "combobox"))
                .with_element(
                    FakeElement::new("opt-bs", "li")
                        .with_text("Bachelor's")
                        .matching(By::css("[role='option'][data-value='bs']")),
                ),
        );
        let cmd = FillCommand::new(ActionType::SelectOption)
            .with_selector("#degree")
            .with_value("bs");
        let used = SelectOptionHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("bs"));
        assert_eq!(page.clicks("degree"), 1);
        assert_eq!(page.clicks("opt-bs"), 1);
    }

    #[tokio::test]
    async fn test_custom_dropdown_falls_back_to_typing() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::new("school", "div"))
                .with_element(FakeElement::text_input("school-search").child_of("school").matching(By::css("input"))),
        );
        let cmd = FillCommand::new(ActionType::SelectOption)
            .with_selector("#school")
            .with_value("MIT");
        SelectOptionHandler.perform(&ctx(&page), &cmd).await.unwrap();

        assert_eq!(page.value_of("school-search").as_deref(), Some("MIT"));
        assert_eq!(page.keys_pressed().last().map(String::as_str), Some("Enter"));
    }

    #[tokio::test]
    async fn test_select_multiple_resets_then_applies() {
        let langs = FakeElement::select("langs", &[("en", "English"), ("fr", "French"), ("de", "German")])
            .attr("multiple", "");
        let page = page(FakeDocument::new("https://a", "A").with_element(langs));
        let c = ctx(&page);

        let first = FillCommand::new(ActionType::SelectMultiple)
            .with_selector("#langs")
            .with_value(json!(["German"]));
        SelectMultipleHandler.perform(&c, &first).await.unwrap();

        let second = FillCommand::new(ActionType::SelectMultiple)
            .with_selector("#langs")
            .with_value(json!(["English", "fren", "Klingon"]));
        let used = SelectMultipleHandler.perform(&c, &second).await.unwrap();

        assert_eq!(used, json!(["English", "French"]));
        assert_eq!(page.selected_values("langs"), vec!["en", "fr"]);
    }

    #[tokio::test]
    async fn test_select_multiple_nothing_applied_fails() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::select("langs", &[("en", "English")]).attr("multiple", "")),
        );
        let cmd = FillCommand::new(ActionType::SelectMultiple)
            .with_selector("#langs")
            .with_value(json!(["Klingon"]));
        assert!(SelectMultipleHandler.perform(&ctx(&page), &cmd).await.is_err());
    }

    #[tokio::test]
    async fn test_autocomplete_clicks_matching_suggestion() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("city"))
                .with_element(
                    FakeElement::new("sugg", "li")
                        .with_text("Austin, TX")
                        .matching(By::css(".pac-item")),
                ),
        );
        let cmd = FillCommand::new(ActionType::SelectAutocomplete)
            .with_selector("#city")
            .with_value("Austin");
        let used = SelectAutocompleteHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("Austin, TX"));
        assert_eq!(page.clicks("sugg"), 1);
    }

    #[tokio::test]
    async fn test_autocomplete_without_suggestions_presses_down_enter() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::text_input("city")));
        let cmd = FillCommand::new(ActionType::SelectAutocomplete)
            .with_selector("#city")
            .with_value("Austin");
        SelectAutocompleteHandler.perform(&ctx(&page), &cmd).await.unwrap();
        let keys = page.keys_pressed();
        assert_eq!(&keys[keys.len() - 2..], &["ArrowDown".to_string(), "Enter".to_string()]);
    }

    #[tokio::test]
    async fn test_autocomplete_replaces_stubborn_prefill() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("city").with_value("Boston").resists_clear()),
        );
        let cmd = FillCommand::new(ActionType::SelectAutocomplete)
            .with_selector("#city")
            .with_value("Austin");
        SelectAutocompleteHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(page.value_of("city").as_deref(), Some("Austin"));
    }
}
