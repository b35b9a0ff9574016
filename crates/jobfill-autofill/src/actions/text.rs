//! Text and numeric entry.

use async_trait::async_trait;
use jobfill_browser::{ElementRef, ScriptArg};
use serde_json::{Value, json};
use tracing::debug;

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::FillCommand;
use crate::error::AutofillError;

const CLEAR_EDITABLE: &str = "arguments[0].innerHTML = '';";
const SET_EDITABLE: &str = "arguments[0].innerHTML = arguments[1]; \
     arguments[0].dispatchEvent(new Event('input', { bubbles: true }));";

/// How a text value is put into a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Input,
    ContentEditable,
    Other,
}

async fn classify(ctx: &ActionContext, el: &ElementRef) -> Result<TextTarget, AutofillError> {
    let editable = ctx.driver.attribute(el, "contenteditable").await?;
    if editable.as_deref() == Some("true") {
        return Ok(TextTarget::ContentEditable);
    }
    let state = ctx.driver.element_state(el).await?;
    Ok(match state.tag.as_str() {
        "input" | "textarea" => TextTarget::Input,
        _ => TextTarget::Other,
    })
}

/// Focus by clicking; some widgets only accept input after a real click.
async fn click_to_focus(ctx: &ActionContext, el: &ElementRef) {
    if ctx.driver.click(el).await.is_err() {
        let _ = ctx.driver.focus(el).await;
    }
}

/// Type into an input/textarea; if the field does not end up holding the
/// value, set it through the native setter. Returns the value read back.
async fn fill_input(
    ctx: &ActionContext,
    el: &ElementRef,
    value: &str,
    command: &FillCommand,
) -> Result<String, AutofillError> {
    click_to_focus(ctx, el).await;

    if command.clear_first && !ctx.clear_field(el).await {
        debug!(element = %el, "Field did not clear completely");
    }

    ctx.type_into(el, value, command.delay_ms).await?;

    let actual = ctx.driver.value(el).await.unwrap_or_default();
    if actual == value || command.option_bool("use_js_fallback") == Some(false) {
        return Ok(actual);
    }

    debug!(element = %el, typed = value, read_back = %actual, "Typed value did not stick, setting via script");
    Ok(ctx.driver.set_value_js(el, value).await?)
}

async fn fill_contenteditable(
    ctx: &ActionContext,
    el: &ElementRef,
    value: &str,
    command: &FillCommand,
) -> Result<String, AutofillError> {
    click_to_focus(ctx, el).await;
    if command.clear_first {
        ctx.driver
            .execute_script(CLEAR_EDITABLE, &[ScriptArg::from(el)])
            .await?;
    }
    if command.delay_ms > 0 {
        ctx.type_into(el, value, command.delay_ms).await?;
    } else {
        ctx.driver
            .execute_script(SET_EDITABLE, &[ScriptArg::from(el), ScriptArg::Value(json!(value))])
            .await?;
    }
    Ok(value.to_string())
}

/// `type_text`: plain text into inputs, textareas and contenteditables.
pub struct TypeTextHandler;

#[async_trait]
impl ActionHandler for TypeTextHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let value = command.value_text();
        let applied = match classify(ctx, &el).await? {
            TextTarget::ContentEditable => fill_contenteditable(ctx, &el, &value, command).await?,
            TextTarget::Input => fill_input(ctx, &el, &value, command).await?,
            TextTarget::Other => {
                click_to_focus(ctx, &el).await;
                ctx.driver.send_keys(&el, &value).await.map_err(|e| {
                    AutofillError::failed(command.action.as_str(), format!("Failed to set value: {}", e))
                })?;
                value.clone()
            }
        };

        ctx.trigger_events(&el).await;
        Ok(Value::String(applied))
    }
}

/// `type_number`: numeric entry; range inputs are set directly.
pub struct TypeNumberHandler;

#[async_trait]
impl ActionHandler for TypeNumberHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let value = command.value_text();
        if !value.is_empty() && value.parse::<f64>().is_err() {
            return Err(AutofillError::failed(
                command.action.as_str(),
                format!("Not a number: {}", value),
            ));
        }

        let state = ctx.driver.element_state(&el).await?;
        let applied = if state.input_type.as_deref() == Some("range") {
            ctx.driver.set_value_js(&el, &value).await?
        } else {
            fill_input(ctx, &el, &value, command).await?
        };

        ctx.trigger_events(&el).await;
        Ok(Value::String(applied))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, page};
    use super::*;
    use jobfill_browser::fake::{FakeDocument, FakeElement, FakeEvent};

    #[tokio::test]
    async fn test_type_text_into_plain_input() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("first_name").with_value("old")),
        );
        let cmd = FillCommand::type_text("#first_name", "Ada");
        let used = TypeTextHandler.perform(&ctx(&page), &cmd).await.unwrap();

        assert_eq!(used, json!("Ada"));
        assert_eq!(page.value_of("first_name").as_deref(), Some("Ada"));
        assert!(!page.events().iter().any(|e| matches!(e, FakeEvent::SetValueJs { .. })));
    }

    #[tokio::test]
    async fn test_type_text_falls_back_to_script_when_typing_is_swallowed() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("email").ignores_typing()),
        );
        let cmd = FillCommand::type_text("#email", "ada@example.com");
        let used = TypeTextHandler.perform(&ctx(&page), &cmd).await.unwrap();

        assert_eq!(used, json!("ada@example.com"));
        assert!(page.events().iter().any(|e| matches!(
            e,
            FakeEvent::SetValueJs { key, .. } if key == "email"
        )));
    }

    #[tokio::test]
    async fn test_type_text_per_character() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::textarea("bio")));
        let mut cmd = FillCommand::type_text("#bio", "hey");
        cmd.delay_ms = 1;
        TypeTextHandler.perform(&ctx(&page), &cmd).await.unwrap();

        let typed: Vec<String> = page
            .events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Typed { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(typed, vec!["h", "e", "y"]);
        assert_eq!(page.value_of("bio").as_deref(), Some("hey"));
    }

    #[tokio::test]
    async fn test_type_number_rejects_non_numeric() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::input("years", "number")));
        let cmd = FillCommand::new(crate::ActionType::TypeNumber)
            .with_selector("#years")
            .with_value("many");
        let err = TypeNumberHandler.perform(&ctx(&page), &cmd).await.unwrap_err();
        assert!(err.to_string().contains("Not a number"));
    }

    #[tokio::test]
    async fn test_type_number_sets_range_directly() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::input("level", "range")));
        let cmd = FillCommand::new(crate::ActionType::TypeNumber)
            .with_selector("#level")
            .with_value(7);
        let used = TypeNumberHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("7"));
        assert_eq!(page.value_of("level").as_deref(), Some("7"));
    }
}
