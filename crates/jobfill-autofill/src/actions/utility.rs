//! Hover, focus, scrolling, waits, frames and other small actions.

use std::time::Duration;

use async_trait::async_trait;
use jobfill_browser::ScriptArg;
use serde_json::{Value, json};

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::{FillCommand, WaitCondition};
use crate::error::AutofillError;

pub struct HoverHandler;

#[async_trait]
impl ActionHandler for HoverHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;
        ctx.driver.hover(&el).await?;
        Ok(json!("hover"))
    }
}

/// `clear`: native clear, then select-all + Delete, then the value setter.
pub struct ClearHandler;

#[async_trait]
impl ActionHandler for ClearHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;

        let _ = ctx.driver.clear(&el).await;
        if !ctx.driver.value(&el).await.unwrap_or_default().is_empty() {
            let _ = ctx.select_all_and(&el, "Delete").await;
        }
        if !ctx.driver.value(&el).await.unwrap_or_default().is_empty() {
            ctx.driver.set_value_js(&el, "").await?;
        }
        ctx.trigger_events(&el).await;
        Ok(json!("cleared"))
    }
}

pub struct FocusHandler;

#[async_trait]
impl ActionHandler for FocusHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        let _ = ctx.driver.click(&el).await;
        ctx.driver.focus(&el).await?;
        Ok(json!("focused"))
    }
}

pub struct BlurHandler;

#[async_trait]
impl ActionHandler for BlurHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.driver.blur(&el).await?;
        ctx.driver.dispatch_event(&el, "blur").await.ok();
        Ok(json!("blurred"))
    }
}

pub struct ScrollToHandler;

#[async_trait]
impl ActionHandler for ScrollToHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.driver.scroll_into_view(&el).await?;
        ctx.pause(ctx.config.scroll_settle_ms).await;
        Ok(json!("scrolled"))
    }
}

/// `scroll_by`: `x`/`y` from options, or from the value (an `{x, y}`
/// object, or a bare number meaning vertical pixels).
pub struct ScrollByHandler;

impl ScrollByHandler {
    fn offsets(command: &FillCommand) -> (i64, i64) {
        let axis = |source: &serde_json::Map<String, Value>, key: &str| {
            source.get(key).and_then(Value::as_i64)
        };
        let x = axis(&command.options, "x");
        let y = axis(&command.options, "y");
        if x.is_some() || y.is_some() {
            return (x.unwrap_or(0), y.unwrap_or(0));
        }
        match &command.value {
            Value::Object(map) => (axis(map, "x").unwrap_or(0), axis(map, "y").unwrap_or(0)),
            Value::Number(n) => (0, n.as_i64().unwrap_or(0)),
            Value::String(s) => (0, s.trim().parse().unwrap_or(0)),
            _ => (0, 0),
        }
    }
}

#[async_trait]
impl ActionHandler for ScrollByHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let (x, y) = Self::offsets(command);
        ctx.driver.scroll_by(x, y).await?;
        ctx.pause(ctx.config.scroll_settle_ms).await;
        Ok(json!({ "x": x, "y": y }))
    }
}

/// `wait`: sleep `time_ms`, and/or wait for a selector to satisfy
/// `condition`.
pub struct WaitHandler;

#[async_trait]
impl ActionHandler for WaitHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = command.selector.as_deref().filter(|s| !s.trim().is_empty());

        if command.time_ms > 0 {
            tokio::time::sleep(Duration::from_millis(command.time_ms)).await;
            if selector.is_none() {
                return Ok(json!(format!("waited {}ms", command.time_ms)));
            }
        }

        let Some(selector) = selector else {
            return Ok(json!("no wait specified"));
        };

        let timeout = ctx.timeout_ms(command);
        let kind = command.selector_type;
        let met = match command.condition {
            WaitCondition::Visible => ctx.locator.wait_for_visible(selector, kind, timeout).await,
            WaitCondition::Hidden => ctx.locator.wait_for_hidden(selector, kind, timeout).await,
            WaitCondition::Clickable => ctx.locator.wait_for_clickable(selector, kind, timeout).await,
            WaitCondition::Present => ctx.locator.try_find(selector, kind, timeout).await.is_some(),
        };
        if !met {
            return Err(AutofillError::Timeout(format!(
                "Condition not met: {} for {}",
                command.condition, selector
            )));
        }
        Ok(json!(command.condition.to_string()))
    }
}

/// `drag_drop`: drag the selected element onto `options.target` (or the
/// string value).
pub struct DragDropHandler;

#[async_trait]
impl ActionHandler for DragDropHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let target_selector = command
            .option_str("target")
            .map(str::to_string)
            .or_else(|| command.value.as_str().map(str::to_string))
            .ok_or_else(|| AutofillError::InvalidCommand("drag_drop requires a target selector".to_string()))?;

        let timeout = ctx.timeout_ms(command);
        let source = ctx
            .locator
            .find_visible(selector, command.selector_type, timeout)
            .await?;
        let target = ctx
            .locator
            .find_visible(&target_selector, command.selector_type, timeout)
            .await?;
        ctx.driver.drag_and_drop(&source, &target).await?;
        Ok(json!(format!("dragged to {}", target_selector)))
    }
}

/// `set_value`: write the value through the native setter and fire events.
pub struct SetValueHandler;

#[async_trait]
impl ActionHandler for SetValueHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        let applied = ctx.driver.set_value_js(&el, &command.value_text()).await?;
        ctx.trigger_events(&el).await;
        Ok(json!(applied))
    }
}

/// `execute_js`: run the value (or `options.script`) with the selected
/// element, if any, as `arguments[0]`.
pub struct ExecuteJsHandler;

#[async_trait]
impl ActionHandler for ExecuteJsHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let script = command
            .value
            .as_str()
            .or_else(|| command.option_str("script"))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AutofillError::InvalidCommand("execute_js requires a script".to_string()))?;

        let mut args = Vec::new();
        if let Some(selector) = command.selector.as_deref().filter(|s| !s.trim().is_empty()) {
            let el = ctx
                .locator
                .find(selector, command.selector_type, ctx.timeout_ms(command))
                .await?;
            args.push(ScriptArg::Element(el));
        }
        Ok(ctx.driver.execute_script(script, &args).await?)
    }
}

pub struct SwitchIframeHandler;

#[async_trait]
impl ActionHandler for SwitchIframeHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        ctx.locator
            .enter_frame(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        Ok(json!(format!("frame depth {}", ctx.locator.frame_depth())))
    }
}

pub struct SwitchDefaultHandler;

#[async_trait]
impl ActionHandler for SwitchDefaultHandler {
    async fn perform(&self, ctx: &ActionContext, _command: &FillCommand) -> Result<Value, AutofillError> {
        ctx.locator.exit_all_frames().await?;
        Ok(json!("default content"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, page};
    use super::*;
    use crate::ActionType;
    use jobfill_browser::fake::{FakeDocument, FakeElement, FakeEvent};

    #[tokio::test]
    async fn test_clear_escalates_to_value_setter() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("city").with_value("Austin").resists_clear().ignores_typing()),
        );
        let cmd = FillCommand::new(ActionType::Clear).with_selector("#city");
        let used = ClearHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("cleared"));
        assert_eq!(page.value_of("city").as_deref(), Some(""));
    }

    #[test]
    fn test_scroll_offsets() {
        let from_options = FillCommand::new(ActionType::ScrollBy)
            .with_option("x", 10)
            .with_option("y", 20);
        assert_eq!(ScrollByHandler::offsets(&from_options), (10, 20));

        let from_object = FillCommand::new(ActionType::ScrollBy).with_value(json!({"y": 300}));
        assert_eq!(ScrollByHandler::offsets(&from_object), (0, 300));

        let from_number = FillCommand::new(ActionType::ScrollBy).with_value(-150);
        assert_eq!(ScrollByHandler::offsets(&from_number), (0, -150));
    }

    #[tokio::test]
    async fn test_scroll_by_reaches_driver() {
        let page = page(FakeDocument::new("https://a", "A"));
        let cmd = FillCommand::new(ActionType::ScrollBy).with_value(500);
        ScrollByHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert!(page.events().contains(&FakeEvent::ScrollBy(0, 500)));
    }

    #[tokio::test]
    async fn test_wait_time_and_conditions() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::new("spinner", "div"))
                .with_element(FakeElement::new("done", "div")),
        );
        let c = ctx(&page);

        let used = WaitHandler.perform(&c, &FillCommand::sleep(5)).await.unwrap();
        assert_eq!(used, json!("waited 5ms"));

        let visible = FillCommand::new(ActionType::Wait).with_selector("#done").with_timeout(10);
        assert!(WaitHandler.perform(&c, &visible).await.is_ok());

        let hidden = FillCommand::new(ActionType::Wait)
            .with_selector("#spinner")
            .with_condition(WaitCondition::Hidden)
            .with_timeout(10);
        let err = WaitHandler.perform(&c, &hidden).await.unwrap_err();
        assert!(matches!(err, AutofillError::Timeout(_)));
        assert!(err.to_string().contains("Condition not met: hidden"));

        let nothing = FillCommand::new(ActionType::Wait);
        assert_eq!(WaitHandler.perform(&c, &nothing).await.unwrap(), json!("no wait specified"));
    }

    #[tokio::test]
    async fn test_drag_drop_to_target_option() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::new("card", "div"))
                .with_element(FakeElement::new("lane", "div")),
        );
        let cmd = FillCommand::new(ActionType::DragDrop)
            .with_selector("#card")
            .with_option("target", "#lane");
        let used = DragDropHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("dragged to #lane"));
        assert!(page.events().contains(&FakeEvent::DragDrop {
            from: "card".into(),
            to: "lane".into()
        }));
    }

    #[tokio::test]
    async fn test_execute_js_returns_script_result() {
        let page = page(FakeDocument::new("https://a", "A").with_script("document.title", json!("Apply")));
        let cmd = FillCommand::new(ActionType::ExecuteJs).with_value("return document.title;");
        let used = ExecuteJsHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(used, json!("Apply"));
    }

    #[tokio::test]
    async fn test_focus_blur_and_frames() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::text_input("name"))
                .with_element(FakeElement::new("embed", "iframe")),
        );
        let c = ctx(&page);
        FocusHandler
            .perform(&c, &FillCommand::new(ActionType::Focus).with_selector("#name"))
            .await
            .unwrap();
        BlurHandler
            .perform(&c, &FillCommand::new(ActionType::Blur).with_selector("#name"))
            .await
            .unwrap();
        SwitchIframeHandler
            .perform(&c, &FillCommand::new(ActionType::SwitchIframe).with_selector("#embed"))
            .await
            .unwrap();
        assert_eq!(c.locator.frame_depth(), 1);
        SwitchDefaultHandler
            .perform(&c, &FillCommand::new(ActionType::SwitchDefault))
            .await
            .unwrap();
        assert_eq!(c.locator.frame_depth(), 0);

        let events = page.events();
        assert!(events.contains(&FakeEvent::Focus("name".into())));
        assert!(events.contains(&FakeEvent::Blur("name".into())));
        assert!(events.contains(&FakeEvent::Frame(None)));
    }
}
