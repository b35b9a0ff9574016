//! Mouse clicks.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::FillCommand;
use crate::error::AutofillError;

/// `click`: wait until clickable, then click natively with a script-click
/// fallback. `double_click: true` turns it into a double click.
pub struct ClickHandler;

#[async_trait]
impl ActionHandler for ClickHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_clickable(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        if command.double_click {
            ctx.driver.double_click(&el).await?;
            return Ok(json!("double_click"));
        }
        ctx.locator.click_with_fallback(&el).await?;
        Ok(json!("click"))
    }
}

pub struct DoubleClickHandler;

#[async_trait]
impl ActionHandler for DoubleClickHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_clickable(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;
        ctx.driver.double_click(&el).await?;
        Ok(json!("double_click"))
    }
}

pub struct RightClickHandler;

#[async_trait]
impl ActionHandler for RightClickHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let el = ctx
            .locator
            .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;
        ctx.driver.context_click(&el).await?;
        Ok(json!("right_click"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, page};
    use super::*;
    use crate::ActionType;
    use jobfill_browser::fake::{ClickEffect, FakeDocument, FakeElement, FakeEvent};

    #[tokio::test]
    async fn test_click_runs_side_effects() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::button("more", "More").on_click(ClickEffect::Show("extra".into())))
                .with_element(FakeElement::text_input("extra").hidden()),
        );
        let used = ClickHandler.perform(&ctx(&page), &FillCommand::click("#more")).await.unwrap();
        assert_eq!(used, json!("click"));
        assert_eq!(page.clicks("more"), 1);
    }

    #[tokio::test]
    async fn test_click_on_disabled_button_times_out() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::button("go", "Go").disabled()));
        let cmd = FillCommand::click("#go").with_timeout(10);
        let err = ClickHandler.perform(&ctx(&page), &cmd).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(page.clicks("go"), 0);
    }

    #[tokio::test]
    async fn test_double_and_right_click() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::new("row", "div")));
        let c = ctx(&page);

        let mut dbl = FillCommand::click("#row");
        dbl.double_click = true;
        ClickHandler.perform(&c, &dbl).await.unwrap();
        DoubleClickHandler
            .perform(&c, &FillCommand::new(ActionType::DoubleClick).with_selector("#row"))
            .await
            .unwrap();
        RightClickHandler
            .perform(&c, &FillCommand::new(ActionType::RightClick).with_selector("#row"))
            .await
            .unwrap();

        let events = page.events();
        assert_eq!(events.iter().filter(|e| **e == FakeEvent::DoubleClick("row".into())).count(), 2);
        assert!(events.contains(&FakeEvent::ContextClick("row".into())));
    }
}
