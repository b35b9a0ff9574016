//! Checkboxes, switches and radio groups, native or ARIA.

use async_trait::async_trait;
use jobfill_browser::{By, ElementRef};
use serde_json::{Value, json};
use tracing::debug;

use super::{ActionContext, ActionHandler};
use crate::command::{FillCommand, SelectorType};
use crate::error::AutofillError;
use crate::locator::{css_quote, xpath_literal};

const STATE_CLASSES: [&str; 4] = ["checked", "selected", "active", "on"];

/// How the checked state of a control is read and changed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Toggle {
    /// `<input type=checkbox|radio>`
    Native,
    /// `role=checkbox|switch|radio` with `aria-checked`
    Aria,
    /// Styled wrapper around a hidden input.
    Wrapped(ElementRef),
    /// Styled element whose state is only in its class list.
    Styled,
}

async fn classify(ctx: &ActionContext, el: &ElementRef) -> Result<Toggle, AutofillError> {
    let state = ctx.driver.element_state(el).await?;
    if state.tag == "input"
        && matches!(state.input_type.as_deref(), Some("checkbox") | Some("radio"))
    {
        return Ok(Toggle::Native);
    }
    let role = ctx.driver.attribute(el, "role").await?.unwrap_or_default();
    if matches!(role.as_str(), "checkbox" | "switch" | "radio") {
        return Ok(Toggle::Aria);
    }
    let inner = ctx
        .driver
        .find_child_elements(el, &By::css("input[type='checkbox'], input[type='radio']"))
        .await
        .unwrap_or_default();
    Ok(match inner.into_iter().next() {
        Some(input) => Toggle::Wrapped(input),
        None => Toggle::Styled,
    })
}

async fn is_on(ctx: &ActionContext, el: &ElementRef, toggle: &Toggle) -> Result<bool, AutofillError> {
    match toggle {
        Toggle::Native => Ok(ctx.driver.element_state(el).await?.checked.unwrap_or(false)),
        Toggle::Wrapped(input) => Ok(ctx.driver.element_state(input).await?.checked.unwrap_or(false)),
        Toggle::Aria => Ok(ctx.driver.attribute(el, "aria-checked").await?.as_deref() == Some("true")),
        Toggle::Styled => {
            let classes = ctx.driver.attribute(el, "class").await?.unwrap_or_default();
            Ok(classes
                .split_whitespace()
                .any(|c| STATE_CLASSES.contains(&c.to_lowercase().as_str())))
        }
    }
}

/// Bring a control to `desired`: click only when it differs, then force
/// through script for native inputs if the click did not take.
async fn set_state(
    ctx: &ActionContext,
    el: &ElementRef,
    toggle: &Toggle,
    desired: bool,
) -> Result<bool, AutofillError> {
    if is_on(ctx, el, toggle).await? == desired {
        return Ok(true);
    }

    let target = match toggle {
        Toggle::Wrapped(input) if ctx.locator.is_visible(input).await => input,
        _ => el,
    };
    ctx.locator.click_with_fallback(target).await?;
    if is_on(ctx, el, toggle).await? == desired {
        return Ok(true);
    }

    let input = match toggle {
        Toggle::Native => el,
        Toggle::Wrapped(input) => input,
        _ => return Ok(false),
    };
    debug!(element = %el, desired, "Click did not toggle, setting checked via script");
    ctx.driver.set_checked_js(input, desired).await?;
    ctx.driver.dispatch_event(input, "change").await.ok();
    is_on(ctx, el, toggle).await
}

/// `check`: make a checkbox or switch match `checked`. Never toggles a
/// control that is already in the requested state.
pub struct CheckHandler;

#[async_trait]
impl ActionHandler for CheckHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = super::required_selector(command)?;
        let el = ctx
            .locator
            .find(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.locator.scroll_into_view(&el).await;

        let toggle = classify(ctx, &el).await?;
        if !set_state(ctx, &el, &toggle, command.checked).await? {
            return Err(AutofillError::failed(
                command.action.as_str(),
                format!("Checkbox state did not change to {}", command.checked),
            ));
        }
        Ok(json!(command.checked))
    }
}

/// `select_radio`: by explicit selector, or by group `name` + `value`.
pub struct SelectRadioHandler;

impl SelectRadioHandler {
    async fn locate(
        &self,
        ctx: &ActionContext,
        command: &FillCommand,
    ) -> Result<ElementRef, AutofillError> {
        let timeout = ctx.timeout_ms(command);
        let value = command.value_text();

        if let Some(name) = command.name.as_deref() {
            let input_css = format!(
                "input[type='radio'][name={}][value={}]",
                css_quote(name),
                css_quote(&value)
            );
            let candidates = [
                (input_css, SelectorType::Css),
                (
                    format!("[role='radio'][data-value={}]", css_quote(&value)),
                    SelectorType::Css,
                ),
                (
                    format!(
                        "//label[.//input[@type='radio'][@name={}][@value={}]]",
                        xpath_literal(name),
                        xpath_literal(&value)
                    ),
                    SelectorType::Xpath,
                ),
            ];
            let per_candidate = timeout / candidates.len() as u64;
            for (selector, selector_type) in candidates.iter() {
                if let Some(el) = ctx.locator.try_find(selector, *selector_type, per_candidate).await {
                    return Ok(el);
                }
            }

            if let Some(el) = self.by_label_text(ctx, name, &value).await {
                return Ok(el);
            }
        }

        if let Some(selector) = command.selector.as_deref() {
            return ctx.locator.find(selector, command.selector_type, timeout).await;
        }

        Err(AutofillError::not_found(
            SelectorType::Css,
            format!("radio:{}={}", command.name.as_deref().unwrap_or(""), value),
        ))
    }

    /// Radio in group `name` whose `<label for=id>` text matches `value`.
    async fn by_label_text(&self, ctx: &ActionContext, name: &str, value: &str) -> Option<ElementRef> {
        let wanted = value.trim().to_lowercase();
        let group = format!("input[type='radio'][name={}]", css_quote(name));
        for radio in ctx.locator.find_all(&group, SelectorType::Css).await {
            let Ok(Some(id)) = ctx.driver.attribute(&radio, "id").await else {
                continue;
            };
            let label_css = format!("label[for={}]", css_quote(&id));
            let Some(label) = ctx.locator.try_find(&label_css, SelectorType::Css, 0).await else {
                continue;
            };
            let text = ctx.driver.text(&label).await.unwrap_or_default().trim().to_lowercase();
            if text == wanted || (!wanted.is_empty() && text.contains(&wanted)) {
                return Some(radio);
            }
        }
        None
    }
}

#[async_trait]
impl ActionHandler for SelectRadioHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let el = self.locate(ctx, command).await?;
        ctx.locator.scroll_into_view(&el).await;

        let toggle = classify(ctx, &el).await?;
        if !set_state(ctx, &el, &toggle, true).await? {
            return Err(AutofillError::failed(
                command.action.as_str(),
                format!("Radio option did not select: {}", command.value_text()),
            ));
        }
        Ok(json!(command.value_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, page};
    use super::*;
    use crate::ActionType;
    use jobfill_browser::fake::{FakeDocument, FakeElement, FakeEvent};

    fn check(selector: &str, checked: bool) -> FillCommand {
        FillCommand::new(ActionType::Check)
            .with_selector(selector)
            .with_checked(checked)
    }

    #[tokio::test]
    async fn test_check_is_idempotent() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::checkbox("terms").checked(true)));
        let used = CheckHandler.perform(&ctx(&page), &check("#terms", true)).await.unwrap();

        assert_eq!(used, json!(true));
        assert_eq!(page.clicks("terms"), 0);
        assert_eq!(page.is_checked("terms"), Some(true));
    }

    #[tokio::test]
    async fn test_uncheck_clicks_once() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::checkbox("news").checked(true)));
        CheckHandler.perform(&ctx(&page), &check("#news", false)).await.unwrap();
        assert_eq!(page.clicks("news"), 1);
        assert_eq!(page.is_checked("news"), Some(false));
    }

    #[tokio::test]
    async fn test_hidden_native_checkbox_uses_script_click() {
        let page = page(FakeDocument::new("https://a", "A").with_element(FakeElement::checkbox("agree").hidden()));
        CheckHandler.perform(&ctx(&page), &check("#agree", true)).await.unwrap();
        assert!(page.events().contains(&FakeEvent::JsClick("agree".into())));
        assert_eq!(page.is_checked("agree"), Some(true));
    }

    #[tokio::test]
    async fn test_aria_switch() {
        let page = page(
            FakeDocument::new("https://a", "A").with_element(FakeElement::aria_checkbox("remote", false)),
        );
        let c = ctx(&page);
        CheckHandler.perform(&c, &check("#remote", true)).await.unwrap();
        CheckHandler.perform(&c, &check("#remote", true)).await.unwrap();
        assert_eq!(page.clicks("remote"), 1);
        assert_eq!(page.attribute_of("remote", "aria-checked").as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_radio_by_name_and_value() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(
                    FakeElement::radio("auth-yes", "authorized", "yes")
                        .matching(By::css("input[type='radio'][name='authorized'][value='yes']")),
                )
                .with_element(
                    FakeElement::radio("auth-no", "authorized", "no")
                        .checked(true)
                        .matching(By::css("input[type='radio'][name='authorized'][value='no']")),
                ),
        );
        let cmd = FillCommand::new(ActionType::SelectRadio)
            .with_name("authorized")
            .with_value("yes");
        SelectRadioHandler.perform(&ctx(&page), &cmd).await.unwrap();

        assert_eq!(page.is_checked("auth-yes"), Some(true));
        assert_eq!(page.is_checked("auth-no"), Some(false));
    }

    #[tokio::test]
    async fn test_radio_by_label_text() {
        let page = page(
            FakeDocument::new("https://a", "A")
                .with_element(
                    FakeElement::radio("r1", "sponsor", "1")
                        .attr("id", "r1")
                        .matching(By::css("input[type='radio'][name='sponsor']")),
                )
                .with_element(
                    FakeElement::radio("r2", "sponsor", "2")
                        .attr("id", "r2")
                        .matching(By::css("input[type='radio'][name='sponsor']")),
                )
                .with_element(FakeElement::new("l1", "label").with_text("Yes").matching(By::css("label[for='r1']")))
                .with_element(FakeElement::new("l2", "label").with_text("No").matching(By::css("label[for='r2']"))),
        );
        let cmd = FillCommand::new(ActionType::SelectRadio)
            .with_name("sponsor")
            .with_value("No")
            .with_timeout(0);
        SelectRadioHandler.perform(&ctx(&page), &cmd).await.unwrap();
        assert_eq!(page.is_checked("r2"), Some(true));
    }

    #[tokio::test]
    async fn test_radio_missing_is_not_found() {
        let page = page(FakeDocument::new("https://a", "A"));
        let cmd = FillCommand::new(ActionType::SelectRadio)
            .with_name("gender")
            .with_value("x")
            .with_timeout(0);
        let err = SelectRadioHandler.perform(&ctx(&page), &cmd).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("radio:gender=x"));
    }
}
