//! Element lookup with bounded waits.
//!
//! Three wait strategies are exposed: *present* (in the DOM), *visible*
//! (present and rendered) and *clickable* (visible and enabled). All of them
//! poll until the deadline and then fail with
//! [`AutofillError::ElementNotFound`]; driver errors seen while polling are
//! treated as "not there yet" and never surface directly.

use std::sync::Arc;
use std::time::Duration;

use jobfill_browser::{By, DriverError, ElementRef, PageDriver};
use jobfill_config::AutofillConfig;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::command::SelectorType;
use crate::error::AutofillError;

const REMOVE_OVERLAYS: &str = r#"
    var overlays = document.querySelectorAll('[class*="overlay"], [class*="modal"], [class*="popup"]');
    var hidden = 0;
    overlays.forEach(function(el) {
        var pos = window.getComputedStyle(el).position;
        if (pos === 'fixed' || pos === 'absolute') { el.style.display = 'none'; hidden++; }
    });
    return hidden;
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Present,
    Visible,
    Clickable,
}

/// Resolves selectors against the current page.
pub struct ElementLocator {
    driver: Arc<dyn PageDriver>,
    poll_interval: Duration,
    scroll_settle: Duration,
    /// Frames entered through [`ElementLocator::enter_frame`], outermost first.
    frames: Mutex<Vec<ElementRef>>,
}

impl ElementLocator {
    pub fn new(driver: Arc<dyn PageDriver>, config: &AutofillConfig) -> Self {
        Self {
            driver,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            scroll_settle: Duration::from_millis(config.scroll_settle_ms),
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    pub fn by(selector: &str, selector_type: SelectorType) -> By {
        match selector_type {
            SelectorType::Css => By::Css(selector.to_string()),
            SelectorType::Xpath => By::XPath(selector.to_string()),
            SelectorType::Id => By::Id(selector.to_string()),
            SelectorType::Name => By::Name(selector.to_string()),
        }
    }

    async fn poll(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
        readiness: Readiness,
    ) -> Option<ElementRef> {
        let by = Self::by(selector, selector_type);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            match self.driver.find_elements(&by).await {
                Ok(candidates) => {
                    for el in candidates {
                        if self.is_ready(&el, readiness).await {
                            return Some(el);
                        }
                    }
                }
                Err(DriverError::Closed) => return None,
                Err(e) => trace!(selector = %by, "Lookup error while polling: {}", e),
            }

            if Instant::now() >= deadline {
                debug!(selector = %by, ?readiness, timeout_ms, "Element not found");
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn is_ready(&self, el: &ElementRef, readiness: Readiness) -> bool {
        if readiness == Readiness::Present {
            return true;
        }
        match self.driver.element_state(el).await {
            Ok(state) => match readiness {
                Readiness::Present => true,
                Readiness::Visible => state.displayed,
                Readiness::Clickable => state.displayed && state.enabled,
            },
            Err(_) => false,
        }
    }

    /// Wait until the element exists in the DOM.
    pub async fn find(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        self.poll(selector, selector_type, timeout_ms, Readiness::Present)
            .await
            .ok_or_else(|| AutofillError::not_found(selector_type, selector))
    }

    /// Non-failing [`find`](Self::find) for best-effort callers.
    pub async fn try_find(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Option<ElementRef> {
        self.poll(selector, selector_type, timeout_ms, Readiness::Present)
            .await
    }

    /// Wait until a matching element is rendered.
    pub async fn find_visible(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        self.poll(selector, selector_type, timeout_ms, Readiness::Visible)
            .await
            .ok_or_else(|| AutofillError::not_found(selector_type, selector))
    }

    pub async fn try_find_visible(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Option<ElementRef> {
        self.poll(selector, selector_type, timeout_ms, Readiness::Visible)
            .await
    }

    /// Wait until a matching element is rendered and enabled.
    pub async fn find_clickable(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        self.poll(selector, selector_type, timeout_ms, Readiness::Clickable)
            .await
            .ok_or_else(|| AutofillError::not_found(selector_type, selector))
    }

    /// All current matches, without waiting.
    pub async fn find_all(&self, selector: &str, selector_type: SelectorType) -> Vec<ElementRef> {
        self.driver
            .find_elements(&Self::by(selector, selector_type))
            .await
            .unwrap_or_default()
    }

    /// First visible match among the current ones, without waiting.
    pub async fn first_visible(&self, selector: &str, selector_type: SelectorType) -> Option<ElementRef> {
        for el in self.find_all(selector, selector_type).await {
            if self.is_visible(&el).await {
                return Some(el);
            }
        }
        None
    }

    pub async fn wait_for_visible(&self, selector: &str, selector_type: SelectorType, timeout_ms: u64) -> bool {
        self.try_find_visible(selector, selector_type, timeout_ms)
            .await
            .is_some()
    }

    pub async fn wait_for_clickable(&self, selector: &str, selector_type: SelectorType, timeout_ms: u64) -> bool {
        self.poll(selector, selector_type, timeout_ms, Readiness::Clickable)
            .await
            .is_some()
    }

    /// Wait until no match is rendered (absent counts as hidden).
    pub async fn wait_for_hidden(&self, selector: &str, selector_type: SelectorType, timeout_ms: u64) -> bool {
        let by = Self::by(selector, selector_type);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let mut any_visible = false;
            if let Ok(found) = self.driver.find_elements(&by).await {
                for el in found {
                    if self.is_visible(&el).await {
                        any_visible = true;
                        break;
                    }
                }
            }
            if !any_visible {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait until the element's value contains `expected`.
    pub async fn wait_for_value(
        &self,
        selector: &str,
        expected: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(el) = self.try_find(selector, selector_type, 0).await {
                if let Ok(value) = self.driver.value(&el).await {
                    if value.contains(expected) {
                        return true;
                    }
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Element whose own text equals (or contains) `text`.
    pub async fn find_by_text(
        &self,
        text: &str,
        tag: &str,
        exact: bool,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        let literal = xpath_literal(text);
        let xpath = if exact {
            format!("//{}[normalize-space(text())={}]", tag, literal)
        } else {
            format!("//{}[contains(normalize-space(text()), {})]", tag, literal)
        };
        self.find(&xpath, SelectorType::Xpath, timeout_ms).await
    }

    /// Form control labelled `label_text`, through `for=` or nesting.
    pub async fn find_by_label(
        &self,
        label_text: &str,
        exact: bool,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        let literal = xpath_literal(label_text);
        let label_xpath = if exact {
            format!("//label[normalize-space(.)={}]", literal)
        } else {
            format!("//label[contains(normalize-space(.), {})]", literal)
        };

        if let Some(label) = self
            .try_find(&label_xpath, SelectorType::Xpath, timeout_ms)
            .await
        {
            if let Ok(Some(target)) = self.driver.attribute(&label, "for").await {
                if !target.is_empty() {
                    if let Some(el) = self.try_find(&target, SelectorType::Id, 0).await {
                        return Ok(el);
                    }
                }
            }
            let nested = By::xpath(".//input | .//select | .//textarea");
            if let Ok(children) = self.driver.find_child_elements(&label, &nested).await {
                if let Some(el) = children.into_iter().next() {
                    return Ok(el);
                }
            }
        }

        Err(AutofillError::not_found(
            SelectorType::Xpath,
            format!("label:{}", label_text),
        ))
    }

    pub async fn find_by_placeholder(
        &self,
        placeholder: &str,
        exact: bool,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        let op = if exact { "=" } else { "*=" };
        let quoted = css_quote(placeholder);
        let selector = format!(
            "input[placeholder{op}{q}], textarea[placeholder{op}{q}]",
            op = op,
            q = quoted
        );
        self.find(&selector, SelectorType::Css, timeout_ms).await
    }

    pub async fn find_by_aria_label(
        &self,
        aria_label: &str,
        exact: bool,
        timeout_ms: u64,
    ) -> Result<ElementRef, AutofillError> {
        let op = if exact { "=" } else { "*=" };
        let selector = format!("[aria-label{}{}]", op, css_quote(aria_label));
        self.find(&selector, SelectorType::Css, timeout_ms).await
    }

    /// Best-effort scroll followed by the configured settle time.
    pub async fn scroll_into_view(&self, el: &ElementRef) {
        if let Err(e) = self.driver.scroll_into_view(el).await {
            trace!(element = %el, "Scroll into view failed: {}", e);
            return;
        }
        if !self.scroll_settle.is_zero() {
            tokio::time::sleep(self.scroll_settle).await;
        }
    }

    pub async fn scroll_to_top(&self) -> Result<(), AutofillError> {
        self.driver.execute_script("window.scrollTo(0, 0);", &[]).await?;
        Ok(())
    }

    pub async fn scroll_to_bottom(&self) -> Result<(), AutofillError> {
        self.driver
            .execute_script("window.scrollTo(0, document.body.scrollHeight);", &[])
            .await?;
        Ok(())
    }

    pub async fn is_visible(&self, el: &ElementRef) -> bool {
        self.driver.is_displayed(el).await.unwrap_or(false)
    }

    pub async fn is_enabled(&self, el: &ElementRef) -> bool {
        self.driver
            .element_state(el)
            .await
            .map(|s| s.enabled)
            .unwrap_or(false)
    }

    /// True once the handle no longer points into the live document.
    pub async fn is_stale(&self, el: &ElementRef) -> bool {
        match self.driver.element_state(el).await {
            Ok(state) => !state.connected,
            Err(_) => true,
        }
    }

    /// Hide fixed/absolute overlays that intercept clicks. Returns how many.
    pub async fn remove_overlays(&self) -> u64 {
        self.driver
            .execute_script(REMOVE_OVERLAYS, &[])
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    /// Script click, falling back to a native click.
    pub async fn force_click(&self, el: &ElementRef) -> Result<(), AutofillError> {
        if self.driver.js_click(el).await.is_ok() {
            return Ok(());
        }
        self.driver.click(el).await?;
        Ok(())
    }

    /// Native click, falling back to a script click.
    pub async fn click_with_fallback(&self, el: &ElementRef) -> Result<(), AutofillError> {
        match self.driver.click(el).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(element = %el, "Native click failed ({}), using script click", e);
                self.driver.js_click(el).await?;
                Ok(())
            }
        }
    }

    /// Switch into an iframe; later lookups resolve inside it.
    pub async fn enter_frame(
        &self,
        selector: &str,
        selector_type: SelectorType,
        timeout_ms: u64,
    ) -> Result<(), AutofillError> {
        let frame = self.find(selector, selector_type, timeout_ms).await?;
        self.driver.switch_to_frame(Some(&frame)).await?;
        self.frames.lock().push(frame);
        Ok(())
    }

    /// Leave the innermost frame entered through this locator.
    pub async fn exit_frame(&self) -> Result<(), AutofillError> {
        let remaining = {
            let mut frames = self.frames.lock();
            frames.pop();
            frames.clone()
        };
        self.driver.switch_to_frame(None).await?;
        for frame in remaining.iter() {
            self.driver.switch_to_frame(Some(frame)).await?;
        }
        Ok(())
    }

    pub async fn exit_all_frames(&self) -> Result<(), AutofillError> {
        self.frames.lock().clear();
        self.driver.switch_to_frame(None).await?;
        Ok(())
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.lock().len()
    }
}

/// Quote a string as an XPath literal, handling embedded quotes.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Quote a string for a CSS attribute selector.
pub fn css_quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfill_browser::fake::{ClickEffect, FakeDocument, FakeElement, FakePage};

    fn locator(page: Arc<FakePage>) -> ElementLocator {
        ElementLocator::new(page, &AutofillConfig::without_delays())
    }

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("Apply"), "'Apply'");
        assert_eq!(xpath_literal("I'm ready"), "\"I'm ready\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_css_quote_escapes() {
        assert_eq!(css_quote("it's"), r"'it\'s'");
    }

    #[tokio::test]
    async fn test_find_missing_is_element_not_found() {
        let page = Arc::new(FakePage::blank());
        let err = locator(page)
            .find("#nope", SelectorType::Css, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, AutofillError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_visible_skips_hidden_matches() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::button("hidden", "Next").hidden().matching(By::css(".next")))
                .with_element(FakeElement::button("shown", "Next").matching(By::css(".next"))),
        ));
        let loc = locator(page.clone());

        let present = loc.find(".next", SelectorType::Css, 0).await.unwrap();
        assert!(present.id().ends_with("hidden"));
        let visible = loc.find_visible(".next", SelectorType::Css, 0).await.unwrap();
        assert!(visible.id().ends_with("shown"));
    }

    #[tokio::test]
    async fn test_clickable_requires_enabled() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::button("submit", "Submit").disabled()),
        ));
        let loc = locator(page);
        assert!(loc.find_visible("#submit", SelectorType::Css, 0).await.is_ok());
        assert!(loc.find_clickable("#submit", SelectorType::Css, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_hidden() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A")
                .with_element(FakeElement::new("spinner", "div"))
                .with_element(FakeElement::button("go", "Go").on_click(ClickEffect::Hide("spinner".into()))),
        ));
        let loc = locator(page.clone());
        assert!(!loc.wait_for_hidden("#spinner", SelectorType::Css, 10).await);

        let go = loc.find("#go", SelectorType::Css, 0).await.unwrap();
        page.click(&go).await.unwrap();
        assert!(loc.wait_for_hidden("#spinner", SelectorType::Css, 10).await);
        assert!(loc.wait_for_hidden("#never-existed", SelectorType::Css, 0).await);
    }

    #[tokio::test]
    async fn test_find_by_label_follows_for_attribute() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A")
                .with_element(
                    FakeElement::new("lbl", "label")
                        .with_text("Email")
                        .attr("for", "email")
                        .matching(By::xpath("//label[normalize-space(.)='Email']")),
                )
                .with_element(FakeElement::text_input("email")),
        ));
        let el = locator(page).find_by_label("Email", true, 0).await.unwrap();
        assert!(el.id().ends_with("email"));
    }

    #[tokio::test]
    async fn test_stale_after_navigation() {
        let page = Arc::new(FakePage::new(vec![
            FakeDocument::new("https://a/1", "1")
                .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(1))),
            FakeDocument::new("https://a/2", "2"),
        ]));
        let loc = locator(page.clone());
        let next = loc.find("#next", SelectorType::Css, 0).await.unwrap();
        assert!(!loc.is_stale(&next).await);
        page.click(&next).await.unwrap();
        assert!(loc.is_stale(&next).await);
    }

    #[tokio::test]
    async fn test_frame_stack() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A").with_element(FakeElement::new("frame", "iframe")),
        ));
        let loc = locator(page);
        loc.enter_frame("#frame", SelectorType::Css, 0).await.unwrap();
        assert_eq!(loc.frame_depth(), 1);
        loc.exit_frame().await.unwrap();
        assert_eq!(loc.frame_depth(), 0);
    }
}
