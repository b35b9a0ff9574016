//! Moving forward through an application: oracle targets first, then
//! fixed patterns for the usual Apply and Next controls.

use jobfill_autofill::{ElementLocator, SelectorType};
use tracing::{debug, info};

use crate::oracle::{NavTarget, PageDecision};

/// Controls that start an application from a listing.
pub const APPLY_FALLBACKS: &[(&str, SelectorType)] = &[
    ("//button[contains(normalize-space(.), 'Apply')]", SelectorType::Xpath),
    ("//a[contains(normalize-space(.), 'Apply')]", SelectorType::Xpath),
    ("[data-automation-id='jobPostingApplyButton']", SelectorType::Css),
    ("[data-testid='apply-button']", SelectorType::Css),
    ("//button[contains(normalize-space(.), 'Start Application')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Start')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Begin Application')]", SelectorType::Xpath),
];

/// Controls that advance a multi-step form.
pub const NEXT_FALLBACKS: &[(&str, SelectorType)] = &[
    ("//button[contains(normalize-space(.), 'Next')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Continue')]", SelectorType::Xpath),
    ("//button[contains(normalize-space(.), 'Save and Continue')]", SelectorType::Xpath),
    ("[data-automation-id='bottom-navigation-next-button']", SelectorType::Css),
    ("input[type='submit'][value*='Next']", SelectorType::Css),
    ("input[type='submit'][value*='Continue']", SelectorType::Css),
];

/// Which control got clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advanced {
    Apply,
    Next,
}

/// Click `target` if it is currently visible.
pub async fn click_target(locator: &ElementLocator, target: &NavTarget, label: &str) -> bool {
    if target.selector.is_empty() {
        return false;
    }
    click_first_visible(locator, &target.selector, target.selector_type, label).await
}

async fn click_first_visible(
    locator: &ElementLocator,
    selector: &str,
    selector_type: SelectorType,
    label: &str,
) -> bool {
    let Some(el) = locator.first_visible(selector, selector_type).await else {
        return false;
    };
    locator.scroll_into_view(&el).await;
    match locator.click_with_fallback(&el).await {
        Ok(()) => {
            info!(selector, "Clicked {} control", label);
            true
        }
        Err(e) => {
            debug!(selector, "Could not click {} control: {}", label, e);
            false
        }
    }
}

/// Walk `patterns` and click the first visible match.
pub async fn click_fallback(locator: &ElementLocator, patterns: &[(&str, SelectorType)], label: &str) -> bool {
    for (selector, selector_type) in patterns {
        if click_first_visible(locator, selector, *selector_type, label).await {
            return true;
        }
    }
    false
}

/// Try to move past the current page.
///
/// Order: Apply (on listings, or when nothing was filled and the oracle saw
/// an apply control), the oracle's Next, the Next patterns, and finally
/// the Apply patterns when nothing was filled.
pub async fn advance(locator: &ElementLocator, decision: &PageDecision, fields_filled: usize) -> Option<Advanced> {
    if decision.page_type == "job_listing" || (fields_filled == 0 && decision.has_apply()) {
        if let Some(apply) = &decision.apply_button {
            if click_target(locator, apply, "apply").await {
                return Some(Advanced::Apply);
            }
        }
        if click_fallback(locator, APPLY_FALLBACKS, "apply").await {
            return Some(Advanced::Apply);
        }
    }

    if let Some(next) = &decision.next_button {
        if click_target(locator, next, "next").await {
            return Some(Advanced::Next);
        }
    }
    if click_fallback(locator, NEXT_FALLBACKS, "next").await {
        return Some(Advanced::Next);
    }

    if fields_filled == 0 && click_fallback(locator, APPLY_FALLBACKS, "apply").await {
        return Some(Advanced::Apply);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfill_browser::By;
    use jobfill_browser::fake::{ClickEffect, FakeDocument, FakeElement, FakePage};
    use jobfill_config::AutofillConfig;
    use std::sync::Arc;

    fn locator(page: Arc<FakePage>) -> ElementLocator {
        ElementLocator::new(page, &AutofillConfig::without_delays())
    }

    fn two_docs(first: FakeDocument) -> Arc<FakePage> {
        Arc::new(FakePage::new(vec![first, FakeDocument::new("https://a/2", "Two")]))
    }

    #[tokio::test]
    async fn test_oracle_next_target_wins() {
        let page = two_docs(
            FakeDocument::new("https://a/1", "One")
                .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(1))),
        );
        let decision = PageDecision {
            next_button: Some(NavTarget::css("#next", "Next")),
            ..Default::default()
        };
        assert_eq!(advance(&locator(page.clone()), &decision, 3).await, Some(Advanced::Next));
        assert_eq!(page.clicks("next"), 1);
        assert_eq!(page.current_index(), 1);
    }

    #[tokio::test]
    async fn test_listing_uses_apply_pattern() {
        let page = two_docs(
            FakeDocument::new("https://a/job", "Job").with_element(
                FakeElement::button("apply", "Apply Now")
                    .matching(By::css(APPLY_FALLBACKS[2].0))
                    .on_click(ClickEffect::GoTo(1)),
            ),
        );
        let decision = PageDecision {
            page_type: "job_listing".into(),
            ..Default::default()
        };
        assert_eq!(advance(&locator(page.clone()), &decision, 0).await, Some(Advanced::Apply));
        assert_eq!(page.clicks("apply"), 1);
    }

    #[tokio::test]
    async fn test_next_pattern_fallback() {
        let page = two_docs(
            FakeDocument::new("https://a/1", "One").with_element(
                FakeElement::button("cont", "Save and Continue")
                    .matching(By::xpath(NEXT_FALLBACKS[1].0)),
            ),
        );
        let decision = PageDecision {
            next_button: Some(NavTarget::css("#missing", "Next")),
            ..Default::default()
        };
        assert_eq!(advance(&locator(page.clone()), &decision, 2).await, Some(Advanced::Next));
        assert_eq!(page.clicks("cont"), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_click() {
        let page = Arc::new(FakePage::single(FakeDocument::new("https://a", "A")));
        assert_eq!(advance(&locator(page), &PageDecision::default(), 0).await, None);
    }

    #[tokio::test]
    async fn test_hidden_target_is_skipped() {
        let page = Arc::new(FakePage::single(
            FakeDocument::new("https://a", "A").with_element(FakeElement::button("next", "Next").hidden()),
        ));
        let target = NavTarget::css("#next", "Next");
        assert!(!click_target(&locator(page.clone()), &target, "next").await);
        assert_eq!(page.clicks("next"), 0);
    }
}
