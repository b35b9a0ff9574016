use std::sync::Arc;

use jobfill_browser::fake::{ClickEffect, FakeDocument, FakeElement, FakePage};
use jobfill_config::WorkflowConfig;
use serde_json::json;

use super::*;
use crate::captcha::{CaptchaKind, PROBE_MARKER};
use crate::notify::{NotificationKind, Priority};
use crate::oracle::NavTarget;
use crate::session::SessionStore;
use crate::testing::{ScriptedOracle, form_decision, harness, mapping, with_next, with_submit};

const PAGE_1: &str = "https://jobs.example.com/apply/1";
const PAGE_2: &str = "https://jobs.example.com/apply/2";

fn text_fields(doc: FakeDocument, keys: &[&str]) -> FakeDocument {
    keys.iter()
        .fold(doc, |doc, key| doc.with_element(FakeElement::text_input(key)))
}

fn two_step_form() -> Arc<FakePage> {
    let first = text_fields(FakeDocument::new(PAGE_1, "Your details"), &["first_name", "last_name", "email"])
        .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(1)));
    let second = text_fields(FakeDocument::new(PAGE_2, "Contact"), &["phone", "city"])
        .with_element(FakeElement::button("submit", "Submit Application"));
    Arc::new(FakePage::new(vec![first, second]))
}

fn two_step_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .with_page(
            PAGE_1,
            with_next(
                form_decision(vec![
                    mapping("#first_name", json!("Ada")),
                    mapping("#last_name", json!("Lovelace")),
                    mapping("#email", json!("ada@example.com")),
                ]),
                "#next",
            ),
        )
        .with_page(
            PAGE_2,
            with_submit(
                form_decision(vec![
                    mapping("#phone", json!("555-0100")),
                    mapping("#city", json!("London")),
                ]),
                "#submit",
            ),
        )
}

async fn status_of(store: &dyn SessionStore, job_id: &str) -> SessionStatus {
    store.require(job_id).await.unwrap().status
}

#[tokio::test]
async fn test_two_step_form_reaches_submit() {
    let page = two_step_form();
    let h = harness(page.clone(), Arc::new(two_step_oracle()));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(result.success);
    assert!(result.submit_ready);
    assert_eq!(result.fields_filled, 5);
    assert_eq!(result.fields_failed, 0);
    assert_eq!(result.page_number, 2);
    assert_eq!(page.value_of("city").as_deref(), Some("London"));
    assert_eq!(page.clicks("submit"), 0);

    let session = h.store.require("job-1").await.unwrap();
    assert_eq!(session.status, SessionStatus::ReadyToSubmit);
    assert_eq!(session.snapshots.len(), 2);
    assert_eq!(session.navigation, vec![PAGE_1.to_string(), PAGE_2.to_string()]);
    assert_eq!(session.fields_filled(), 5);

    let sent = h.notifier.recent(10, Some("job-1"));
    assert!(sent.iter().any(|n| n.title == "Application Ready for Submission"));
}

#[tokio::test]
async fn test_captcha_pauses_after_filling() {
    let page = Arc::new(FakePage::single(
        text_fields(FakeDocument::new(PAGE_1, "Apply"), &["first_name", "email"])
            .with_element(FakeElement::button("next", "Next"))
            .with_script(PROBE_MARKER, json!({"found": true, "type": "recaptcha", "visible": true})),
    ));
    let oracle = ScriptedOracle::new().with_page(
        PAGE_1,
        with_next(
            form_decision(vec![
                mapping("#first_name", json!("Ada")),
                mapping("#email", json!("ada@example.com")),
            ]),
            "#next",
        ),
    );
    let h = harness(page.clone(), Arc::new(oracle));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(result.paused);
    assert!(result.captcha_detected);
    assert_eq!(result.captcha_type, Some(CaptchaKind::Recaptcha));
    assert_eq!(result.fields_filled, 2);
    assert_eq!(page.clicks("next"), 0);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::CaptchaWaiting);

    let pending = h.notifier.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, NotificationKind::CaptchaDetected);
    assert_eq!(pending[0].priority, Priority::Urgent);
}

#[tokio::test]
async fn test_listing_page_only_needs_navigation() {
    let page = Arc::new(FakePage::single(
        FakeDocument::new(PAGE_1, "Senior Engineer").with_element(FakeElement::button("apply", "Apply")),
    ));
    let oracle = ScriptedOracle::new().with_page(
        PAGE_1,
        PageDecision {
            page_type: "job_listing".into(),
            apply_button: Some(NavTarget::css("#apply", "Apply")),
            ..Default::default()
        },
    );
    let h = harness(page.clone(), Arc::new(oracle));
    h.ctx.ensure_session(PAGE_1).await;

    let result = DefaultWorkflow::new().process_page(&h.ctx).await;

    assert!(result.success);
    assert!(result.needs_more_navigation);
    assert!(!result.submit_ready);
    assert_eq!(result.fields_filled, 0);
    assert_eq!(result.page_type, "job_listing");
    assert_eq!(page.clicks("apply"), 0);
}

#[tokio::test]
async fn test_listing_clicks_apply_then_fills() {
    let listing = FakeDocument::new(PAGE_1, "Senior Engineer")
        .with_element(FakeElement::button("apply", "Apply").on_click(ClickEffect::GoTo(1)));
    let form = FakeDocument::new(PAGE_2, "Application")
        .with_element(FakeElement::text_input("email"))
        .with_element(FakeElement::button("submit", "Submit"));
    let page = Arc::new(FakePage::new(vec![listing, form]));
    let oracle = ScriptedOracle::new()
        .with_page(
            PAGE_1,
            PageDecision {
                page_type: "job_listing".into(),
                apply_button: Some(NavTarget::css("#apply", "Apply")),
                ..Default::default()
            },
        )
        .with_page(
            PAGE_2,
            with_submit(form_decision(vec![mapping("#email", json!("ada@example.com"))]), "#submit"),
        );
    let h = harness(page.clone(), Arc::new(oracle));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert_eq!(page.clicks("apply"), 1);
    assert!(result.submit_ready);
    assert_eq!(result.fields_filled, 1);
}

#[tokio::test]
async fn test_page_that_does_not_advance_stops_the_loop() {
    let page = Arc::new(FakePage::single(
        FakeDocument::new(PAGE_1, "Stuck")
            .with_element(FakeElement::text_input("email"))
            .with_element(FakeElement::button("next", "Next")),
    ));
    let oracle = Arc::new(ScriptedOracle::new().with_page(
        PAGE_1,
        with_next(form_decision(vec![mapping("#email", json!("ada@example.com"))]), "#next"),
    ));
    let h = harness(page.clone(), oracle.clone());

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert_eq!(oracle.calls(), 1);
    assert_eq!(page.clicks("next"), 1);
    assert!(result.success);
    assert!(result.needs_more_navigation);
    assert_eq!(result.fields_filled, 1);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::Completed);
}

#[tokio::test]
async fn test_oracle_failure_fails_the_job() {
    let page = Arc::new(FakePage::single(FakeDocument::new(PAGE_1, "Apply")));
    let oracle = ScriptedOracle::new().failing_on(PAGE_1, "connection reset");
    let h = harness(page, Arc::new(oracle));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("AI analysis failed: Oracle request failed: connection reset")
    );
    let session = h.store.require("job-1").await.unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert!(session.error_message.unwrap().starts_with("AI analysis failed"));
    assert!(
        h.notifier
            .recent(10, None)
            .iter()
            .any(|n| n.kind == NotificationKind::JobFailed)
    );
}

#[tokio::test]
async fn test_page_with_nothing_to_do_is_an_error() {
    let page = Arc::new(FakePage::single(FakeDocument::new(PAGE_1, "Blank")));
    let oracle = ScriptedOracle::new().with_page(PAGE_1, PageDecision::default());
    let h = harness(page, Arc::new(oracle));
    h.ctx.ensure_session(PAGE_1).await;

    let result = DefaultWorkflow::new().process_page(&h.ctx).await;

    assert!(result.is_error());
    assert_eq!(
        result.error.as_deref(),
        Some("Page type 'unknown' with no form fields or navigation buttons.")
    );
}

#[tokio::test]
async fn test_pages_without_progress_stop_after_limit() {
    let urls: Vec<String> = (0..5).map(|i| format!("https://jobs.example.com/step/{}", i)).collect();
    let docs = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            FakeDocument::new(url, &format!("Step {}", i))
                .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(i + 1)))
        })
        .collect();
    let page = Arc::new(FakePage::new(docs));
    let oracle = urls.iter().fold(ScriptedOracle::new(), |oracle, url| {
        oracle.with_page(url, with_next(form_decision(Vec::new()), "#next"))
    });
    let oracle = Arc::new(oracle);
    let h = harness(page.clone(), oracle.clone());

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert_eq!(oracle.calls(), 3);
    assert_eq!(page.current_index(), 2);
    assert!(!result.success);
    assert_eq!(result.fields_filled, 0);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::Incomplete);
}

#[tokio::test]
async fn test_empty_next_target_does_not_block_submit_ready() {
    let page = Arc::new(FakePage::single(
        text_fields(FakeDocument::new(PAGE_1, "Review"), &["phone"])
            .with_element(FakeElement::button("submit", "Submit Application")),
    ));
    let decision = PageDecision::parse(
        r##"{
            "is_form_page": true,
            "page_type": "review",
            "autofill_commands": [{"selector": "#phone", "value": "555-0100", "field_name": null}],
            "next_button": {},
            "submit_button": {"selector": "#submit", "text": "Submit Application"}
        }"##,
    )
    .unwrap();
    let h = harness(page.clone(), Arc::new(ScriptedOracle::new().with_page(PAGE_1, decision)));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(result.submit_ready);
    assert!(!result.needs_more_navigation);
    assert_eq!(page.value_of("phone").as_deref(), Some("555-0100"));
    assert_eq!(page.clicks("submit"), 0);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::ReadyToSubmit);
}

#[tokio::test]
async fn test_confirmation_page_is_submit_ready() {
    let page = Arc::new(FakePage::single(FakeDocument::new(PAGE_1, "Thank you")));
    let oracle = ScriptedOracle::new().with_page(
        PAGE_1,
        PageDecision {
            page_type: "confirmation".into(),
            ..Default::default()
        },
    );
    let h = harness(page, Arc::new(oracle));

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(result.submit_ready);
    assert_eq!(result.page_type, "confirmation");
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::ReadyToSubmit);
}

#[tokio::test]
async fn test_page_cap_bounds_the_loop() {
    let urls: Vec<String> = (0..4).map(|i| format!("https://jobs.example.com/p/{}", i)).collect();
    let docs = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            FakeDocument::new(url, &format!("Page {}", i))
                .with_element(FakeElement::text_input("answer"))
                .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(i + 1)))
        })
        .collect();
    let page = Arc::new(FakePage::new(docs));
    let oracle = urls.iter().fold(ScriptedOracle::new(), |oracle, url| {
        oracle.with_page(url, with_next(form_decision(vec![mapping("#answer", json!("yes"))]), "#next"))
    });
    let oracle = Arc::new(oracle);
    let mut h = harness(page, oracle.clone());
    h.ctx.config = WorkflowConfig {
        max_pages: 2,
        ..WorkflowConfig::without_delays()
    };

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert_eq!(oracle.calls(), 2);
    assert_eq!(result.fields_filled, 2);
    assert!(result.needs_more_navigation);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::Completed);
}

#[tokio::test]
async fn test_resumed_session_is_reopened() {
    let page = two_step_form();
    let h = harness(page, Arc::new(two_step_oracle()));
    h.store.create("job-1", "profile-1", PAGE_1).await.unwrap();
    h.store
        .set_status("job-1", SessionStatus::CaptchaWaiting, None)
        .await
        .unwrap();

    let result = DefaultWorkflow::new().process_application(&h.ctx).await;

    assert!(result.submit_ready);
    assert_eq!(status_of(h.store.as_ref(), "job-1").await, SessionStatus::ReadyToSubmit);
}
