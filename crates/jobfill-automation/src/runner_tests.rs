use std::sync::Arc;

use jobfill_browser::fake::{ClickEffect, FakeDocument, FakeElement, FakeLauncher, FakePage};
use jobfill_browser::{PoolError, PageDriver};
use jobfill_config::PoolConfig;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::captcha::PROBE_MARKER;
use crate::notify::MemoryNotifier;
use crate::session::MemorySessionStore;
use crate::testing::{ScriptedOracle, form_decision, mapping, with_next, with_submit};

const PAGE_1: &str = "https://jobs.example.com/apply/1";
const PAGE_2: &str = "https://jobs.example.com/apply/2";

struct Rig {
    runner: JobRunner,
    launcher: Arc<FakeLauncher>,
    store: Arc<MemorySessionStore>,
    notifier: Arc<MemoryNotifier>,
    _dir: TempDir,
}

fn rig(launcher: FakeLauncher, oracle: ScriptedOracle, max_browsers: usize) -> Rig {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(launcher);
    let pool = Arc::new(BrowserPool::new(
        PoolConfig {
            max_browsers,
            acquire_timeout_ms: 0,
        },
        launcher.clone(),
        dir.path().join("shots"),
    ));
    let store = Arc::new(MemorySessionStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let runner = JobRunner::new(
        pool,
        Arc::new(PlatformRegistry::with_builtin()),
        Arc::new(oracle),
        store.clone(),
        notifier.clone(),
    )
    .with_autofill(AutofillConfig::without_delays())
    .with_workflow(WorkflowConfig::without_delays());
    Rig {
        runner,
        launcher,
        store,
        notifier,
        _dir: dir,
    }
}

fn request(job_id: &str) -> JobRequest {
    JobRequest::new(job_id, PAGE_1, json!({"first_name": "Ada", "email": "ada@example.com"})).with_profile_id("p-1")
}

fn one_page_form() -> Arc<FakePage> {
    Arc::new(FakePage::single(
        FakeDocument::new(PAGE_1, "Apply")
            .with_element(FakeElement::text_input("first_name"))
            .with_element(FakeElement::button("submit", "Submit Application")),
    ))
}

fn one_page_oracle() -> ScriptedOracle {
    ScriptedOracle::new().with_page(
        PAGE_1,
        with_submit(form_decision(vec![mapping("#first_name", json!("Ada"))]), "#submit"),
    )
}

/// First page shows a CAPTCHA; the second one is the last.
fn captcha_then_submit() -> Arc<FakePage> {
    let first = FakeDocument::new(PAGE_1, "Apply")
        .with_element(FakeElement::text_input("first_name"))
        .with_element(FakeElement::button("next", "Next").on_click(ClickEffect::GoTo(1)))
        .with_script(PROBE_MARKER, json!({"found": true, "type": "recaptcha", "visible": true}));
    let second = FakeDocument::new(PAGE_2, "Apply")
        .with_element(FakeElement::text_input("phone"))
        .with_element(FakeElement::button("submit", "Submit"));
    Arc::new(FakePage::new(vec![first, second]))
}

fn captcha_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .with_page(
            PAGE_1,
            with_next(form_decision(vec![mapping("#first_name", json!("Ada"))]), "#next"),
        )
        .with_page(
            PAGE_2,
            with_submit(form_decision(vec![mapping("#phone", json!("555-0100"))]), "#submit"),
        )
}

async fn status(rig: &Rig, job_id: &str) -> SessionStatus {
    rig.store.require(job_id).await.unwrap().status
}

#[tokio::test]
async fn test_submit_runs_job_and_releases_browser() {
    let page = one_page_form();
    let rig = rig(FakeLauncher::new().with_page("job-1", page.clone()), one_page_oracle(), 2);

    let handle = rig.runner.submit(request("job-1")).await.unwrap();
    assert_eq!(handle.job_id(), "job-1");
    assert_eq!(rig.runner.in_flight(), vec!["job-1".to_string()]);
    let result = handle.wait().await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.submit_ready);
    assert_eq!(page.value_of("first_name").as_deref(), Some("Ada"));
    assert_eq!(rig.launcher.closed(), 1);
    assert_eq!(rig.runner.pool().active_count(), 0);
    assert!(rig.runner.in_flight().is_empty());

    let session = rig.store.require("job-1").await.unwrap();
    assert_eq!(session.status, SessionStatus::ReadyToSubmit);
    assert_eq!(session.profile_id, "p-1");
    assert_eq!(session.metadata[PROFILE_KEY]["first_name"], "Ada");
    assert!(
        rig.notifier
            .recent(10, Some("job-1"))
            .iter()
            .any(|n| n.kind == NotificationKind::JobStarted)
    );
}

#[tokio::test]
async fn test_duplicate_submit_is_rejected() {
    let rig = rig(FakeLauncher::new().with_page("job-1", one_page_form()), one_page_oracle(), 2);

    let first = rig.runner.submit(request("job-1")).await.unwrap();
    let err = rig.runner.submit(request("job-1")).await.err().unwrap();
    assert!(matches!(err, RunnerError::AlreadyRunning(ref id) if id == "job-1"));

    first.wait().await;
    assert_eq!(rig.launcher.launched(), 1);
}

#[tokio::test]
async fn test_full_pool_rejects_new_jobs() {
    let rig = rig(FakeLauncher::new().with_page("a", one_page_form()), one_page_oracle(), 1);

    let a = rig.runner.submit(request("a")).await.unwrap();
    let err = rig.runner.submit(request("b")).await.err().unwrap();
    assert!(matches!(err, RunnerError::Unavailable(PoolError::Exhausted { max: 1 })));

    a.wait().await;
    assert_eq!(rig.runner.pool().available_slots(), 1);
}

#[tokio::test]
async fn test_navigation_failure_fails_job() {
    let page = Arc::new(FakePage::single(FakeDocument::new("https://elsewhere.example", "Other")));
    let rig = rig(FakeLauncher::new().with_page("job-1", page), ScriptedOracle::new(), 1);

    let result = rig.runner.run(request("job-1")).await.unwrap();

    assert!(result.error.as_deref().unwrap().starts_with("Navigation failed:"));
    assert_eq!(status(&rig, "job-1").await, SessionStatus::Error);
    assert_eq!(rig.launcher.closed(), 1);
}

#[tokio::test]
async fn test_pause_keeps_browser_and_resume_finishes() {
    let page = captcha_then_submit();
    let rig = rig(FakeLauncher::new().with_page("job-1", page.clone()), captcha_oracle(), 1);

    let paused = rig.runner.run(request("job-1")).await.unwrap();
    assert!(paused.paused);
    assert!(paused.captcha_detected);
    assert!(rig.runner.pool().get("job-1").is_some());
    assert_eq!(rig.launcher.closed(), 0);
    assert_eq!(status(&rig, "job-1").await, SessionStatus::CaptchaWaiting);

    // The human solves the challenge and moves on.
    page.navigate(PAGE_2).await.unwrap();

    let resumed = rig.runner.resume("job-1").await.unwrap();
    assert!(resumed.success, "{:?}", resumed.error);
    assert!(resumed.submit_ready);
    assert_eq!(page.value_of("phone").as_deref(), Some("555-0100"));
    assert_eq!(status(&rig, "job-1").await, SessionStatus::ReadyToSubmit);
    assert_eq!(rig.runner.pool().active_count(), 0);
    assert_eq!(rig.launcher.closed(), 1);

    let session = rig.store.require("job-1").await.unwrap();
    assert_eq!(session.current_page, 2);
}

#[tokio::test]
async fn test_resume_with_dead_browser_fails_cleanly() {
    let page = captcha_then_submit();
    let rig = rig(FakeLauncher::new().with_page("job-1", page.clone()), captcha_oracle(), 1);
    assert!(rig.runner.run(request("job-1")).await.unwrap().paused);

    page.kill();
    let result = rig.runner.resume("job-1").await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(BROWSER_GONE));
    let session = rig.store.require("job-1").await.unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(session.error_message.as_deref(), Some(BROWSER_GONE));
    assert_eq!(rig.runner.pool().active_count(), 0);
}

#[tokio::test]
async fn test_resume_needs_a_paused_session() {
    let rig = rig(FakeLauncher::new().with_page("job-1", one_page_form()), one_page_oracle(), 1);

    assert!(matches!(
        rig.runner.resume("nope").await,
        Err(RunnerError::UnknownJob(_))
    ));

    rig.runner.run(request("job-1")).await.unwrap();
    assert!(matches!(
        rig.runner.resume("job-1").await,
        Err(RunnerError::NotPaused(_))
    ));
}

#[tokio::test]
async fn test_cancel_aborts_and_releases() {
    let rig = rig(FakeLauncher::new().with_page("job-1", one_page_form()), one_page_oracle(), 1);

    let handle = rig.runner.submit(request("job-1")).await.unwrap();
    assert!(rig.runner.cancel("job-1").await);

    let result = handle.wait().await;
    assert_eq!(result.error.as_deref(), Some("Job cancelled"));
    assert_eq!(rig.launcher.closed(), 1);
    assert!(rig.runner.in_flight().is_empty());
    assert!(!rig.runner.cancel("job-1").await);
}

#[tokio::test]
async fn test_reopen_continues_stored_history_on_new_browser() {
    let page = captcha_then_submit();
    let rig = rig(FakeLauncher::new().with_page("job-1", page.clone()), captcha_oracle(), 1);
    assert!(rig.runner.run(request("job-1")).await.unwrap().paused);

    // The process holding the browser went away.
    rig.runner.pool().release("job-1").await;

    let again = rig.runner.reopen("job-1").await.unwrap().wait().await;
    assert!(again.paused);
    assert_eq!(rig.launcher.launched(), 2);

    let session = rig.store.require("job-1").await.unwrap();
    assert_eq!(session.current_page, 2);
    assert_eq!(session.profile_id, "p-1");
    assert_eq!(session.status, SessionStatus::CaptchaWaiting);
}

#[tokio::test]
async fn test_reopen_rejects_finished_jobs() {
    let rig = rig(FakeLauncher::new().with_page("job-1", one_page_form()), one_page_oracle(), 1);
    rig.runner.run(request("job-1")).await.unwrap();

    assert!(matches!(
        rig.runner.reopen("job-1").await.err(),
        Some(RunnerError::NotPaused(_))
    ));
}
