//! Workday tenants (`*.myworkdayjobs.com` and friends).
//!
//! Flow for a fresh job:
//!
//! ```text
//!   listing ──► job context (oracle) ──► Apply ──► "Apply Manually" modal
//!      ──► sign-in wall? ──pause──► ... ──► form pages (max 15) ──► Review
//! ```
//!
//! A job resumed after sign-in starts straight at the form pages: the
//! listing phase only runs when the page is not already inside the
//! application.

mod actions;
pub mod selectors;
mod steps;

pub use actions::{CHECKBOX, DROPDOWN, MULTISELECT, RADIO, SEARCHABLE_SELECT, workday_registry};
pub use selectors::WorkdayTimings;
pub use steps::{WorkdayStep, detect_step, step_indicator};

use std::sync::Arc;

use async_trait::async_trait;
use jobfill_autofill::{ActionRegistry, AutofillEngine, ElementLocator, SelectorType};
use jobfill_config::AutofillConfig;
use tracing::{debug, info, warn};

use crate::extract::{PageSnapshot, truncate_chars};
use crate::notify::Notification;
use crate::oracle::{AnalysisRequest, JobContext, NavTarget};
use crate::session::SessionStatus;
use crate::workflow::navigation::{click_fallback, click_target};
use crate::workflow::{
    PageSignature, PauseReason, PlatformStrategy, Totals, VisitedPages, WorkflowContext, WorkflowResult, analyze,
    fail_job, fill_fields, pause_for_captcha,
};
use selectors::{
    APPLY_FALLBACKS, APPLY_MANUALLY, APPLY_MANUALLY_TARGETS, NEXT_BUTTON, POPUP_CLOSERS, SAVE_AND_CONTINUE,
};

pub const PLATFORM: &str = "workday";
pub const MAX_WORKDAY_PAGES: usize = 15;
/// Session metadata key for the [`JobContext`] read off the listing.
pub const JOB_INFO_KEY: &str = "job_info";
pub const AUTH_MESSAGE: &str = "Create Account/Sign In required. Please complete authentication to continue.";

const URL_MARKERS: &[&str] = &[
    "myworkdayjobs.com",
    "myworkdaysite.com",
    "workday.com/",
    "wd1.myworkday",
    "wd2.myworkday",
    "wd3.myworkday",
    "wd5.myworkday",
];

pub struct WorkdayStrategy {
    timings: WorkdayTimings,
    registry: Arc<ActionRegistry>,
}

impl WorkdayStrategy {
    pub fn new() -> Self {
        Self {
            timings: WorkdayTimings::default(),
            registry: workday_registry(),
        }
    }

    pub fn with_timings(mut self, timings: WorkdayTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn timings(&self) -> &WorkdayTimings {
        &self.timings
    }

    /// Engine with the Workday handlers and one retry per field.
    fn engine(&self, ctx: &WorkflowContext) -> AutofillEngine {
        let config = AutofillConfig {
            default_timeout_ms: ctx.autofill.default_timeout_ms.max(self.timings.element_visible_ms),
            ..ctx.autofill.clone()
        };
        AutofillEngine::with_registry(ctx.driver.clone(), config, self.registry.clone())
            .with_retry(1, self.timings.retry_delay_ms)
    }

    async fn detect(&self, ctx: &WorkflowContext, locator: &ElementLocator) -> WorkdayStep {
        let url = ctx.driver.current_url().await.unwrap_or_default();
        let html = ctx.driver.page_source().await.unwrap_or_default();
        detect_step(locator, &url, &html).await
    }

    /// Close cookie banners and stray modals. Returns how many were closed.
    async fn dismiss_popups(&self, ctx: &WorkflowContext, locator: &ElementLocator) -> usize {
        let mut closed = 0;
        for (selector, selector_type) in POPUP_CLOSERS {
            let Some(el) = locator.first_visible(selector, *selector_type).await else {
                continue;
            };
            if locator.click_with_fallback(&el).await.is_ok() {
                debug!(selector, "Closed popup");
                closed += 1;
                ctx.pause(500.min(self.timings.after_click_ms)).await;
            }
        }
        closed
    }

    async fn job_context(&self, ctx: &WorkflowContext) -> Option<JobContext> {
        let stored = ctx.get_metadata(JOB_INFO_KEY).await?;
        serde_json::from_value(stored).ok()
    }

    /// Listing phase: read the job description, then click Apply.
    async fn start_from_listing(&self, ctx: &WorkflowContext, locator: &ElementLocator) -> Result<(), WorkflowResult> {
        let snapshot = ctx
            .extract()
            .await
            .map_err(|e| WorkflowResult::failed(0, format!("Browser session lost: {}", e)))?;
        let page_number = ctx.record_snapshot(snapshot.clone()).await;

        let apply_selector = match tokio::time::timeout(ctx.oracle_timeout(), ctx.oracle.describe_job(&snapshot)).await {
            Ok(Ok(job)) => {
                info!(job_id = %ctx.job_id, title = %job.job_title, company = %job.company_name, "Job context extracted");
                match serde_json::to_value(&job) {
                    Ok(value) => ctx.set_metadata(JOB_INFO_KEY, value).await,
                    Err(e) => warn!(job_id = %ctx.job_id, "Could not encode job context: {}", e),
                }
                job.apply_button_selector
            }
            Ok(Err(e)) => {
                warn!(job_id = %ctx.job_id, "Job context extraction failed: {}", e);
                None
            }
            Err(_) => {
                warn!(job_id = %ctx.job_id, "Job context extraction timed out");
                None
            }
        };

        let oracle_click = match apply_selector.filter(|s| !s.trim().is_empty()) {
            Some(selector) => {
                let selector_type = if selector.starts_with('/') {
                    SelectorType::Xpath
                } else {
                    SelectorType::Css
                };
                let target = NavTarget {
                    selector,
                    selector_type,
                    text: "Apply".to_string(),
                };
                click_target(locator, &target, "apply").await
            }
            None => false,
        };
        if !oracle_click && !click_fallback(locator, APPLY_FALLBACKS, "apply").await {
            return Err(WorkflowResult::failed(page_number, "Could not find or click Apply button"));
        }

        ctx.pause(self.timings.after_click_ms).await;
        if let Ok(url) = ctx.driver.current_url().await {
            ctx.record_navigation(&url).await;
        }
        Ok(())
    }

    async fn pause_for_auth(&self, ctx: &WorkflowContext, result: WorkflowResult) -> WorkflowResult {
        warn!(job_id = %ctx.job_id, "Sign-in required, pausing");
        ctx.notify(Notification::action_required(
            &ctx.job_id,
            ctx.profile_id(),
            "Authentication Required",
            "Please create an account or sign in to continue with the Workday application.",
        ))
        .await;
        ctx.set_status(SessionStatus::AwaitingAuth, Some(AUTH_MESSAGE.to_string()))
            .await;
        let mut paused = result.paused_for(PauseReason::AuthWall {
            message: AUTH_MESSAGE.to_string(),
        });
        paused.needs_more_navigation = true;
        paused.with_platform(PLATFORM).with_page_type(WorkdayStep::CreateAccount.as_str())
    }

    async fn ready_to_submit(&self, ctx: &WorkflowContext, mut result: WorkflowResult) -> WorkflowResult {
        info!(job_id = %ctx.job_id, filled = result.fields_filled, "Ready for submission");
        ctx.set_status(SessionStatus::ReadyToSubmit, None).await;
        ctx.notify(Notification::job_completed(
            &ctx.job_id,
            ctx.profile_id(),
            result.fields_filled,
            true,
        ))
        .await;
        result.success = true;
        result.submit_ready = true;
        result.needs_more_navigation = false;
        result.with_platform(PLATFORM)
    }

    /// Whether Workday's bottom button exists, and whether it says Submit.
    async fn bottom_navigation(&self, locator: &ElementLocator) -> (bool, bool) {
        let Some(button) = locator.first_visible(NEXT_BUTTON, SelectorType::Css).await else {
            return (false, false);
        };
        let text = locator.driver().text(&button).await.unwrap_or_default();
        (true, text.to_lowercase().contains("submit"))
    }

    /// Analyze and fill one form page.
    async fn fill_page(
        &self,
        ctx: &WorkflowContext,
        engine: &AutofillEngine,
        snapshot: PageSnapshot,
        step: WorkdayStep,
    ) -> WorkflowResult {
        let page_number = ctx.record_snapshot(snapshot.clone()).await;
        let job = self.job_context(ctx).await;
        let request = AnalysisRequest::new(snapshot, ctx.profile.clone()).with_hint(page_hint(step, job.as_ref()));

        let decision = match analyze(ctx, request).await {
            Ok(decision) => decision,
            Err(e) => {
                return WorkflowResult::failed(page_number, format!("AI analysis failed: {}", e))
                    .with_platform(PLATFORM)
                    .with_page_type(step.as_str());
            }
        };

        let tally = fill_fields(ctx, engine, &decision, self.timings.after_fill_ms).await;
        let (has_bottom_next, is_submit) = self.bottom_navigation(engine.locator()).await;
        let has_next = has_bottom_next || decision.has_next();
        WorkflowResult {
            success: tally.filled > 0 || tally.failed == 0,
            page_number,
            fields_filled: tally.filled,
            fields_failed: tally.failed,
            needs_more_navigation: has_next && !is_submit,
            submit_ready: is_submit,
            unmapped_fields: decision.unmapped_fields,
            ..WorkflowResult::default()
        }
        .with_platform(PLATFORM)
        .with_page_type(step.as_str())
    }

    async fn form_pages(&self, ctx: &WorkflowContext, engine: &AutofillEngine) -> WorkflowResult {
        let locator = engine.locator();
        let mut totals = Totals::default();
        let mut visited = VisitedPages::new();
        let mut page_number = 0;
        let mut needs_navigation = false;

        for index in 0..MAX_WORKDAY_PAGES {
            self.dismiss_popups(ctx, locator).await;
            let snapshot = match ctx.extract().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let failed = WorkflowResult::failed(page_number, format!("Browser session lost: {}", e));
                    return fail_job(ctx, totals.apply(failed).with_platform(PLATFORM)).await;
                }
            };
            let html = ctx.driver.page_source().await.unwrap_or_default();
            let step = detect_step(locator, &snapshot.url, &html).await;
            let indicator = step_indicator(locator).await;
            let signature = PageSignature::of(&snapshot).with_step(&format!("{}:{}", step, indicator));
            if !visited.visit(signature) {
                info!(job_id = %ctx.job_id, step = %step, "Workday page already processed, stopping");
                break;
            }
            info!(job_id = %ctx.job_id, page = index + 1, step = %step, progress = %indicator, "Processing Workday page");

            let captcha = ctx.detector.detect(ctx.driver.as_ref(), &snapshot.filtered_html).await;
            if captcha.detected {
                let url = snapshot.url.clone();
                page_number = ctx.record_snapshot(snapshot).await;
                let paused = pause_for_captcha(ctx, &captcha, WorkflowResult::ok(page_number), &url).await;
                return totals.apply(paused).with_platform(PLATFORM);
            }
            match step {
                WorkdayStep::CreateAccount => {
                    return self.pause_for_auth(ctx, totals.apply(WorkflowResult::ok(page_number))).await;
                }
                WorkdayStep::Review => {
                    page_number = ctx.record_snapshot(snapshot).await;
                    let review = totals.apply(WorkflowResult::ok(page_number)).with_page_type(step.as_str());
                    return self.ready_to_submit(ctx, review).await;
                }
                _ => {}
            }

            let result = self.fill_page(ctx, engine, snapshot, step).await;
            page_number = page_number.max(result.page_number);
            totals.add(&result);
            if result.is_error() {
                return fail_job(ctx, totals.apply(result)).await;
            }
            if result.submit_ready {
                let done = totals.apply(WorkflowResult::ok(page_number)).with_page_type(step.as_str());
                return self.ready_to_submit(ctx, done).await;
            }

            needs_navigation = result.needs_more_navigation;
            if !needs_navigation {
                info!(job_id = %ctx.job_id, "No further navigation on this page");
                break;
            }
            if !click_fallback(locator, SAVE_AND_CONTINUE, "save and continue").await {
                warn!(job_id = %ctx.job_id, "Could not click Save and Continue");
                break;
            }
            ctx.pause(self.timings.after_click_ms).await;
            if let Ok(url) = ctx.driver.current_url().await {
                ctx.record_navigation(&url).await;
            }
        }

        let status = if totals.filled > 0 {
            SessionStatus::Completed
        } else {
            SessionStatus::Incomplete
        };
        ctx.set_status(status, None).await;
        if totals.filled > 0 {
            ctx.notify(Notification::job_completed(&ctx.job_id, ctx.profile_id(), totals.filled, false))
                .await;
        }
        info!(job_id = %ctx.job_id, filled = totals.filled, failed = totals.failed, status = %status, "Workday application finished");

        let mut finished = totals.apply(WorkflowResult::ok(page_number)).with_platform(PLATFORM);
        finished.success = totals.filled > 0;
        finished.needs_more_navigation = needs_navigation;
        finished
    }
}

impl Default for WorkdayStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Extra prompt context: the current step, the job, and the widget kinds
/// this run understands.
fn page_hint(step: WorkdayStep, job: Option<&JobContext>) -> String {
    let mut hint = format!(
        "Workday application step: {}.\n\
         Workday widgets: use \"{}\" for type-to-search prompts, \"{}\" for prompts taking several values, \
         \"{}\" for dropdown buttons, \"{}\" and \"{}\" for checkboxes and radio questions. \
         Prefer data-automation-id selectors.",
        step, SEARCHABLE_SELECT, MULTISELECT, DROPDOWN, CHECKBOX, RADIO
    );
    if let Some(job) = job {
        let requirements = if job.requirements.is_empty() {
            "N/A".to_string()
        } else {
            job.requirements.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        };
        let description = if job.job_description.is_empty() {
            "N/A".to_string()
        } else {
            truncate_chars(&job.job_description, 2000)
        };
        hint.push_str(&format!(
            "\n\n=== JOB CONTEXT (use this to answer job-related questions) ===\n\
             Job Title: {}\nCompany: {}\nLocation: {}\nJob Type: {}\nDescription: {}\nRequirements: {}",
            job.job_title, job.company_name, job.location, job.job_type, description, requirements
        ));
    }
    hint
}

#[async_trait]
impl PlatformStrategy for WorkdayStrategy {
    fn name(&self) -> &str {
        PLATFORM
    }

    fn matches_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        URL_MARKERS.iter().any(|m| url.contains(m))
    }

    async fn process_page(&self, ctx: &WorkflowContext) -> WorkflowResult {
        let engine = self.engine(ctx);
        self.dismiss_popups(ctx, engine.locator()).await;
        let snapshot = match ctx.extract().await {
            Ok(snapshot) => snapshot,
            Err(e) => return WorkflowResult::failed(0, format!("Browser session lost: {}", e)).with_platform(PLATFORM),
        };
        let step = self.detect(ctx, engine.locator()).await;
        self.fill_page(ctx, &engine, snapshot, step).await
    }

    async fn process_application(&self, ctx: &WorkflowContext) -> WorkflowResult {
        let engine = self.engine(ctx);
        let locator = engine.locator();
        let start_url = ctx.driver.current_url().await.unwrap_or_default();
        ctx.ensure_session(&start_url).await;
        ctx.set_platform(PLATFORM).await;
        info!(job_id = %ctx.job_id, url = %start_url, "Starting Workday application");

        self.dismiss_popups(ctx, locator).await;
        let mut step = self.detect(ctx, locator).await;
        if !step.in_application() {
            if let Err(failed) = self.start_from_listing(ctx, locator).await {
                return fail_job(ctx, failed.with_platform(PLATFORM)).await;
            }
            step = self.detect(ctx, locator).await;
            debug!(job_id = %ctx.job_id, step = %step, "After Apply");
        }

        if step == WorkdayStep::StartApplicationModal {
            locator
                .wait_for_clickable(APPLY_MANUALLY, SelectorType::Css, self.timings.modal_appear_ms)
                .await;
            if click_fallback(locator, APPLY_MANUALLY_TARGETS, "apply manually").await {
                ctx.pause(self.timings.after_click_ms).await;
            } else {
                warn!(job_id = %ctx.job_id, "Could not handle the start-application modal");
            }
            step = self.detect(ctx, locator).await;
        }

        if step == WorkdayStep::CreateAccount {
            let page_number = ctx.page_count().await;
            return self.pause_for_auth(ctx, WorkflowResult::ok(page_number)).await;
        }

        self.form_pages(ctx, &engine).await
    }
}

#[cfg(test)]
#[path = "workday_tests.rs"]
mod tests;
