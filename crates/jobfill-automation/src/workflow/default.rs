//! The generic page-by-page state machine.

use async_trait::async_trait;
use jobfill_autofill::AutofillEngine;
use tracing::{info, warn};

use super::navigation;
use super::signature::{PageSignature, VisitedPages};
use super::{PauseReason, PlatformStrategy, WorkflowContext, WorkflowResult};
use crate::captcha::CaptchaDetection;
use crate::error::OracleError;
use crate::extract::PageSnapshot;
use crate::notify::Notification;
use crate::oracle::{AnalysisRequest, PageDecision};
use crate::session::SessionStatus;

/// Filled/failed counts from one batch of fill commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillTally {
    pub filled: usize,
    pub failed: usize,
}

/// Running totals across the pages of one application.
#[derive(Debug, Clone, Default)]
pub(crate) struct Totals {
    pub filled: usize,
    pub failed: usize,
    pub unmapped: Vec<String>,
}

impl Totals {
    pub fn add(&mut self, result: &WorkflowResult) {
        self.filled += result.fields_filled;
        self.failed += result.fields_failed;
        self.unmapped.extend(result.unmapped_fields.iter().cloned());
    }

    /// `result` with its counts replaced by the totals.
    pub fn apply(&self, mut result: WorkflowResult) -> WorkflowResult {
        result.fields_filled = self.filled;
        result.fields_failed = self.failed;
        result.unmapped_fields = self.unmapped.clone();
        result
    }
}

/// Run the oracle's fill commands as one continue-on-error batch and
/// record every outcome in the session. `settle_ms` is the pause after
/// each field.
pub(crate) async fn fill_fields(
    ctx: &WorkflowContext,
    engine: &AutofillEngine,
    decision: &PageDecision,
    settle_ms: u64,
) -> FillTally {
    let mut commands = decision.commands();
    if commands.is_empty() {
        return FillTally::default();
    }
    for command in commands.iter_mut() {
        command.wait_after_ms = settle_ms;
    }
    let results = engine.execute_all(&commands).await;
    ctx.record_outcomes(&commands, &results).await;
    let filled = results.iter().filter(|r| r.success).count();
    let tally = FillTally {
        filled,
        failed: results.len() - filled,
    };
    info!(job_id = %ctx.job_id, filled = tally.filled, failed = tally.failed, "Fields filled");
    tally
}

/// Ask the oracle about `snapshot`, bounded by the configured timeout.
pub(crate) async fn analyze(ctx: &WorkflowContext, request: AnalysisRequest) -> Result<PageDecision, OracleError> {
    match tokio::time::timeout(ctx.oracle_timeout(), ctx.oracle.analyze(&request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(OracleError::Timeout(ctx.config.oracle_timeout_secs)),
    }
}

/// Stop for a human to solve a CAPTCHA. Whatever was filled stays filled.
pub(crate) async fn pause_for_captcha(
    ctx: &WorkflowContext,
    detection: &CaptchaDetection,
    result: WorkflowResult,
    url: &str,
) -> WorkflowResult {
    let kind = detection.kind;
    warn!(job_id = %ctx.job_id, kind = %kind, confidence = detection.confidence, "CAPTCHA detected, pausing");
    ctx.notify(Notification::captcha_detected(&ctx.job_id, ctx.profile_id(), kind.as_str(), Some(url)))
        .await;
    ctx.set_status(
        SessionStatus::CaptchaWaiting,
        Some(format!("CAPTCHA detected ({}). Waiting for user.", kind)),
    )
    .await;
    result.paused_for(PauseReason::Captcha { kind })
}

/// Record a terminal failure and tell the operator.
pub(crate) async fn fail_job(ctx: &WorkflowContext, result: WorkflowResult) -> WorkflowResult {
    if let Some(error) = &result.error {
        warn!(job_id = %ctx.job_id, "Application failed: {}", error);
        ctx.set_status(SessionStatus::Error, Some(error.clone())).await;
        ctx.notify(Notification::job_failed(&ctx.job_id, ctx.profile_id(), error)).await;
    }
    result
}

/// Strategy used when no platform-specific one claims the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkflow;

impl DefaultWorkflow {
    pub fn new() -> Self {
        Self
    }

    /// One page: record, check for CAPTCHA, consult the oracle, fill.
    /// Returns the decision too so the caller can navigate from it.
    pub(crate) async fn run_page(
        &self,
        ctx: &WorkflowContext,
        engine: &AutofillEngine,
        snapshot: PageSnapshot,
    ) -> (WorkflowResult, Option<PageDecision>) {
        let url = snapshot.url.clone();
        let captcha = ctx.detector.detect(ctx.driver.as_ref(), &snapshot.filtered_html).await;
        let page_number = ctx.record_snapshot(snapshot.clone()).await;

        let decision = match analyze(ctx, AnalysisRequest::new(snapshot, ctx.profile.clone())).await {
            Ok(decision) => decision,
            Err(e) if captcha.detected => {
                warn!(job_id = %ctx.job_id, "Analysis failed on a CAPTCHA page: {}", e);
                let paused = pause_for_captcha(ctx, &captcha, WorkflowResult::ok(page_number), &url).await;
                return (paused, None);
            }
            Err(e) => {
                warn!(job_id = %ctx.job_id, url = %url, "Page analysis failed: {}", e);
                return (
                    WorkflowResult::failed(page_number, format!("AI analysis failed: {}", e)),
                    None,
                );
            }
        };
        info!(
            job_id = %ctx.job_id,
            page = page_number,
            platform = %decision.platform,
            page_type = %decision.page_type,
            is_form = decision.is_form_page,
            "Page analyzed"
        );

        let tally = fill_fields(ctx, engine, &decision, ctx.config.between_fields_ms).await;
        let has_next = decision.has_next();
        let has_submit = decision.has_submit();
        let mut result = WorkflowResult {
            page_number,
            fields_filled: tally.filled,
            fields_failed: tally.failed,
            unmapped_fields: decision.unmapped_fields.clone(),
            ..WorkflowResult::default()
        }
        .with_platform(&decision.platform)
        .with_page_type(&decision.page_type);

        if captcha.detected {
            result.needs_more_navigation = has_next;
            result.submit_ready = has_submit && !has_next;
            return (pause_for_captcha(ctx, &captcha, result, &url).await, Some(decision));
        }

        if !decision.is_form_page && decision.autofill_commands.is_empty() {
            let page_type = decision.page_type.as_str();
            if page_type == "job_listing" || decision.has_apply() {
                result.success = true;
                result.needs_more_navigation = true;
            } else if page_type == "confirmation" || (page_type == "review_page" && has_submit) {
                result.success = true;
                result.submit_ready = true;
            } else if has_next || has_submit {
                result.success = true;
                result.needs_more_navigation = true;
            } else {
                result.error = Some(format!(
                    "Page type '{}' with no form fields or navigation buttons.",
                    page_type
                ));
            }
            return (result, Some(decision));
        }

        result.success = tally.filled > 0 || tally.failed == 0;
        result.needs_more_navigation = has_next;
        result.submit_ready = has_submit && !has_next;
        (result, Some(decision))
    }
}

#[async_trait]
impl PlatformStrategy for DefaultWorkflow {
    fn name(&self) -> &str {
        "default"
    }

    fn matches_url(&self, _url: &str) -> bool {
        false
    }

    async fn process_page(&self, ctx: &WorkflowContext) -> WorkflowResult {
        let engine = AutofillEngine::new(ctx.driver.clone(), ctx.autofill.clone());
        match ctx.extract().await {
            Ok(snapshot) => self.run_page(ctx, &engine, snapshot).await.0,
            Err(e) => WorkflowResult::failed(0, format!("Browser session lost: {}", e)),
        }
    }

    async fn process_application(&self, ctx: &WorkflowContext) -> WorkflowResult {
        let engine = AutofillEngine::new(ctx.driver.clone(), ctx.autofill.clone());
        let start_url = ctx.driver.current_url().await.unwrap_or_default();
        ctx.ensure_session(&start_url).await;
        info!(job_id = %ctx.job_id, url = %start_url, "Processing application");

        let mut totals = Totals::default();
        let mut visited = VisitedPages::new();
        let mut no_progress = 0;
        let mut needs_navigation = false;
        let mut page_number = 0;
        let mut platform = "unknown".to_string();

        for iteration in 0..ctx.config.max_pages {
            let snapshot = match ctx.extract().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let failed = WorkflowResult::failed(page_number, format!("Browser session lost: {}", e));
                    return fail_job(ctx, totals.apply(failed).with_platform(&platform)).await;
                }
            };
            if !visited.visit(PageSignature::of(&snapshot)) {
                info!(job_id = %ctx.job_id, url = %snapshot.url, "Page already processed, stopping");
                break;
            }
            info!(job_id = %ctx.job_id, iteration = iteration + 1, url = %snapshot.url, "Processing page");

            let (result, decision) = self.run_page(ctx, &engine, snapshot).await;
            page_number = page_number.max(result.page_number);
            if result.platform != "unknown" {
                platform = result.platform.clone();
            }
            totals.add(&result);

            if result.paused {
                info!(job_id = %ctx.job_id, filled = totals.filled, "Paused for human action");
                return totals.apply(result).with_platform(&platform);
            }
            if result.is_error() {
                return fail_job(ctx, totals.apply(result).with_platform(&platform)).await;
            }

            needs_navigation = result.needs_more_navigation;
            if result.fields_filled == 0 && !result.submit_ready {
                no_progress += 1;
                if no_progress >= ctx.config.max_no_progress {
                    info!(job_id = %ctx.job_id, pages = no_progress, "No progress, stopping");
                    break;
                }
            } else {
                no_progress = 0;
            }

            if result.submit_ready {
                info!(job_id = %ctx.job_id, filled = totals.filled, "Ready for submission");
                ctx.set_status(SessionStatus::ReadyToSubmit, None).await;
                ctx.notify(Notification::job_completed(&ctx.job_id, ctx.profile_id(), totals.filled, true))
                    .await;
                let mut done = totals.apply(WorkflowResult::ok(page_number)).with_platform(&platform);
                done.submit_ready = true;
                done.page_type = result.page_type;
                return done;
            }

            if result.needs_more_navigation {
                let decision = decision.unwrap_or_default();
                if navigation::advance(engine.locator(), &decision, result.fields_filled).await.is_some() {
                    ctx.pause(ctx.config.after_click_ms).await;
                    if let Ok(url) = ctx.driver.current_url().await {
                        ctx.record_navigation(&url).await;
                    }
                    continue;
                }
                info!(job_id = %ctx.job_id, "Could not navigate, stopping");
                break;
            }
            break;
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
        info!(job_id = %ctx.job_id, filled = totals.filled, failed = totals.failed, status = %status, "Application finished");

        let mut finished = totals.apply(WorkflowResult::ok(page_number)).with_platform(&platform);
        finished.success = totals.filled > 0;
        finished.needs_more_navigation = needs_navigation;
        finished
    }
}

#[cfg(test)]
#[path = "default_tests.rs"]
mod tests;
