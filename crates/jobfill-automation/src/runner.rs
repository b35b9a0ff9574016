//! Job runner: one tokio task and one leased browser per job.
//!
//! A job keeps its browser while it is paused so a human can solve the
//! CAPTCHA or sign in on that same page; [`JobRunner::resume`] then picks
//! the application back up from the session. Every other outcome gives the
//! browser back to the pool.

use std::sync::Arc;

use dashmap::DashMap;
use jobfill_browser::{BrowserLease, BrowserPool, PageDriver};
use jobfill_config::{AutofillConfig, WorkflowConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{info, warn};

use crate::error::RunnerError;
use crate::notify::{self, Notification, NotificationKind, Notifier};
use crate::oracle::DecisionOracle;
use crate::session::{SessionStatus, SessionStore};
use crate::workflow::{PlatformRegistry, WorkflowContext, WorkflowResult, fail_job};

/// Session metadata key holding the applicant profile, for resumes.
pub const PROFILE_KEY: &str = "profile";
pub const BROWSER_GONE: &str = "browser session no longer available";

/// One application to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub url: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub profile: Value,
    /// Force a platform strategy instead of matching on the URL.
    #[serde(default)]
    pub platform: Option<String>,
}

impl JobRequest {
    pub fn new(job_id: impl Into<String>, url: impl Into<String>, profile: Value) -> Self {
        Self {
            job_id: job_id.into(),
            url: url.into(),
            profile_id: String::new(),
            profile,
            platform: None,
        }
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = profile_id.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

/// A submitted job's task.
pub struct JobHandle {
    job_id: String,
    handle: JoinHandle<WorkflowResult>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Wait for the job. A cancelled or panicked task comes back as a
    /// failed result.
    pub async fn wait(self) -> WorkflowResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => task_failure(&self.job_id, e),
        }
    }
}

fn task_failure(job_id: &str, e: JoinError) -> WorkflowResult {
    if e.is_cancelled() {
        info!(job_id, "Job cancelled");
        WorkflowResult::failed(0, "Job cancelled")
    } else {
        warn!(job_id, "Job task panicked: {}", e);
        WorkflowResult::failed(0, format!("Job task panicked: {}", e))
    }
}

/// Collaborators a job task needs; cheap to clone into the task.
#[derive(Clone)]
struct Shared {
    pool: Arc<BrowserPool>,
    platforms: Arc<PlatformRegistry>,
    oracle: Arc<dyn DecisionOracle>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    autofill: AutofillConfig,
    workflow: WorkflowConfig,
}

impl Shared {
    fn context(&self, job_id: &str, profile_id: &str, profile: Value, driver: Arc<dyn PageDriver>) -> WorkflowContext {
        WorkflowContext::new(
            job_id,
            profile_id,
            profile,
            driver,
            self.oracle.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
        .with_autofill(self.autofill.clone())
        .with_config(self.workflow.clone())
    }

    /// Fresh run: new session, navigate, pick a strategy, run.
    async fn run(self, lease: Arc<BrowserLease>, request: JobRequest) -> WorkflowResult {
        let job_id = request.job_id.clone();
        let ctx = self.context(&job_id, &request.profile_id, request.profile.clone(), lease.driver());

        let fresh = match self.store.get(&job_id).await {
            Ok(Some(session)) => !session.status.is_open(),
            Ok(None) => true,
            Err(e) => {
                warn!(job_id = %job_id, "Could not read session: {}", e);
                true
            }
        };
        if fresh {
            if let Err(e) = self.store.create(&job_id, &request.profile_id, &request.url).await {
                warn!(job_id = %job_id, "Could not create session: {}", e);
            }
        }
        ctx.set_metadata(PROFILE_KEY, request.profile.clone()).await;
        ctx.notify(
            Notification::new(
                NotificationKind::JobStarted,
                "Job Started",
                format!("Started processing application at {}", request.url),
            )
            .for_job(&job_id, ctx.profile_id()),
        )
        .await;

        info!(job_id = %job_id, url = %request.url, "Navigating to job");
        if let Err(e) = ctx.driver.navigate(&request.url).await {
            let failed = WorkflowResult::failed(0, format!("Navigation failed: {}", e));
            let result = fail_job(&ctx, failed).await;
            self.pool.release(&job_id).await;
            return result;
        }
        ctx.pause(self.workflow.after_navigation_ms).await;

        let strategy = self.platforms.resolve(request.platform.as_deref(), &request.url);
        info!(job_id = %job_id, platform = strategy.name(), "Strategy selected");
        let result = strategy.process_application(&ctx).await;
        self.finish(&job_id, result).await
    }

    /// Continue a paused job on the browser it kept.
    async fn resume(self, lease: Arc<BrowserLease>, platform: Option<String>, profile_id: String) -> WorkflowResult {
        let job_id = lease.job_id().to_string();
        let profile = self
            .store
            .get_metadata(&job_id, PROFILE_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or(Value::Null);
        let ctx = self.context(&job_id, &profile_id, profile, lease.driver());
        let url = ctx.driver.current_url().await.unwrap_or_default();

        let strategy = self.platforms.resolve(platform.as_deref(), &url);
        info!(job_id = %job_id, platform = strategy.name(), url = %url, "Resuming job");
        let result = strategy.process_application(&ctx).await;
        self.finish(&job_id, result).await
    }

    async fn finish(&self, job_id: &str, result: WorkflowResult) -> WorkflowResult {
        if result.paused {
            info!(job_id, "Job paused, keeping browser");
        } else {
            self.pool.release(job_id).await;
        }
        result
    }
}

/// Runs jobs concurrently, bounded by the browser pool.
pub struct JobRunner {
    shared: Shared,
    tasks: DashMap<String, AbortHandle>,
}

impl JobRunner {
    pub fn new(
        pool: Arc<BrowserPool>,
        platforms: Arc<PlatformRegistry>,
        oracle: Arc<dyn DecisionOracle>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shared: Shared {
                pool,
                platforms,
                oracle,
                store,
                notifier,
                autofill: AutofillConfig::default(),
                workflow: WorkflowConfig::default(),
            },
            tasks: DashMap::new(),
        }
    }

    pub fn with_autofill(mut self, autofill: AutofillConfig) -> Self {
        self.shared.autofill = autofill;
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.shared.workflow = workflow;
        self
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.shared.pool
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.shared.store
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.tasks.get(job_id).is_some_and(|h| !h.is_finished())
    }

    /// Job ids with a live task.
    pub fn in_flight(&self) -> Vec<String> {
        self.tasks.retain(|_, h| !h.is_finished());
        let mut ids: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Lease a browser and start the job in its own task.
    pub async fn submit(&self, request: JobRequest) -> Result<JobHandle, RunnerError> {
        let job_id = request.job_id.clone();
        if self.is_running(&job_id) {
            return Err(RunnerError::AlreadyRunning(job_id));
        }
        let lease = self.shared.pool.acquire(&job_id).await?;
        info!(job_id = %job_id, url = %request.url, "Job submitted");

        let handle = tokio::spawn(self.shared.clone().run(lease, request));
        Ok(self.track(job_id, handle))
    }

    /// Submit and wait.
    pub async fn run(&self, request: JobRequest) -> Result<WorkflowResult, RunnerError> {
        Ok(self.submit(request).await?.wait().await)
    }

    /// Pick up a paused job where it stopped.
    ///
    /// A browser that is gone (crashed, closed by hand) is not an error for
    /// the caller: the job is marked failed and a failed result comes back.
    pub async fn resume(&self, job_id: &str) -> Result<WorkflowResult, RunnerError> {
        if self.is_running(job_id) {
            return Err(RunnerError::AlreadyRunning(job_id.to_string()));
        }
        let session = self
            .shared
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| RunnerError::UnknownJob(job_id.to_string()))?;
        if !session.status.is_paused() {
            return Err(RunnerError::NotPaused(job_id.to_string()));
        }

        let lease = match self.shared.pool.get(job_id) {
            Some(lease) if lease.driver().is_alive().await => lease,
            _ => return Ok(self.browser_gone(job_id, session.current_page).await),
        };

        let platform = Some(session.platform.clone()).filter(|p| p != "unknown");
        let handle = tokio::spawn(self.shared.clone().resume(lease, platform, session.profile_id.clone()));
        Ok(self.track(job_id.to_string(), handle).wait().await)
    }

    /// Restart an unfinished job on a fresh browser, from the last page it
    /// reached and the profile and platform stored with it. This is how a
    /// job paused by an earlier process continues: that browser is gone.
    pub async fn reopen(&self, job_id: &str) -> Result<JobHandle, RunnerError> {
        let session = self
            .shared
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| RunnerError::UnknownJob(job_id.to_string()))?;
        if !session.status.is_open() {
            return Err(RunnerError::NotPaused(job_id.to_string()));
        }
        let profile = self
            .shared
            .store
            .get_metadata(job_id, PROFILE_KEY)
            .await?
            .unwrap_or(Value::Null);
        let url = session.navigation.last().cloned().unwrap_or_else(|| session.url.clone());
        let mut request = JobRequest::new(job_id, url, profile).with_profile_id(session.profile_id.clone());
        if session.platform != "unknown" {
            request = request.with_platform(session.platform.clone());
        }
        info!(job_id, url = %request.url, page = session.current_page, "Reopening job");
        self.submit(request).await
    }

    async fn browser_gone(&self, job_id: &str, page_number: usize) -> WorkflowResult {
        warn!(job_id, "Cannot resume: {}", BROWSER_GONE);
        self.shared.pool.release(job_id).await;
        if let Err(e) = self
            .shared
            .store
            .set_status(job_id, SessionStatus::Error, Some(BROWSER_GONE.to_string()))
            .await
        {
            warn!(job_id, "Could not record failure: {}", e);
        }
        notify::deliver(
            self.shared.notifier.as_ref(),
            Notification::job_failed(job_id, None, BROWSER_GONE),
        )
        .await;
        WorkflowResult::failed(page_number, BROWSER_GONE)
    }

    /// Abort the job's task and give its browser back. Returns whether
    /// there was anything to stop.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let task = self.tasks.remove(job_id).map(|(_, h)| h);
        let running = task.as_ref().is_some_and(|h| !h.is_finished());
        if let Some(task) = task {
            task.abort();
        }
        let released = self.shared.pool.release(job_id).await;
        if running || released {
            info!(job_id, "Job cancelled");
            if let Err(e) = self
                .shared
                .store
                .set_status(job_id, SessionStatus::Incomplete, Some("Cancelled".to_string()))
                .await
            {
                warn!(job_id, "Could not record cancellation: {}", e);
            }
        }
        running || released
    }

    /// Abort everything and close every browser.
    pub async fn shutdown(&self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
        self.tasks.clear();
        self.shared.pool.shutdown_all().await;
    }

    fn track(&self, job_id: String, handle: JoinHandle<WorkflowResult>) -> JobHandle {
        self.tasks.insert(job_id.clone(), handle.abort_handle());
        JobHandle { job_id, handle }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
