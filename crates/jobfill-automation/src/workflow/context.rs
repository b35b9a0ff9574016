use std::sync::Arc;
use std::time::Duration;

use jobfill_autofill::{FillCommand, FillResult};
use jobfill_browser::PageDriver;
use jobfill_config::{AutofillConfig, WorkflowConfig};
use serde_json::Value;
use tracing::warn;

use crate::captcha::CaptchaDetector;
use crate::error::SessionError;
use crate::extract::{PageExtractor, PageSnapshot};
use crate::notify::{self, Notification, Notifier};
use crate::oracle::DecisionOracle;
use crate::session::{FieldOutcome, SessionStatus, SessionStore};

/// Everything one job's run works with. Collaborators are injected so
/// tests can swap any of them.
#[derive(Clone)]
pub struct WorkflowContext {
    pub job_id: String,
    pub profile_id: String,
    pub profile: Value,
    pub driver: Arc<dyn PageDriver>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub store: Arc<dyn SessionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub detector: CaptchaDetector,
    pub autofill: AutofillConfig,
    pub config: WorkflowConfig,
}

impl WorkflowContext {
    pub fn new(
        job_id: impl Into<String>,
        profile_id: impl Into<String>,
        profile: Value,
        driver: Arc<dyn PageDriver>,
        oracle: Arc<dyn DecisionOracle>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            profile_id: profile_id.into(),
            profile,
            driver,
            oracle,
            store,
            notifier,
            detector: CaptchaDetector::new(),
            autofill: AutofillConfig::default(),
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_autofill(mut self, autofill: AutofillConfig) -> Self {
        self.autofill = autofill;
        self
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profile_id(&self) -> Option<&str> {
        Some(self.profile_id.as_str()).filter(|p| !p.is_empty())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.oracle_timeout_secs)
    }

    pub async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    pub async fn extract(&self) -> Result<PageSnapshot, jobfill_browser::DriverError> {
        PageExtractor::new(self.driver.clone()).extract().await
    }

    /// Make sure a session exists for this job; an existing one is reopened.
    pub async fn ensure_session(&self, url: &str) {
        let outcome = match self.store.get(&self.job_id).await {
            Ok(Some(session)) if session.status != SessionStatus::Active => {
                self.store.set_status(&self.job_id, SessionStatus::Active, None).await
            }
            Ok(Some(_)) => Ok(()),
            Ok(None) => self
                .store
                .create(&self.job_id, &self.profile_id, url)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        self.logged(outcome, "open session");
    }

    /// Record the snapshot; returns the job's page count.
    pub async fn record_snapshot(&self, snapshot: PageSnapshot) -> usize {
        match self.store.add_snapshot(&self.job_id, snapshot).await {
            Ok(page) => page,
            Err(e) => {
                warn!(job_id = %self.job_id, "Could not record snapshot: {}", e);
                0
            }
        }
    }

    /// Pages recorded so far; 0 when there is no session.
    pub async fn page_count(&self) -> usize {
        match self.store.get(&self.job_id).await {
            Ok(Some(session)) => session.current_page,
            _ => 0,
        }
    }

    pub async fn record_outcomes(&self, commands: &[FillCommand], results: &[FillResult]) {
        let outcomes = commands
            .iter()
            .zip(results)
            .map(|(c, r)| FieldOutcome::from_result(c, r))
            .collect();
        let outcome = self.store.add_outcomes(&self.job_id, outcomes).await;
        self.logged(outcome, "record outcomes");
    }

    pub async fn set_status(&self, status: SessionStatus, message: Option<String>) {
        let outcome = self.store.set_status(&self.job_id, status, message).await;
        self.logged(outcome, "set status");
    }

    pub async fn set_metadata(&self, key: &str, value: Value) {
        let outcome = self.store.set_metadata(&self.job_id, key, value).await;
        self.logged(outcome, "store metadata");
    }

    pub async fn get_metadata(&self, key: &str) -> Option<Value> {
        self.store.get_metadata(&self.job_id, key).await.ok().flatten()
    }

    pub async fn set_platform(&self, platform: &str) {
        let outcome = self.store.set_platform(&self.job_id, platform).await;
        self.logged(outcome, "store platform");
    }

    pub async fn record_navigation(&self, url: &str) {
        let outcome = self.store.record_navigation(&self.job_id, url).await;
        self.logged(outcome, "record navigation");
    }

    pub async fn notify(&self, notification: Notification) {
        notify::deliver(self.notifier.as_ref(), notification).await;
    }

    fn logged(&self, outcome: Result<(), SessionError>, what: &str) {
        if let Err(e) = outcome {
            warn!(job_id = %self.job_id, "Session store failed to {}: {}", what, e);
        }
    }
}
