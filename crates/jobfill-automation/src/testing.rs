//! Shared fixtures for this crate's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use jobfill_browser::fake::FakePage;
use jobfill_config::{AutofillConfig, WorkflowConfig};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::OracleError;
use crate::extract::PageSnapshot;
use crate::notify::MemoryNotifier;
use crate::oracle::{AnalysisRequest, DecisionOracle, FieldMapping, JobContext, NavTarget, PageDecision};
use crate::session::MemorySessionStore;
use crate::workflow::WorkflowContext;

/// Oracle answering from a URL → decision table.
#[derive(Default)]
pub struct ScriptedOracle {
    pages: Mutex<Vec<(String, Result<PageDecision, String>)>>,
    job: Option<JobContext>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, decision: PageDecision) -> Self {
        self.pages.lock().push((url.to_string(), Ok(decision)));
        self
    }

    pub fn failing_on(self, url: &str, message: &str) -> Self {
        self.pages.lock().push((url.to_string(), Err(message.to_string())));
        self
    }

    pub fn with_job(mut self, job: JobContext) -> Self {
        self.job = Some(job);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PageDecision, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = &request.snapshot.url;
        match self.pages.lock().iter().find(|(u, _)| u == url) {
            Some((_, Ok(decision))) => Ok(decision.clone()),
            Some((_, Err(message))) => Err(OracleError::Http(message.clone())),
            None => Err(OracleError::Malformed(format!("no scripted decision for {}", url))),
        }
    }

    async fn describe_job(&self, _snapshot: &PageSnapshot) -> Result<JobContext, OracleError> {
        self.job
            .clone()
            .ok_or_else(|| OracleError::Unsupported("describe_job".into()))
    }
}

pub fn mapping(selector: &str, value: Value) -> FieldMapping {
    serde_json::from_value(json!({
        "selector": selector,
        "value": value,
        "field_name": selector.trim_start_matches('#'),
    }))
    .unwrap()
}

pub fn form_decision(mappings: Vec<FieldMapping>) -> PageDecision {
    PageDecision {
        is_form_page: true,
        page_type: "form_page".into(),
        autofill_commands: mappings,
        ..Default::default()
    }
}

pub fn with_next(mut decision: PageDecision, selector: &str) -> PageDecision {
    decision.next_button = Some(NavTarget::css(selector, "Next"));
    decision
}

pub fn with_submit(mut decision: PageDecision, selector: &str) -> PageDecision {
    decision.submit_button = Some(NavTarget::css(selector, "Submit"));
    decision
}

pub struct Harness {
    pub ctx: WorkflowContext,
    pub store: Arc<MemorySessionStore>,
    pub notifier: Arc<MemoryNotifier>,
}

pub fn harness(page: Arc<FakePage>, oracle: Arc<dyn DecisionOracle>) -> Harness {
    let store = Arc::new(MemorySessionStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let ctx = WorkflowContext::new(
        "job-1",
        "profile-1",
        json!({"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}),
        page,
        oracle,
        store.clone(),
        notifier.clone(),
    )
    .with_autofill(AutofillConfig::without_delays())
    .with_config(WorkflowConfig::without_delays());
    Harness { ctx, store, notifier }
}
