//! The decision oracle: an external service that reads a page snapshot and
//! a profile and answers with fill commands and navigation targets.

mod decision;
mod http;

pub use decision::{FieldMapping, JobContext, NavTarget, PageDecision, strip_code_fences};
pub use http::HttpOracle;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::OracleError;
use crate::extract::PageSnapshot;

/// What the oracle is asked about one page.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub snapshot: PageSnapshot,
    pub profile: Value,
    /// Platform-specific guidance appended to the instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl AnalysisRequest {
    pub fn new(snapshot: PageSnapshot, profile: Value) -> Self {
        Self {
            snapshot,
            profile,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Map the page onto fill commands and navigation targets.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PageDecision, OracleError>;

    /// Read job details off a listing page.
    async fn describe_job(&self, snapshot: &PageSnapshot) -> Result<JobContext, OracleError> {
        let _ = snapshot;
        Err(OracleError::Unsupported("describe_job".to_string()))
    }
}
