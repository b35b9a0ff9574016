use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use jobfill_autofill::{FillCommand, FillResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::PageSnapshot;

/// Where an application attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    CaptchaWaiting,
    AwaitingAuth,
    ReadyToSubmit,
    Completed,
    Incomplete,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::CaptchaWaiting => "captcha_waiting",
            SessionStatus::AwaitingAuth => "awaiting_auth",
            SessionStatus::ReadyToSubmit => "ready_to_submit",
            SessionStatus::Completed => "completed",
            SessionStatus::Incomplete => "incomplete",
            SessionStatus::Error => "error",
        }
    }

    /// Waiting on a human (CAPTCHA solve or sign-in).
    pub fn is_paused(&self) -> bool {
        matches!(self, SessionStatus::CaptchaWaiting | SessionStatus::AwaitingAuth)
    }

    /// Running or resumable.
    pub fn is_open(&self) -> bool {
        *self == SessionStatus::Active || self.is_paused()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one executed fill command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutcome {
    #[serde(default)]
    pub field_name: String,
    pub selector: Option<String>,
    pub action: String,
    pub value: Value,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FieldOutcome {
    pub fn from_result(command: &FillCommand, result: &FillResult) -> Self {
        Self {
            field_name: command.field_name().unwrap_or_default().to_string(),
            selector: result.selector.clone(),
            action: result.action.to_string(),
            value: result.value_used.clone(),
            success: result.success,
            error: result.error.clone(),
            duration_ms: result.duration_ms,
        }
    }
}

/// Durable record of one job-application attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSession {
    pub job_id: String,
    pub profile_id: String,
    pub url: String,
    pub status: SessionStatus,
    /// Always equal to `snapshots.len()`.
    pub current_page: usize,
    #[serde(default)]
    pub snapshots: Vec<PageSnapshot>,
    #[serde(default)]
    pub outcomes: Vec<FieldOutcome>,
    #[serde(default)]
    pub navigation: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default = "unknown_platform")]
    pub platform: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn unknown_platform() -> String {
    "unknown".to_string()
}

impl ApplicationSession {
    /// New active session; the start URL opens the navigation history.
    pub fn new(job_id: impl Into<String>, profile_id: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        let url = url.into();
        Self {
            job_id: job_id.into(),
            profile_id: profile_id.into(),
            navigation: vec![url.clone()],
            url,
            status: SessionStatus::Active,
            current_page: 0,
            snapshots: Vec::new(),
            outcomes: Vec::new(),
            metadata: HashMap::new(),
            platform: unknown_platform(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_snapshot(&mut self, mut snapshot: PageSnapshot) {
        snapshot.page_number = self.snapshots.len() + 1;
        self.snapshots.push(snapshot);
        self.current_page = self.snapshots.len();
        self.touch();
    }

    pub fn add_outcomes(&mut self, outcomes: impl IntoIterator<Item = FieldOutcome>) {
        self.outcomes.extend(outcomes);
        self.touch();
    }

    pub fn record_navigation(&mut self, url: impl Into<String>) {
        self.navigation.push(url.into());
        self.touch();
    }

    pub fn set_status(&mut self, status: SessionStatus, message: Option<String>) {
        self.status = status;
        if message.is_some() {
            self.error_message = message;
        }
        self.touch();
    }

    pub fn latest_snapshot(&self) -> Option<&PageSnapshot> {
        self.snapshots.last()
    }

    pub fn fields_filled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
