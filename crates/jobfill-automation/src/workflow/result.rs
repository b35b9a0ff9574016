use std::fmt;

use serde::{Deserialize, Serialize};

use crate::captcha::CaptchaKind;

/// Why a job stopped to wait for a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PauseReason {
    Captcha { kind: CaptchaKind },
    AuthWall { message: String },
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Captcha { kind } => {
                write!(f, "CAPTCHA detected: {}. Please solve and click Continue.", kind)
            }
            PauseReason::AuthWall { message } => f.write_str(message),
        }
    }
}

/// Outcome of processing one page or a whole application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    /// Pages recorded for the job so far.
    pub page_number: usize,
    pub fields_filled: usize,
    pub fields_failed: usize,
    pub needs_more_navigation: bool,
    pub submit_ready: bool,
    pub captcha_detected: bool,
    pub captcha_type: Option<CaptchaKind>,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub pause: Option<PauseReason>,
    pub unmapped_fields: Vec<String>,
    pub platform: String,
    pub page_type: String,
    pub error: Option<String>,
}

impl Default for WorkflowResult {
    fn default() -> Self {
        Self {
            success: false,
            page_number: 0,
            fields_filled: 0,
            fields_failed: 0,
            needs_more_navigation: false,
            submit_ready: false,
            captcha_detected: false,
            captcha_type: None,
            paused: false,
            pause_reason: None,
            pause: None,
            unmapped_fields: Vec::new(),
            platform: "unknown".to_string(),
            page_type: "unknown".to_string(),
            error: None,
        }
    }
}

impl WorkflowResult {
    pub fn ok(page_number: usize) -> Self {
        Self {
            success: true,
            page_number,
            ..Default::default()
        }
    }

    pub fn failed(page_number: usize, error: impl Into<String>) -> Self {
        Self {
            page_number,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Mark as paused. CAPTCHA pauses also set the captcha flags.
    pub fn paused_for(mut self, reason: PauseReason) -> Self {
        if let PauseReason::Captcha { kind } = &reason {
            self.captcha_detected = true;
            self.captcha_type = Some(*kind);
        }
        self.success = true;
        self.paused = true;
        self.pause_reason = Some(reason.to_string());
        self.pause = Some(reason);
        self
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    pub fn with_page_type(mut self, page_type: &str) -> Self {
        self.page_type = page_type.to_string();
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
