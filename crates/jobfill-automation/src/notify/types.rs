use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::extract::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CaptchaDetected,
    JobStarted,
    JobCompleted,
    JobFailed,
    JobPaused,
    ActionRequired,
    FormFilled,
    SubmitReady,
    Error,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        })
    }
}

/// Operator-facing event emitted by the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub job_id: Option<String>,
    pub profile_id: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub action_url: Option<String>,
    #[serde(default)]
    pub requires_action: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            job_id: None,
            profile_id: None,
            priority: Priority::Normal,
            data: Map::new(),
            action_url: None,
            requires_action: false,
            created_at: Utc::now(),
        }
    }

    /// Attach the job and point the action link at it.
    pub fn for_job(mut self, job_id: &str, profile_id: Option<&str>) -> Self {
        self.action_url = Some(format!("/jobs/{}", job_id));
        self.job_id = Some(job_id.to_string());
        self.profile_id = profile_id.map(str::to_string);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn requiring_action(mut self) -> Self {
        self.requires_action = true;
        self
    }

    pub fn captcha_detected(job_id: &str, profile_id: Option<&str>, captcha_type: &str, url: Option<&str>) -> Self {
        Self::new(
            NotificationKind::CaptchaDetected,
            "CAPTCHA Detected - Action Required",
            format!(
                "A {} CAPTCHA was detected on the job application page. Please solve it manually to continue.",
                captcha_type
            ),
        )
        .for_job(job_id, profile_id)
        .with_priority(Priority::Urgent)
        .requiring_action()
        .with_data("captcha_type", captcha_type)
        .with_data("url", url.map_or(Value::Null, |u| json!(u)))
    }

    pub fn job_paused(job_id: &str, profile_id: Option<&str>, reason: &str) -> Self {
        Self::new(NotificationKind::JobPaused, "Job Processing Paused", reason)
            .for_job(job_id, profile_id)
            .with_priority(Priority::High)
            .requiring_action()
    }

    pub fn action_required(job_id: &str, profile_id: Option<&str>, action_type: &str, message: &str) -> Self {
        Self::new(
            NotificationKind::ActionRequired,
            format!("Action Required: {}", action_type),
            message,
        )
        .for_job(job_id, profile_id)
        .with_priority(Priority::High)
        .requiring_action()
        .with_data("action_type", action_type)
    }

    pub fn job_completed(job_id: &str, profile_id: Option<&str>, fields_filled: usize, submit_ready: bool) -> Self {
        let (title, message) = if submit_ready {
            (
                "Application Ready for Submission",
                format!(
                    "Job application has been filled with {} fields and is ready for submission.",
                    fields_filled
                ),
            )
        } else {
            (
                "Application Processing Completed",
                format!("Job application processing completed. {} fields were filled.", fields_filled),
            )
        };
        Self::new(NotificationKind::JobCompleted, title, message)
            .for_job(job_id, profile_id)
            .with_data("fields_filled", fields_filled)
            .with_data("submit_ready", submit_ready)
    }

    pub fn job_failed(job_id: &str, profile_id: Option<&str>, error: &str) -> Self {
        Self::new(
            NotificationKind::JobFailed,
            "Job Processing Failed",
            format!(
                "An error occurred while processing the job application: {}",
                truncate_chars(error, 200)
            ),
        )
        .for_job(job_id, profile_id)
        .with_priority(Priority::High)
        .with_data("error", error)
    }

    pub fn error(message: &str, job_id: Option<&str>, details: Option<&str>) -> Self {
        let mut n = Self::new(NotificationKind::Error, "Error", message).with_priority(Priority::High);
        n.job_id = job_id.map(str::to_string);
        match details {
            Some(details) => n.with_data("details", details),
            None => n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captcha_notification_is_urgent_and_actionable() {
        let n = Notification::captcha_detected("job-7", Some("p-1"), "recaptcha", Some("https://a"));
        assert_eq!(n.title, "CAPTCHA Detected - Action Required");
        assert_eq!(n.priority, Priority::Urgent);
        assert!(n.requires_action);
        assert_eq!(n.action_url.as_deref(), Some("/jobs/job-7"));
        assert_eq!(n.data["captcha_type"], "recaptcha");
    }

    #[test]
    fn test_completed_wording_depends_on_submit_ready() {
        assert_eq!(
            Notification::job_completed("j", None, 5, true).title,
            "Application Ready for Submission"
        );
        let n = Notification::job_completed("j", None, 3, false);
        assert_eq!(n.title, "Application Processing Completed");
        assert_eq!(n.message, "Job application processing completed. 3 fields were filled.");
        assert_eq!(n.priority, Priority::Normal);
    }

    #[test]
    fn test_failed_message_truncates_error() {
        let long = "x".repeat(500);
        let n = Notification::job_failed("j", None, &long);
        assert!(n.message.ends_with(&"x".repeat(200)));
        assert!(!n.message.ends_with(&"x".repeat(201)));
        assert_eq!(n.data["error"].as_str().map(str::len), Some(500));
    }

    #[test]
    fn test_serialized_shape() {
        let n = Notification::action_required("j", None, "Sign In", "Please sign in");
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "action_required");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["title"], "Action Required: Sign In");
    }
}
