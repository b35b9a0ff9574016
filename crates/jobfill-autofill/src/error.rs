//! Autofill error types.

use jobfill_browser::DriverError;
use thiserror::Error;

use crate::command::SelectorType;

/// Failures inside the locator and the action handlers.
///
/// The engine converts everything except [`AutofillError::InvalidCommand`]
/// into a failed [`FillResult`](crate::FillResult).
#[derive(Debug, Error)]
pub enum AutofillError {
    #[error("Element not found: {selector_type}={selector}")]
    ElementNotFound {
        selector_type: SelectorType,
        selector: String,
    },

    #[error("Action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    /// Rejected before any element lookup ran.
    #[error("Action '{action}' failed: {message}")]
    Skipped { action: String, message: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl AutofillError {
    pub fn not_found(selector_type: SelectorType, selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector_type,
            selector: selector.into(),
        }
    }

    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn skipped(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Skipped {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Whether the target was never located (as opposed to located but
    /// not operable). Commands rejected before the lookup count as unlocated.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. } | Self::Skipped { .. } | Self::Driver(DriverError::NoSuchElement(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AutofillError::not_found(SelectorType::Css, "#email");
        assert_eq!(err.to_string(), "Element not found: css=#email");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_action_failed_display() {
        let err = AutofillError::failed("check", "state did not change");
        assert_eq!(err.to_string(), "Action 'check' failed: state did not change");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_skipped_is_not_located() {
        let err = AutofillError::skipped("upload_file", "File not found: /x.pdf");
        assert_eq!(err.to_string(), "Action 'upload_file' failed: File not found: /x.pdf");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_driver_no_such_element_counts_as_not_found() {
        let err: AutofillError = DriverError::NoSuchElement("#x".into()).into();
        assert!(err.is_not_found());
        let err: AutofillError = DriverError::Closed.into();
        assert!(!err.is_not_found());
    }
}
