//! Application workflow for jobfill.
//!
//! Drives one browser page through a job application:
//!
//! ```text
//!             ┌──────────────────── JobRunner ───────────────────┐
//!             │  lease browser ─► navigate ─► PlatformStrategy    │
//!             └────────────────────────────────┬──────────────────┘
//!                                              │ per page
//!   PageExtractor ─► CaptchaDetector ─► DecisionOracle ─► AutofillEngine ─► navigate
//!        │                  │                                   │
//!        └──────────────── SessionStore ◄───────────────────────┘
//!                               │
//!                           Notifier
//! ```
//!
//! Every page's snapshot, field outcomes and navigation land in the
//! [`SessionStore`](session::SessionStore), so a job paused for a CAPTCHA or
//! a sign-in wall can be resumed from stored state.

pub mod captcha;
pub mod error;
pub mod extract;
pub mod notify;
pub mod oracle;
pub mod platforms;
pub mod runner;
pub mod session;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use captcha::{CaptchaDetection, CaptchaDetector, CaptchaKind};
pub use error::{NotifyError, OracleError, RunnerError, SessionError};
pub use extract::{PageExtractor, PageSnapshot};
pub use notify::{Notification, NotificationKind, Notifier, Priority};
pub use oracle::{AnalysisRequest, DecisionOracle, HttpOracle, JobContext, PageDecision};
pub use runner::{JobHandle, JobRequest, JobRunner};
pub use session::{ApplicationSession, FileSessionStore, MemorySessionStore, SessionStatus, SessionStore};
pub use workflow::{DefaultWorkflow, PauseReason, PlatformRegistry, PlatformStrategy, WorkflowContext, WorkflowResult};
