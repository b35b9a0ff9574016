//! Application workflows.
//!
//! A [`PlatformStrategy`] drives one job through its pages. The
//! [`DefaultWorkflow`] works on any site; platform strategies (see
//! [`crate::platforms`]) override selectors, waits and flow for hosts they
//! recognise. [`PlatformRegistry`] picks one per job:
//!
//! ```text
//!   platform name ──► exact match ──┐
//!   job URL ────────► URL match ────┼──► strategy ──► process_application
//!                     default ──────┘
//! ```

mod context;
mod default;
pub mod navigation;
mod registry;
mod result;
mod signature;

pub use context::WorkflowContext;
pub use default::{DefaultWorkflow, FillTally};
pub use registry::PlatformRegistry;
pub use result::{PauseReason, WorkflowResult};
pub use signature::{PageSignature, VisitedPages};

pub(crate) use default::{Totals, analyze, fail_job, fill_fields, pause_for_captcha};

use async_trait::async_trait;

/// How jobs on one kind of site are processed.
#[async_trait]
pub trait PlatformStrategy: Send + Sync {
    /// Registry key, e.g. `"workday"`.
    fn name(&self) -> &str;

    /// Whether this strategy recognises the job URL.
    fn matches_url(&self, url: &str) -> bool;

    /// Process only the page currently loaded.
    async fn process_page(&self, ctx: &WorkflowContext) -> WorkflowResult;

    /// Drive the application from the current page until it is ready to
    /// submit, paused, stuck or failed.
    async fn process_application(&self, ctx: &WorkflowContext) -> WorkflowResult;
}
