//! Form autofill for jobfill.
//!
//! Turns [`FillCommand`]s into page interactions:
//!
//! ```text
//!   FillCommand ──► AutofillEngine ──► ActionRegistry ──► ActionHandler
//!                        │                                    │
//!                        └──────────── ElementLocator ◄───────┘
//!                                           │
//!                                       PageDriver
//! ```
//!
//! Each handler tries the native interaction first and walks a fallback
//! chain when the page does not react. Runtime failures come back as
//! failed [`FillResult`]s; only malformed commands are errors.

pub mod actions;
pub mod command;
pub mod engine;
pub mod error;
pub mod locator;
pub mod registry;

pub use actions::{ActionContext, ActionHandler, ClearStrategy, run_handler};
pub use command::{
    ActionType, FillCommand, FillResult, SelectBy, SelectorType, WaitCondition, value_as_text,
};
pub use engine::{AutofillEngine, FailureSummary, ResultsSummary, summarize};
pub use error::AutofillError;
pub use locator::{ElementLocator, css_quote, xpath_literal};
pub use registry::{ActionRegistry, HandlerFactory};
