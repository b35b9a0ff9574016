//! Browser layer for jobfill.
//!
//! Everything above this crate talks to a page through the [`PageDriver`]
//! trait. The production implementation is [`CdpDriver`], which speaks the
//! Chrome DevTools Protocol to a Chrome instance started by
//! [`ChromeLauncher`]:
//!
//! ```text
//! ┌──────────────┐   acquire/release   ┌─────────────┐   WebSocket/CDP   ┌────────┐
//! │ job runner   │ ◄─────────────────► │ BrowserPool │ ◄───────────────► │ Chrome │
//! └──────────────┘                     └─────────────┘                   └────────┘
//! ```
//!
//! Each job gets its own browser (fresh profile directory, own debugging
//! port). The pool is bounded; when it is full, `acquire` fails fast with
//! [`PoolError::Exhausted`].
//!
//! With the `testing` feature the [`fake`] module provides a scripted
//! in-memory page so the layers above can be tested without Chrome.

pub mod cdp;
pub mod driver;
mod error;
pub mod keys;
mod launcher;
pub mod pool;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use cdp::{CdpClient, CdpError, PageSession};
pub use driver::{By, CdpDriver, DriverError, ElementRef, ElementState, PageDriver, ScriptArg, SelectOption};
pub use error::BrowserError;
pub use launcher::{BrowserLauncher, BrowserProcess, ChromeLauncher, LaunchedBrowser};
pub use pool::{BrowserLease, BrowserPool, PoolError};
