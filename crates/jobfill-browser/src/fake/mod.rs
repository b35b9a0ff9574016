//! Scripted in-memory page for tests.
//!
//! A [`FakePage`] is a list of [`FakeDocument`]s, one of which is current.
//! Elements match the lookups they were registered with (plus `#key` and
//! their `name` attribute), clicks can move to another document, and every
//! interaction is recorded as a [`FakeEvent`] so tests can assert on what
//! the engine actually did.

mod element;
mod page;

pub use element::{ClickEffect, FakeDocument, FakeElement};
pub use page::{FakeEvent, FakePage};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::BrowserError;
use crate::launcher::{BrowserLauncher, BrowserProcess, LaunchedBrowser};

/// Launcher that hands out pre-built fake pages per job id.
#[derive(Default)]
pub struct FakeLauncher {
    pages: Mutex<HashMap<String, Arc<FakePage>>>,
    launched: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail: Mutex<Option<String>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` to the next launch for `job_id`.
    pub fn with_page(self, job_id: &str, page: Arc<FakePage>) -> Self {
        self.pages.lock().insert(job_id.to_string(), page);
        self
    }

    /// Make every launch fail with this message.
    pub fn failing(self, message: &str) -> Self {
        *self.fail.lock() = Some(message.to_string());
        self
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, job_id: &str) -> Result<LaunchedBrowser, BrowserError> {
        if let Some(message) = self.fail.lock().clone() {
            return Err(BrowserError::LaunchFailed(message));
        }
        let page = self
            .pages
            .lock()
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(FakePage::blank()));
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(LaunchedBrowser {
            driver: page,
            process: Some(Box::new(FakeProcess {
                closed: self.closed.clone(),
            })),
        })
    }
}

struct FakeProcess {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    async fn close(&mut self) -> Result<(), BrowserError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
