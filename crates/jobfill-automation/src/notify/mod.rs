//! Operator notifications.
//!
//! The workflow emits [`Notification`]s through a [`Notifier`]. Delivery is
//! best effort: [`deliver`] logs a failed sink and carries on.

mod sinks;
mod types;
mod webhook;

pub use sinks::{FanoutNotifier, JsonlNotifier, LogNotifier, MemoryNotifier};
pub use types::{Notification, NotificationKind, Priority};
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use tracing::warn;

use crate::error::NotifyError;

/// A destination for notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Send and swallow the error; a sink outage never stops a job.
pub async fn deliver(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.notify(&notification).await {
        warn!(
            kind = ?notification.kind,
            job_id = notification.job_id.as_deref().unwrap_or("system"),
            "Notification delivery failed: {}",
            e
        );
    }
}
