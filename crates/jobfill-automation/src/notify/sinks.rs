use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::{Notification, Notifier, Priority};
use crate::error::NotifyError;

/// Writes notifications to the tracing log, level by priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        let job_id = n.job_id.as_deref().unwrap_or("system");
        match n.priority {
            Priority::Urgent => error!(job_id, "[URGENT] {}: {}", n.title, n.message),
            Priority::High => warn!(job_id, "[HIGH] {}: {}", n.title, n.message),
            Priority::Normal => info!(job_id, "{}: {}", n.title, n.message),
            Priority::Low => debug!(job_id, "{}: {}", n.title, n.message),
        }
        Ok(())
    }
}

/// Appends one JSON line per notification to `{dir}/{job_id}.jsonl`.
pub struct JsonlNotifier {
    dir: PathBuf,
}

impl JsonlNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, job_id: Option<&str>) -> PathBuf {
        let stem: String = job_id
            .unwrap_or("system")
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.jsonl", stem))
    }
}

#[async_trait]
impl Notifier for JsonlNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(n)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(n.job_id.as_deref()))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps notifications in memory for querying.
#[derive(Default)]
pub struct MemoryNotifier {
    items: RwLock<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first, optionally for one job.
    pub fn recent(&self, limit: usize, job_id: Option<&str>) -> Vec<Notification> {
        let items = self.items.read();
        let mut matching: Vec<Notification> = items
            .iter()
            .filter(|n| job_id.is_none_or(|id| n.job_id.as_deref() == Some(id)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        matching
    }

    pub fn pending_actions(&self) -> Vec<Notification> {
        self.items
            .read()
            .iter()
            .filter(|n| n.requires_action)
            .cloned()
            .collect()
    }

    /// Remove everything, or only one job's. Returns how many went.
    pub fn clear(&self, job_id: Option<&str>) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        match job_id {
            Some(id) => items.retain(|n| n.job_id.as_deref() != Some(id)),
            None => items.clear(),
        }
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        self.items.write().push(n.clone());
        Ok(())
    }
}

/// Delivers to every sink. A failing sink is logged, the rest still run.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(n).await {
                warn!(kind = ?n.kind, "Notification sink failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{MockNotifier, NotificationKind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_jsonl_appends_per_job() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlNotifier::new(dir.path().join("notifications"));
        sink.notify(&Notification::job_completed("job-1", None, 2, false)).await.unwrap();
        sink.notify(&Notification::job_failed("job-1", None, "boom")).await.unwrap();
        sink.notify(&Notification::error("disk full", None, None)).await.unwrap();

        let job = std::fs::read_to_string(sink.path_for(Some("job-1"))).unwrap();
        let lines: Vec<Notification> = job.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].kind, NotificationKind::JobFailed);
        assert!(sink.path_for(None).ends_with("system.jsonl"));
        assert!(sink.path_for(None).exists());
    }

    #[tokio::test]
    async fn test_memory_queries() {
        let sink = MemoryNotifier::new();
        sink.notify(&Notification::job_completed("a", None, 1, false)).await.unwrap();
        sink.notify(&Notification::captcha_detected("b", None, "hcaptcha", None)).await.unwrap();
        sink.notify(&Notification::job_failed("a", None, "x")).await.unwrap();

        assert_eq!(sink.recent(10, Some("a")).len(), 2);
        assert_eq!(sink.recent(1, None).len(), 1);
        assert_eq!(sink.pending_actions().len(), 1);
        assert_eq!(sink.clear(Some("a")), 2);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.clear(None), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_survives_failing_sink() {
        let mut failing = MockNotifier::new();
        failing
            .expect_notify()
            .times(1)
            .returning(|_| Err(NotifyError::Delivery("offline".into())));
        let memory = Arc::new(MemoryNotifier::new());
        let fanout = FanoutNotifier::new().with(Arc::new(failing)).with(memory.clone());

        fanout.notify(&Notification::job_paused("j", None, "waiting")).await.unwrap();
        assert_eq!(memory.len(), 1);
        assert_eq!(fanout.len(), 2);
    }

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        let n = Notification::captcha_detected("j", None, "recaptcha", None);
        assert!(LogNotifier.notify(&n).await.is_ok());
    }
}
