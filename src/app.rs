//! Wiring: builds the runner and its collaborators from configuration.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use jobfill_automation::notify::{FanoutNotifier, JsonlNotifier, LogNotifier, WebhookNotifier};
use jobfill_automation::{FileSessionStore, HttpOracle, JobRunner, Notifier, PlatformRegistry};
use jobfill_browser::{BrowserPool, ChromeLauncher};
use jobfill_config::Config;

/// Open the on-disk session store.
pub(crate) async fn open_store(config: &Config) -> anyhow::Result<Arc<FileSessionStore>> {
    let dir = &config.session.storage_dir;
    let store = FileSessionStore::new(dir.clone())
        .await
        .with_context(|| format!("opening session store at {}", dir.display()))?;
    Ok(Arc::new(store))
}

/// Log sink always, plus JSONL and webhook sinks when configured.
pub(crate) fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let mut fanout = FanoutNotifier::new().with(Arc::new(LogNotifier));
    if let Some(dir) = &config.notify.jsonl_dir {
        info!("Writing notifications to {}", dir.display());
        fanout = fanout.with(Arc::new(JsonlNotifier::new(dir.clone())));
    }
    if let Some(url) = &config.notify.webhook_url {
        let webhook = WebhookNotifier::new(url.clone(), config.notify.webhook_timeout_secs)
            .context("building webhook notifier")?;
        fanout = fanout.with(Arc::new(webhook));
    }
    Ok(Arc::new(fanout))
}

/// Everything a job needs, assembled from `config`.
pub(crate) async fn build_runner(config: &Config) -> anyhow::Result<JobRunner> {
    let oracle = HttpOracle::new(&config.oracle, config.workflow.oracle_timeout_secs)
        .context("decision oracle is not configured; set oracle.api_key")?;
    let store = open_store(config).await?;
    let notifier = build_notifier(config)?;

    let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
    let pool = Arc::new(BrowserPool::new(
        config.pool.clone(),
        launcher,
        config.browser.screenshot_dir.clone(),
    ));
    let platforms = PlatformRegistry::with_builtin();
    info!(
        max_browsers = config.pool.max_browsers,
        platforms = ?platforms.platforms(),
        "Runner ready"
    );
    if config.browser.headless {
        warn!("Running headless: CAPTCHA and sign-in pauses cannot be handled by hand");
    }

    Ok(JobRunner::new(pool, Arc::new(platforms), Arc::new(oracle), store, notifier)
        .with_autofill(config.autofill.clone())
        .with_workflow(config.workflow.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfill_automation::SessionStore;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.session.storage_dir = dir.path().join("sessions");
        config
    }

    #[tokio::test]
    async fn test_store_is_created_on_demand() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&config(&dir)).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(dir.path().join("sessions").is_dir());
    }

    #[tokio::test]
    async fn test_runner_requires_oracle_key() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.oracle.api_key = None;
        let err = build_runner(&config).await.err().unwrap();
        assert!(err.to_string().contains("oracle.api_key"));
    }

    #[tokio::test]
    async fn test_runner_builds_with_key() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.oracle.api_key = Some("sk-test".into());
        config.notify.jsonl_dir = Some(dir.path().join("notes"));
        let runner = build_runner(&config).await.unwrap();
        assert_eq!(runner.pool().active_count(), 0);
        assert!(runner.in_flight().is_empty());
    }
}
