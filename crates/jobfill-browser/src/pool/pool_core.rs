//! BrowserPool core: acquisition, lookup, release.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobfill_config::PoolConfig;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::PoolError;
use crate::driver::PageDriver;
use crate::launcher::{BrowserLauncher, BrowserProcess};

/// A browser held by one job.
pub struct BrowserLease {
    id: Uuid,
    job_id: String,
    driver: Arc<dyn PageDriver>,
    created_at: DateTime<Utc>,
    process: tokio::sync::Mutex<Option<Box<dyn BrowserProcess>>>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl std::fmt::Debug for BrowserLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserLease")
            .field("id", &self.id)
            .field("job_id", &self.job_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl BrowserLease {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn driver(&self) -> Arc<dyn PageDriver> {
        self.driver.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Close the process and give the slot back. Safe to call twice.
    async fn shutdown(&self) {
        if let Some(mut process) = self.process.lock().await.take() {
            if let Err(e) = process.close().await {
                warn!(job_id = %self.job_id, "Error closing browser: {}", e);
            }
        }
        self.permit.lock().take();
    }
}

/// Marks a job as launching; unmarks it on drop, including when the
/// acquiring future is cancelled.
struct Reservation<'a> {
    launching: &'a Mutex<HashSet<String>>,
    job_id: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.launching.lock().remove(self.job_id);
    }
}

/// Bounded set of browsers keyed by job id.
pub struct BrowserPool {
    config: PoolConfig,
    launcher: Arc<dyn BrowserLauncher>,
    semaphore: Arc<Semaphore>,
    leases: Mutex<HashMap<String, Arc<BrowserLease>>>,
    /// Jobs whose browser is being launched right now.
    launching: Mutex<HashSet<String>>,
    screenshot_dir: PathBuf,
    closed: AtomicBool,
}

impl BrowserPool {
    pub fn new(config: PoolConfig, launcher: Arc<dyn BrowserLauncher>, screenshot_dir: PathBuf) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_browsers));
        Self {
            config,
            launcher,
            semaphore,
            leases: Mutex::new(HashMap::new()),
            launching: Mutex::new(HashSet::new()),
            screenshot_dir,
            closed: AtomicBool::new(false),
        }
    }

    pub fn max_browsers(&self) -> usize {
        self.config.max_browsers
    }

    /// Claim a slot and launch a browser for `job_id`.
    pub async fn acquire(&self, job_id: &str) -> Result<Arc<BrowserLease>, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown);
        }

        let _reservation = {
            let leases = self.leases.lock();
            let mut launching = self.launching.lock();
            if leases.contains_key(job_id) || !launching.insert(job_id.to_string()) {
                return Err(PoolError::AlreadyLeased(job_id.to_string()));
            }
            Reservation {
                launching: &self.launching,
                job_id,
            }
        };

        self.acquire_reserved(job_id).await
    }

    async fn acquire_reserved(&self, job_id: &str) -> Result<Arc<BrowserLease>, PoolError> {
        let permit = self.take_permit().await?;

        let launched = self.launcher.launch(job_id).await?;
        let lease = Arc::new(BrowserLease {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            driver: launched.driver,
            created_at: Utc::now(),
            process: tokio::sync::Mutex::new(launched.process),
            permit: Mutex::new(Some(permit)),
        });

        self.leases.lock().insert(job_id.to_string(), lease.clone());
        info!(
            job_id,
            lease = %lease.id,
            active = self.active_count(),
            max = self.config.max_browsers,
            "Browser leased"
        );
        Ok(lease)
    }

    async fn take_permit(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        let exhausted = || PoolError::Exhausted {
            max: self.config.max_browsers,
        };

        if self.config.acquire_timeout_ms == 0 {
            return self.semaphore.clone().try_acquire_owned().map_err(|_| exhausted());
        }

        let wait = Duration::from_millis(self.config.acquire_timeout_ms);
        match tokio::time::timeout(wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(PoolError::ShutDown),
            Err(_) => Err(exhausted()),
        }
    }

    /// The live lease for a job, if any.
    pub fn get(&self, job_id: &str) -> Option<Arc<BrowserLease>> {
        self.leases.lock().get(job_id).cloned()
    }

    /// Close the job's browser. Returns false when nothing was leased.
    pub async fn release(&self, job_id: &str) -> bool {
        let lease = self.leases.lock().remove(job_id);
        match lease {
            Some(lease) => {
                lease.shutdown().await;
                debug!(job_id, "Browser released");
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.leases.lock().len()
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn leased_jobs(&self) -> Vec<String> {
        self.leases.lock().keys().cloned().collect()
    }

    /// Write a PNG of the job's page to `{job}_{name}_{lease8}.png`.
    pub async fn screenshot(&self, job_id: &str, name: &str) -> Result<PathBuf, PoolError> {
        let lease = self
            .get(job_id)
            .ok_or_else(|| PoolError::NotLeased(job_id.to_string()))?;
        let png = lease.driver.screenshot().await?;

        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let short = lease.id.simple().to_string();
        let file = self.screenshot_dir.join(format!(
            "{}_{}_{}.png",
            sanitize(job_id),
            sanitize(name),
            &short[..8]
        ));
        tokio::fs::write(&file, png).await?;
        debug!(job_id, path = %file.display(), "Saved screenshot");
        Ok(file)
    }

    /// Release every browser and refuse new leases.
    pub async fn shutdown_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let leases: Vec<Arc<BrowserLease>> = self.leases.lock().drain().map(|(_, l)| l).collect();
        for lease in leases {
            lease.shutdown().await;
        }
        self.semaphore.close();
        info!("Browser pool shut down");
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
