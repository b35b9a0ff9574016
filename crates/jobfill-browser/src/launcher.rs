//! Chrome process launching.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jobfill_config::BrowserConfig;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::driver::{CdpDriver, PageDriver};
use crate::error::BrowserError;

/// A browser started for one lease. Dropping it without `close` leaks nothing
/// but the process, which `kill_on_drop` also reaps.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// What a launcher hands back to the pool.
pub struct LaunchedBrowser {
    pub driver: Arc<dyn PageDriver>,
    pub process: Option<Box<dyn BrowserProcess>>,
}

/// Starts one isolated browser per job.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, job_id: &str) -> Result<LaunchedBrowser, BrowserError>;
}

/// Launches a fresh Chrome with a throwaway profile and its own debug port.
pub struct ChromeLauncher {
    config: BrowserConfig,
    next_port_offset: AtomicU16,
}

const PORT_SPAN: u16 = 1000;
const READY_POLL: Duration = Duration::from_millis(200);

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            next_port_offset: AtomicU16::new(0),
        }
    }

    /// Find a Chrome executable for this platform.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let candidates: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];

        #[cfg(target_os = "linux")]
        let candidates: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let candidates: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let candidates: &[&str] = &[];

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Command-line flags for a pooled, automation-friendly instance.
    pub fn chrome_args(&self, port: u16, profile_dir: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            format!(
                "--window-size={},{}",
                self.config.window_width, self.config.window_height
            ),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Next port in the span that nothing is listening on.
    fn pick_port(&self) -> Result<u16, BrowserError> {
        let base = self.config.base_debug_port;
        for _ in 0..50 {
            let offset = self.next_port_offset.fetch_add(1, Ordering::SeqCst) % PORT_SPAN;
            let port = base.saturating_add(offset);
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                return Ok(port);
            }
        }
        Err(BrowserError::NoFreePort(base))
    }

    async fn wait_until_ready(&self, endpoint: &str, child: &mut Child) -> Result<(), BrowserError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.launch_timeout_ms);
        loop {
            if CdpClient::fetch_version(endpoint).await.is_ok() {
                return Ok(());
            }
            if let Ok(Some(status)) = child.try_wait() {
                return Err(BrowserError::LaunchFailed(format!(
                    "Chrome exited during startup ({})",
                    status
                )));
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::LaunchFailed(
                    "Chrome failed to start within timeout".to_string(),
                ));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, job_id: &str) -> Result<LaunchedBrowser, BrowserError> {
        let chrome = self
            .config
            .chrome_path
            .clone()
            .or_else(Self::find_chrome)
            .ok_or(BrowserError::ChromeNotFound)?;

        let profile_dir = tempfile::Builder::new().prefix("jobfill-chrome-").tempdir()?;
        let port = self.pick_port()?;

        let mut child = Command::new(&chrome)
            .args(self.chrome_args(port, profile_dir.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!(job_id, port, pid = ?child.id(), "Launched Chrome");

        let endpoint = format!("http://127.0.0.1:{}", port);
        if let Err(e) = self.wait_until_ready(&endpoint, &mut child).await {
            let _ = child.kill().await;
            return Err(e);
        }

        let client = Arc::new(CdpClient::connect(&endpoint).await?);
        let driver = CdpDriver::open(client.clone()).await?;

        Ok(LaunchedBrowser {
            driver: Arc::new(driver),
            process: Some(Box::new(ChromeProcess {
                client,
                child,
                profile_dir: Some(profile_dir),
            })),
        })
    }
}

struct ChromeProcess {
    client: Arc<CdpClient>,
    child: Child,
    profile_dir: Option<TempDir>,
}

#[async_trait]
impl BrowserProcess for ChromeProcess {
    async fn close(&mut self) -> Result<(), BrowserError> {
        self.client.close_browser().await;

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!("Chrome did not exit after Browser.close; killing");
                self.child.kill().await?;
            }
        }

        if let Some(dir) = self.profile_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove Chrome profile {}: {}", path.display(), e);
            } else {
                debug!("Removed Chrome profile {}", path.display());
            }
        }
        Ok(())
    }
}
