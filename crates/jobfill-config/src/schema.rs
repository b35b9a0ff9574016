//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub autofill: AutofillConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chrome launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit Chrome binary; discovered per platform when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// First remote-debugging port handed out; each lease gets its own.
    #[serde(default = "default_base_debug_port")]
    pub base_debug_port: u16,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,

    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            base_debug_port: default_base_debug_port(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            extra_args: Vec::new(),
            launch_timeout_ms: default_launch_timeout_ms(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_debug_port() -> u16 {
    9222
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

fn default_launch_timeout_ms() -> u64 {
    15_000
}

fn default_screenshot_dir() -> PathBuf {
    data_root().join("screenshots")
}

/// Browser pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_browsers")]
    pub max_browsers: usize,

    /// How long `acquire` waits for a free slot; 0 rejects immediately.
    #[serde(default)]
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: default_max_browsers(),
            acquire_timeout_ms: 0,
        }
    }
}

fn default_max_browsers() -> usize {
    3
}

/// Element waits and action pacing for the autofill engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutofillConfig {
    #[serde(default = "default_element_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(default = "default_dropdown_open_ms")]
    pub dropdown_open_ms: u64,

    #[serde(default = "default_suggestion_wait_ms")]
    pub suggestion_wait_ms: u64,

    /// Delay between characters when a command asks for key-by-key typing
    /// without giving its own delay.
    #[serde(default)]
    pub typing_delay_ms: u64,

    /// Engine-level retries. Off by default; the workflow loop owns retries.
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub stop_on_error: bool,
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_element_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            dropdown_open_ms: default_dropdown_open_ms(),
            suggestion_wait_ms: default_suggestion_wait_ms(),
            typing_delay_ms: 0,
            retry_count: 0,
            retry_delay_ms: 0,
            stop_on_error: false,
        }
    }
}

impl AutofillConfig {
    /// Short waits and no settling sleeps, for scripted pages.
    pub fn without_delays() -> Self {
        Self {
            default_timeout_ms: 50,
            poll_interval_ms: 5,
            scroll_settle_ms: 0,
            dropdown_open_ms: 0,
            suggestion_wait_ms: 0,
            ..Self::default()
        }
    }
}

fn default_element_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_scroll_settle_ms() -> u64 {
    200
}

fn default_dropdown_open_ms() -> u64 {
    300
}

fn default_suggestion_wait_ms() -> u64 {
    500
}

/// Per-application loop bounds and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Consecutive pages with nothing filled before the loop gives up.
    #[serde(default = "default_max_no_progress")]
    pub max_no_progress: usize,

    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,

    #[serde(default = "default_after_click_ms")]
    pub after_click_ms: u64,

    #[serde(default = "default_after_navigation_ms")]
    pub after_navigation_ms: u64,

    #[serde(default = "default_between_fields_ms")]
    pub between_fields_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_no_progress: default_max_no_progress(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            after_click_ms: default_after_click_ms(),
            after_navigation_ms: default_after_navigation_ms(),
            between_fields_ms: default_between_fields_ms(),
        }
    }
}

impl WorkflowConfig {
    pub fn without_delays() -> Self {
        Self {
            after_click_ms: 0,
            after_navigation_ms: 0,
            between_fields_ms: 0,
            ..Self::default()
        }
    }
}

fn default_max_pages() -> usize {
    10
}

fn default_max_no_progress() -> usize {
    3
}

fn default_oracle_timeout_secs() -> u64 {
    120
}

fn default_after_click_ms() -> u64 {
    2_000
}

fn default_after_navigation_ms() -> u64 {
    1_000
}

fn default_between_fields_ms() -> u64 {
    100
}

/// Application session storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_dir")]
    pub storage_dir: PathBuf,

    /// Sessions untouched for longer than this are swept.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_session_dir(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    data_root().join("sessions")
}

fn default_max_age_hours() -> u64 {
    24
}

/// Operator notification sinks. The log sink is always on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            jsonl_dir: None,
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Decision oracle endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_oracle_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: default_oracle_url(),
            api_key: None,
            model: default_oracle_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_oracle_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4000
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rotated log files; platform data dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root directory for jobfill's on-disk state.
pub fn data_root() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("jobfill"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".jobfill")))
        .unwrap_or_else(|| PathBuf::from(".jobfill"))
}
