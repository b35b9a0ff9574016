//! Command execution: validation, dispatch, retries and batch policy.

use std::sync::Arc;
use std::time::Duration;

use jobfill_browser::PageDriver;
use jobfill_config::AutofillConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::{ActionContext, run_handler};
use crate::command::{ActionType, FillCommand, FillResult};
use crate::error::AutofillError;
use crate::locator::ElementLocator;
use crate::registry::ActionRegistry;

/// Executes [`FillCommand`]s against one page.
pub struct AutofillEngine {
    ctx: Arc<ActionContext>,
    registry: Arc<ActionRegistry>,
    stop_on_error: bool,
    retry_count: u32,
    retry_delay_ms: u64,
}

impl AutofillEngine {
    pub fn new(driver: Arc<dyn PageDriver>, config: AutofillConfig) -> Self {
        Self::with_registry(driver, config, Arc::new(ActionRegistry::new()))
    }

    /// Engine sharing an existing registry (and its custom handlers).
    pub fn with_registry(
        driver: Arc<dyn PageDriver>,
        config: AutofillConfig,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        let stop_on_error = config.stop_on_error;
        let retry_count = config.retry_count;
        let retry_delay_ms = config.retry_delay_ms;
        Self {
            ctx: Arc::new(ActionContext::new(driver, config)),
            registry,
            stop_on_error,
            retry_count,
            retry_delay_ms,
        }
    }

    pub fn with_retry(mut self, count: u32, delay_ms: u64) -> Self {
        self.retry_count = count;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.ctx.driver
    }

    pub fn locator(&self) -> &ElementLocator {
        &self.ctx.locator
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &Arc<ActionContext> {
        &self.ctx
    }

    /// Execute one command. Only a malformed command or an unknown kind is
    /// an `Err`; every runtime failure is a failed [`FillResult`].
    pub async fn try_execute(&self, command: &FillCommand) -> Result<FillResult, AutofillError> {
        command.validate()?;
        let handler = self.registry.get(&command.action)?;

        let mut attempt = 0;
        loop {
            let result = run_handler(handler.as_ref(), &self.ctx, command).await;
            if result.success || attempt >= self.retry_count {
                if !result.success {
                    warn!(
                        action = %command.action,
                        selector = command.selector_str(),
                        attempts = attempt + 1,
                        "Command failed: {}",
                        result.error.as_deref().unwrap_or("")
                    );
                }
                return Ok(result);
            }
            attempt += 1;
            debug!(
                action = %command.action,
                attempt,
                "Retrying after: {}",
                result.error.as_deref().unwrap_or("")
            );
            if self.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }
    }

    /// [`try_execute`](Self::try_execute) folding invalid commands into a
    /// failed result.
    pub async fn execute(&self, command: &FillCommand) -> FillResult {
        match self.try_execute(command).await {
            Ok(result) => result,
            Err(e) => FillResult::failed(command, e.to_string(), false, 0),
        }
    }

    /// Execute in order. With `stop_on_error` the batch ends after the
    /// first failure, whose result is the last one returned.
    pub async fn execute_all(&self, commands: &[FillCommand]) -> Vec<FillResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.execute(command).await;
            let failed = !result.success;
            results.push(result);
            if failed && self.stop_on_error {
                info!(executed = results.len(), total = commands.len(), "Stopping batch on first failure");
                break;
            }
        }
        let summary = summarize(&results);
        debug!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "Batch finished"
        );
        results
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub selector: Option<String>,
    pub action: ActionType,
    pub error: Option<String>,
}

/// Aggregate view over a batch of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage, 0-100.
    pub success_rate: f64,
    pub total_duration_ms: u64,
    pub failures: Vec<FailureSummary>,
}

pub fn summarize(results: &[FillResult]) -> ResultsSummary {
    let successful = results.iter().filter(|r| r.success).count();
    let total = results.len();
    ResultsSummary {
        total,
        successful,
        failed: total - successful,
        success_rate: if total == 0 {
            0.0
        } else {
            successful as f64 * 100.0 / total as f64
        },
        total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        failures: results
            .iter()
            .filter(|r| !r.success)
            .map(|r| FailureSummary {
                selector: r.selector.clone(),
                action: r.action.clone(),
                error: r.error.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
