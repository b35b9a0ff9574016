//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(first) => Err(ConfigError::InvalidValue {
                field: first.path,
                message: first.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_pool(config, &mut result);
        Self::validate_autofill(config, &mut result);
        Self::validate_workflow(config, &mut result);
        Self::validate_oracle(config, &mut result);
        Self::validate_notify(config, &mut result);

        Ok(result)
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        if config.browser.base_debug_port < 1024 {
            result.add_error(ValidationError::new(
                "browser.base_debug_port",
                "Debug port must be 1024 or higher",
            ));
        }

        if let Some(ref path) = config.browser.chrome_path {
            if !path.exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("Chrome binary does not exist: {:?}", path),
                ));
            }
        }
    }

    fn validate_pool(config: &Config, result: &mut ValidationResult) {
        if config.pool.max_browsers == 0 {
            result.add_error(ValidationError::new(
                "pool.max_browsers",
                "max_browsers must be greater than 0",
            ));
        }

        if config.pool.max_browsers > 16 {
            result.add_warning(ValidationWarning::new(
                "pool.max_browsers",
                "max_browsers is very high (>16); each slot is a full Chrome process",
            ));
        }
    }

    fn validate_autofill(config: &Config, result: &mut ValidationResult) {
        if config.autofill.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "autofill.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        if config.autofill.default_timeout_ms < config.autofill.poll_interval_ms {
            result.add_error(ValidationError::new(
                "autofill.default_timeout_ms",
                "default_timeout_ms must not be shorter than poll_interval_ms",
            ));
        }

        if config.autofill.retry_count > 0 {
            result.add_warning(ValidationWarning::new(
                "autofill.retry_count",
                "Engine-level retries are on; workflow navigation also retries, which can repeat clicks",
            ));
        }
    }

    fn validate_workflow(config: &Config, result: &mut ValidationResult) {
        if config.workflow.max_pages == 0 {
            result.add_error(ValidationError::new(
                "workflow.max_pages",
                "max_pages must be greater than 0",
            ));
        }

        if config.workflow.max_no_progress == 0 {
            result.add_error(ValidationError::new(
                "workflow.max_no_progress",
                "max_no_progress must be greater than 0",
            ));
        }

        if config.workflow.oracle_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "workflow.oracle_timeout_secs",
                "oracle_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_oracle(config: &Config, result: &mut ValidationResult) {
        let oracle = &config.oracle;
        if !oracle.api_url.starts_with("http://") && !oracle.api_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "oracle.api_url",
                "api_url must start with http:// or https://",
            ));
        }

        if !(0.0..=2.0).contains(&oracle.temperature) {
            result.add_error(ValidationError::new(
                "oracle.temperature",
                "temperature must be between 0 and 2",
            ));
        }

        if oracle.api_key.as_deref().map(str::is_empty).unwrap_or(true) {
            result.add_warning(ValidationWarning::new(
                "oracle.api_key",
                "API key is not set, may need to be set via environment variable",
            ));
        }
    }

    fn validate_notify(config: &Config, result: &mut ValidationResult) {
        if let Some(ref url) = config.notify.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "notify.webhook_url",
                    "webhook_url must start with http:// or https://",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
