//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => {
                let mut config = Config::default();
                Self::expand_paths(&mut config);
                Ok(config)
            }
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: Config = toml::from_str(&expanded)?;
        Self::expand_paths(&mut config);
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.jobfill`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    fn expand_path_buf(path: &mut PathBuf) {
        if let Some(s) = path.to_str() {
            *path = PathBuf::from(Self::expand_path(s));
        }
    }

    fn expand_paths(config: &mut Config) {
        Self::expand_path_buf(&mut config.session.storage_dir);
        Self::expand_path_buf(&mut config.browser.screenshot_dir);
        if let Some(dir) = config.notify.jsonl_dir.as_mut() {
            Self::expand_path_buf(dir);
        }
        if let Some(dir) = config.logging.dir.as_mut() {
            Self::expand_path_buf(dir);
        }
        if let Some(chrome) = config.browser.chrome_path.as_mut() {
            Self::expand_path_buf(chrome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.pool.max_browsers, 3);
        assert_eq!(config.workflow.max_pages, 10);
        assert_eq!(config.autofill.retry_count, 0);
    }

    #[test]
    fn test_load_sections() {
        let content = r#"
            [pool]
            max_browsers = 5

            [autofill]
            default_timeout_ms = 2500
            stop_on_error = true

            [oracle]
            model = "gpt-4o-mini"
            temperature = 0.0
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.pool.max_browsers, 5);
        assert_eq!(config.autofill.default_timeout_ms, 2500);
        assert!(config.autofill.stop_on_error);
        assert_eq!(config.oracle.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]").unwrap();
        writeln!(file, "max_pages = 4").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.workflow.max_pages, 4);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/jobfill/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ConfigLoader::load_or_default(Path::new("/nonexistent/jobfill.toml")).unwrap();
        assert_eq!(config.session.max_age_hours, 24);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable with a unique name
        unsafe {
            std::env::set_var("JOBFILL_TEST_ORACLE_KEY", "sk-test");
        }
        let content = "[oracle]\napi_key = \"${JOBFILL_TEST_ORACLE_KEY}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
        unsafe {
            std::env::remove_var("JOBFILL_TEST_ORACLE_KEY");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${JOBFILL_MISSING_VAR_98765}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(v)) if v == "JOBFILL_MISSING_VAR_98765"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/sessions");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/sessions"));
    }

    #[test]
    fn test_storage_dir_tilde_expanded() {
        let content = "[session]\nstorage_dir = \"~/jobfill-sessions\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert!(!config.session.storage_dir.to_string_lossy().starts_with('~'));
    }
}
