//! File uploads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ActionContext, ActionHandler, required_selector};
use crate::command::{FillCommand, value_as_text};
use crate::error::AutofillError;

/// Paths named by the command, in order: `file_paths`, `file_path`, then
/// the value (a string or an array of strings).
fn requested_paths(command: &FillCommand) -> Vec<String> {
    if !command.file_paths.is_empty() {
        return command.file_paths.clone();
    }
    if let Some(path) = command.file_path.as_deref().filter(|p| !p.is_empty()) {
        return vec![path.to_string()];
    }
    match &command.value {
        Value::Array(items) => items.iter().map(value_as_text).filter(|p| !p.is_empty()).collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// `upload_file`: attach one or more local files to a file input.
/// Every path must exist before the page is touched.
pub struct UploadFileHandler;

#[async_trait]
impl ActionHandler for UploadFileHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let selector = required_selector(command)?;
        let requested = requested_paths(command);
        if requested.is_empty() {
            return Err(AutofillError::skipped(command.action.as_str(), "No file path provided"));
        }

        let mut paths = Vec::with_capacity(requested.len());
        for path in requested.iter() {
            let resolved = absolute(path);
            if !resolved.is_file() {
                return Err(AutofillError::skipped(
                    command.action.as_str(),
                    format!("File not found: {}", resolved.display()),
                ));
            }
            paths.push(resolved);
        }

        let el = ctx
            .locator
            .find(selector, command.selector_type, ctx.timeout_ms(command))
            .await?;
        ctx.driver.set_files(&el, &paths).await?;
        ctx.driver.dispatch_event(&el, "change").await.ok();

        let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        Ok(match shown.as_slice() {
            [single] => json!(single),
            _ => json!(shown),
        })
    }
}
