//! Session and config subcommand handlers.

use std::path::Path;

use tracing::info;

use jobfill_automation::{ApplicationSession, SessionStore};
use jobfill_config::{Config, ConfigValidator};

use crate::app;
use crate::cli::SessionsAction;

/// Handle session subcommands.
pub(crate) async fn handle_sessions_command(config: &Config, action: SessionsAction) -> anyhow::Result<()> {
    let store = app::open_store(config).await?;
    match action {
        SessionsAction::List { active, format } => {
            let sessions = if active {
                store.list_active().await?
            } else {
                store.list().await?
            };
            list_sessions(sessions, &format)
        }
        SessionsAction::Show { job_id } => {
            let session = store.require(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
            Ok(())
        }
        SessionsAction::Cleanup { max_age_hours } => {
            let hours = max_age_hours.unwrap_or(config.session.max_age_hours);
            let removed = store
                .cleanup_older_than(chrono::Duration::hours(i64::try_from(hours).unwrap_or(i64::MAX)))
                .await?;
            info!(removed, hours, "Session cleanup finished");
            println!("Removed {} session(s) older than {}h.", removed, hours);
            Ok(())
        }
    }
}

fn list_sessions(mut sessions: Vec<ApplicationSession>, format: &str) -> anyhow::Result<()> {
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        _ => {
            println!("{}", session_table(&sessions));
        }
    }
    Ok(())
}

fn session_table(sessions: &[ApplicationSession]) -> String {
    let mut out = format!(
        "{:<38} {:<16} {:<10} {:>5}  {:<20} {}\n",
        "JOB", "STATUS", "PLATFORM", "PAGES", "UPDATED", "URL"
    );
    out.push_str(&"-".repeat(110));
    for s in sessions {
        out.push_str(&format!(
            "\n{:<38} {:<16} {:<10} {:>5}  {:<20} {}",
            s.job_id,
            s.status.as_str(),
            s.platform,
            s.current_page,
            s.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.url
        ));
    }
    out
}

/// Validate a config file and print what is wrong with it.
pub(crate) fn check_config(path: &Path, config: &Config) -> anyhow::Result<()> {
    let report = ConfigValidator::validate(config)?;
    println!("Config: {}", path.display());
    for warning in &report.warnings {
        println!("  warning  {}: {}", warning.path, warning.message);
    }
    for error in &report.errors {
        println!("  error    {}: {}", error.path, error.message);
    }
    if !report.is_valid() {
        anyhow::bail!("{} configuration error(s)", report.errors.len());
    }
    println!("OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfill_automation::SessionStatus;

    #[test]
    fn test_table_lists_every_session() {
        let mut paused = ApplicationSession::new("job-a", "ada", "https://a.example/apply");
        paused.status = SessionStatus::CaptchaWaiting;
        let done = ApplicationSession::new("job-b", "ada", "https://b.example/apply");

        let table = session_table(&[paused, done]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("JOB"));
        assert!(lines[2].contains("captcha_waiting"));
        assert!(lines[3].contains("https://b.example/apply"));
    }

    #[test]
    fn test_default_config_checks_out() {
        assert!(check_config(Path::new("config/default.toml"), &Config::default()).is_ok());
    }
}
