//! CLI definitions for jobfill.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobfill CLI.
#[derive(Parser)]
#[command(name = "jobfill")]
#[command(about = "AI-guided browser autofill for job applications")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JOBFILL_CONFIG", default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Fill out the application at a job URL
    Run {
        /// Job posting or application URL
        url: String,

        /// Applicant profile (JSON file)
        #[arg(short, long)]
        profile: PathBuf,

        /// Job id; a fresh one is generated when omitted
        #[arg(long)]
        job_id: Option<String>,

        /// Force a platform strategy instead of detecting it from the URL
        #[arg(long)]
        platform: Option<String>,

        /// Exit on the first pause instead of waiting for the operator
        #[arg(long)]
        no_wait: bool,
    },

    /// Continue a paused job from its stored session
    Resume {
        /// Job id
        job_id: String,

        /// Exit on the next pause instead of waiting for the operator
        #[arg(long)]
        no_wait: bool,
    },

    /// Session management commands
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Validate the configuration file and print problems
    CheckConfig,
}

#[derive(Subcommand)]
pub(crate) enum SessionsAction {
    /// List stored sessions
    List {
        /// Only sessions that are running or paused
        #[arg(long)]
        active: bool,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show one session in full
    Show {
        /// Job id
        job_id: String,
    },

    /// Delete sessions older than the configured maximum age
    Cleanup {
        /// Override the configured maximum age
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "jobfill",
            "run",
            "https://jobs.example.com/1",
            "--profile",
            "me.json",
            "--platform",
            "workday",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                url,
                profile,
                job_id,
                platform,
                no_wait,
            } => {
                assert_eq!(url, "https://jobs.example.com/1");
                assert_eq!(profile, PathBuf::from("me.json"));
                assert!(job_id.is_none());
                assert_eq!(platform.as_deref(), Some("workday"));
                assert!(!no_wait);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_sessions_cleanup_override() {
        let cli = Cli::try_parse_from(["jobfill", "-c", "x.toml", "sessions", "cleanup", "--max-age-hours", "6"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                action: SessionsAction::Cleanup { max_age_hours: Some(6) }
            }
        ));
    }
}
