//! `run` and `resume` handlers.

use std::future::Future;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use jobfill_automation::{JobRequest, JobRunner, WorkflowResult};
use jobfill_config::Config;

use crate::app;

/// Start a new job and see it through its pauses.
pub(crate) async fn run_job(
    config: &Config,
    url: String,
    profile: &Path,
    job_id: Option<String>,
    platform: Option<String>,
    no_wait: bool,
) -> anyhow::Result<()> {
    let profile = read_profile(profile)?;
    let profile_id = profile
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string();
    let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let runner = app::build_runner(config).await?;
    let mut request = JobRequest::new(&job_id, url, profile).with_profile_id(profile_id);
    if let Some(platform) = platform {
        request = request.with_platform(platform);
    }

    info!(job_id = %job_id, "Submitting job");
    let outcome = start(&runner, request, no_wait).await;
    runner.shutdown().await;
    let result = outcome?;
    print_summary(&job_id, &result);
    Ok(())
}

/// Pick a stored job back up on a fresh browser.
pub(crate) async fn resume_job(config: &Config, job_id: &str, no_wait: bool) -> anyhow::Result<()> {
    let runner = app::build_runner(config).await?;
    let outcome = reopen(&runner, job_id, no_wait).await;
    runner.shutdown().await;
    let result = outcome?;
    print_summary(job_id, &result);
    Ok(())
}

async fn start(runner: &JobRunner, request: JobRequest, no_wait: bool) -> anyhow::Result<WorkflowResult> {
    let job_id = request.job_id.clone();
    let handle = runner.submit(request).await?;
    let result = until_done(runner, &job_id, handle.wait()).await;
    attend(runner, &job_id, result, no_wait).await
}

async fn reopen(runner: &JobRunner, job_id: &str, no_wait: bool) -> anyhow::Result<WorkflowResult> {
    let handle = runner.reopen(job_id).await?;
    let result = until_done(runner, job_id, handle.wait()).await;
    attend(runner, job_id, result, no_wait).await
}

fn read_profile(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading profile {}", path.display()))?;
    let profile: Value =
        serde_json::from_str(&content).with_context(|| format!("parsing profile {}", path.display()))?;
    if !profile.is_object() {
        anyhow::bail!("profile {} must be a JSON object", path.display());
    }
    Ok(profile)
}

/// Await `job`, cancelling it on Ctrl-C.
async fn until_done<F, T>(runner: &JobRunner, job_id: &str, job: F) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(job);
    tokio::select! {
        result = &mut job => result,
        _ = tokio::signal::ctrl_c() => {
            warn!(job_id, "Interrupted, cancelling job");
            runner.cancel(job_id).await;
            job.await
        }
    }
}

/// While the job is paused, wait for the operator and resume it.
async fn attend(
    runner: &JobRunner,
    job_id: &str,
    mut result: WorkflowResult,
    no_wait: bool,
) -> anyhow::Result<WorkflowResult> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while result.paused {
        let reason = result
            .pause
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| result.pause_reason.clone())
            .unwrap_or_else(|| "Waiting for the operator".to_string());
        println!("\n[paused] {}", reason);
        if no_wait {
            println!("Continue later with: jobfill resume {}", job_id);
            break;
        }
        println!("Handle it in the browser window, then press Enter to continue.");
        if stdin.next_line().await?.is_none() {
            println!("Input closed; leaving job {} paused.", job_id);
            break;
        }
        result = until_done(runner, job_id, runner.resume(job_id)).await?;
    }
    Ok(result)
}

fn print_summary(job_id: &str, result: &WorkflowResult) {
    let state = if result.submit_ready {
        "ready to submit"
    } else if result.paused {
        "paused"
    } else if result.success {
        "finished"
    } else {
        "failed"
    };
    println!();
    println!("Job:       {}", job_id);
    println!("State:     {}", state);
    println!("Platform:  {}", result.platform);
    println!("Pages:     {}", result.page_number);
    println!("Filled:    {} ({} failed)", result.fields_filled, result.fields_failed);
    if !result.unmapped_fields.is_empty() {
        println!("Unmapped:  {}", result.unmapped_fields.join(", "));
    }
    if let Some(error) = &result.error {
        println!("Error:     {}", error);
    }
    if result.submit_ready {
        println!("\nReview the application in the browser and submit it yourself.");
    }
}
