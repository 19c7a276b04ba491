//! Command execution

use anyhow::Result;
use log::{debug, info};
use std::env;

use crate::cli;
use crate::error::PipelineError;
use crate::git::RepositoryHandle;
use crate::pipeline::{PipelineConfig, PipelineRunner, StageReport};
use crate::store::Store;
use crate::tracker::{GitHubClient, TrackerTarget};

use super::repository::resolve_repository_path;

/// Open the store, bind the collaborators the command needs and run it
pub async fn run_command(args: &cli::Args, pipeline: PipelineConfig) -> Result<Vec<StageReport>> {
    let store = Store::open(&pipeline.database, pipeline.bucketer)?;
    let mut runner = PipelineRunner::new(store, pipeline.clone());

    let tracker = args.command.tracker();
    if let Some(tracker) = &tracker {
        let token = tracker_token(tracker.token.as_deref(), &pipeline.tracker.token_env)?;
        let client = GitHubClient::new(&pipeline.tracker.endpoint, token, pipeline.tracker.timeout)
            .map_err(PipelineError::from)?;
        debug!("Tracker endpoint: {}", client.endpoint());
        runner = runner.with_tracker(
            Box::new(client),
            TrackerTarget::new(&tracker.owner, &tracker.repo_name),
        );
    }

    let stages = match args.command.stage() {
        Some(stage) => vec![stage],
        None => {
            if tracker.is_none() {
                info!("No tracker repository given; running the VCS-side stages only");
            }
            runner.plan()
        }
    };

    if stages.iter().any(|stage| stage.needs_repository()) {
        let path = resolve_repository_path(args.repository.as_deref())?;
        runner = runner.with_repository(RepositoryHandle::open(&path)?);
    }

    let reports = runner.run_stages(&stages).await?;
    Ok(reports)
}

/// `--token` first, then the configured environment variable
fn tracker_token(explicit: Option<&str>, token_env: &str) -> Result<String, PipelineError> {
    if let Some(token) = explicit {
        return Ok(token.to_string());
    }
    match env::var(token_env) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(PipelineError::config(format!(
            "no tracker credential: pass --token or set {}",
            token_env
        ))),
    }
}

/// One line per stage for stdout
pub fn summarize(reports: &[StageReport]) -> Vec<String> {
    reports
        .iter()
        .map(|report| format!("{}: {}", report.stage, report.outcome))
        .collect()
}

/// Process exit status for a failed run
pub fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}
