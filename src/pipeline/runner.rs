//! Pipeline runner
//!
//! Holds the store and every collaborator a stage may need, checks each
//! stage's upstream tables before invoking it, and stops at the first
//! failing stage so nothing downstream runs against a store missing its
//! inputs.

use log::{error, info};
use std::time::{Duration, Instant};

use super::{PipelineConfig, Stage, StageOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::filesize::{self, LineCounter, SccCounter};
use crate::git::RepositoryHandle;
use crate::metrics::{bus_factor, density, productivity, project_size, spoilage};
use crate::store::{IssueKind, PullRequestKind, Store};
use crate::tracker::{self, TrackerClient, TrackerTarget};
use crate::vcs;

/// What one stage did
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

struct TrackerBinding {
    client: Box<dyn TrackerClient>,
    target: TrackerTarget,
}

pub struct PipelineRunner {
    store: Store,
    config: PipelineConfig,
    repository: Option<RepositoryHandle>,
    counter: Box<dyn LineCounter>,
    tracker: Option<TrackerBinding>,
}

impl PipelineRunner {
    /// A runner counting lines with the configured program
    pub fn new(store: Store, config: PipelineConfig) -> Self {
        let counter = Box::new(SccCounter::new(config.counter.clone()));
        Self {
            store,
            config,
            repository: None,
            counter,
            tracker: None,
        }
    }

    pub fn with_repository(mut self, repository: RepositoryHandle) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_line_counter(mut self, counter: Box<dyn LineCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_tracker(mut self, client: Box<dyn TrackerClient>, target: TrackerTarget) -> Self {
        self.tracker = Some(TrackerBinding { client, target });
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The full stage list this runner can serve: the VCS side always, the
    /// tracker side only with a tracker bound
    pub fn plan(&self) -> Vec<Stage> {
        Stage::ALL
            .iter()
            .copied()
            .filter(|stage| self.tracker.is_some() || !stage.is_tracker_side())
            .collect()
    }

    pub async fn run_all(&mut self) -> PipelineResult<Vec<StageReport>> {
        let plan = self.plan();
        self.run_stages(&plan).await
    }

    /// Run `stages` in table order, stopping at the first failure
    pub async fn run_stages(&mut self, stages: &[Stage]) -> PipelineResult<Vec<StageReport>> {
        let mut ordered = stages.to_vec();
        ordered.sort();
        ordered.dedup();

        let names: Vec<&str> = ordered.iter().map(|s| s.name()).collect();
        info!("Running stages: {}", names.join(", "));

        let mut reports = Vec::with_capacity(ordered.len());
        for stage in ordered {
            match self.run_stage(stage).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Stage {} failed: {}", stage, e);
                    if let Some(next) = Stage::ALL.iter().find(|s| **s > stage && stages.contains(*s)) {
                        info!("Not running {} and later stages", next);
                    }
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }

    pub async fn run_stage(&mut self, stage: Stage) -> PipelineResult<StageReport> {
        self.check_inputs(stage)?;

        info!("Starting stage {}", stage);
        let started = Instant::now();
        let outcome = self.dispatch(stage).await?;
        let elapsed = started.elapsed();
        info!("Finished stage {} in {:.2?}: {}", stage, elapsed, outcome);

        Ok(StageReport {
            stage,
            outcome,
            elapsed,
        })
    }

    fn check_inputs(&self, stage: Stage) -> PipelineResult<()> {
        if stage.needs_repository() && self.repository.is_none() {
            return Err(PipelineError::config(format!(
                "stage '{}' needs a repository path",
                stage
            )));
        }
        if stage.needs_tracker() && self.tracker.is_none() {
            return Err(PipelineError::config(format!(
                "stage '{}' needs a tracker owner, repository name and credential",
                stage
            )));
        }
        for table in stage.requires(self.config.bus_factor.unit) {
            self.store.require_populated(stage.name(), table)?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, stage: Stage) -> PipelineResult<StageOutcome> {
        match stage {
            Stage::Vcs => {
                let repository = required(self.repository.as_ref(), stage, "a repository path")?;
                vcs::run(&mut self.store, repository)
            }
            Stage::Filesize => {
                let repository = required(self.repository.as_ref(), stage, "a repository path")?;
                filesize::run(
                    &mut self.store,
                    repository,
                    self.counter.as_ref(),
                    &self.config.filesize,
                )
            }
            Stage::ProjectSize => project_size::run(&mut self.store),
            Stage::ProjectProductivity => productivity::run(&mut self.store),
            Stage::BusFactor => bus_factor::run(&mut self.store, &self.config.bus_factor),
            Stage::Issues => {
                let binding = required(self.tracker.as_ref(), stage, "a tracker")?;
                tracker::ingest::<IssueKind>(
                    &mut self.store,
                    binding.client.as_ref(),
                    &binding.target,
                    &self.config.tracker.ingest,
                )
                .await
            }
            Stage::IssueSpoilage => spoilage::run::<IssueKind>(&mut self.store, spoilage::ISSUE_STAGE),
            Stage::IssueDensity => density::run(&mut self.store),
            Stage::PullRequests => {
                let binding = required(self.tracker.as_ref(), stage, "a tracker")?;
                tracker::ingest::<PullRequestKind>(
                    &mut self.store,
                    binding.client.as_ref(),
                    &binding.target,
                    &self.config.tracker.ingest,
                )
                .await
            }
            Stage::PullRequestSpoilage => {
                spoilage::run::<PullRequestKind>(&mut self.store, spoilage::PULL_REQUEST_STAGE)
            }
        }
    }
}

fn required<'a, T>(value: Option<&'a T>, stage: Stage, what: &str) -> PipelineResult<&'a T> {
    value.ok_or_else(|| PipelineError::config(format!("stage '{}' needs {}", stage, what)))
}
