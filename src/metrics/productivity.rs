//! Productivity Calculator
//!
//! churn(C) = |size(C) - size(first parent of C)|, with a root commit's
//! whole size counted as churn. Per day, churn is summed over the commits
//! authored that day.

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

use crate::day::DayBucketer;
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::schema::{PRODUCTIVITY_PER_COMMIT, PRODUCTIVITY_PER_DAY, PROJECT_SIZE_PER_COMMIT};
use crate::store::{
    sort_chronologically, Commit, ProductivityPerCommit, ProductivityPerDay, ProjectSizePerCommit, Store,
};

pub const STAGE: &str = "project-productivity";

/// Per-commit churn in chronological order.
///
/// Commits without a size sample produce nothing. A commit whose first
/// parent has no size sample is excluded with a warning, since its churn
/// would otherwise be measured against nothing.
pub fn per_commit(commits: &[Commit], sizes: &[ProjectSizePerCommit]) -> Vec<ProductivityPerCommit> {
    let sizes: HashMap<&str, i64> = sizes
        .iter()
        .map(|s| (s.commit_hash.as_str(), s.lines_of_code))
        .collect();

    let mut samples = Vec::new();
    for commit in commits {
        let Some(&size) = sizes.get(commit.hash.as_str()) else {
            debug!("Commit {} has no size sample", commit.hash);
            continue;
        };
        let delta = match commit.first_parent() {
            None => size,
            Some(parent) => match sizes.get(parent) {
                Some(&parent_size) => size - parent_size,
                None => {
                    warn!(
                        "Excluding commit {} from productivity: first parent {} has no size sample",
                        commit.hash, parent
                    );
                    continue;
                }
            },
        };
        samples.push(ProductivityPerCommit {
            commit_hash: commit.hash.clone(),
            churn: delta.abs(),
            delta,
        });
    }
    samples
}

/// Churn summed per authored day
pub fn per_day(
    commits: &[Commit],
    per_commit: &[ProductivityPerCommit],
    bucketer: &DayBucketer,
) -> Vec<ProductivityPerDay> {
    let churn: HashMap<&str, i64> = per_commit
        .iter()
        .map(|p| (p.commit_hash.as_str(), p.churn))
        .collect();

    let mut days: BTreeMap<_, ProductivityPerDay> = BTreeMap::new();
    for commit in commits {
        if let Some(&value) = churn.get(commit.hash.as_str()) {
            let day = bucketer.day_of(&commit.authored_at);
            let entry = days.entry(day).or_insert(ProductivityPerDay {
                day,
                churn: 0,
                commit_count: 0,
            });
            entry.churn += value;
            entry.commit_count += 1;
        }
    }
    days.into_values().collect()
}

pub fn run(store: &mut Store) -> PipelineResult<StageOutcome> {
    store.require_populated(STAGE, &PROJECT_SIZE_PER_COMMIT)?;

    let sizes: Vec<ProjectSizePerCommit> = store.read_all()?;
    let mut commits: Vec<Commit> = store.read_all()?;
    sort_chronologically(&mut commits);

    let per_commit = per_commit(&commits, &sizes);
    let per_day = per_day(&commits, &per_commit, &store.bucketer());
    info!(
        "Computed churn for {} commits over {} days",
        per_commit.len(),
        per_day.len()
    );

    let (commits_written, days_written) =
        store.transaction(|w| Ok((w.replace(&per_commit)?, w.replace(&per_day)?)))?;

    Ok(StageOutcome::new()
        .wrote(PRODUCTIVITY_PER_COMMIT.name, commits_written)
        .wrote(PRODUCTIVITY_PER_DAY.name, days_written)
        .skipped(sizes.len() - per_commit.len()))
}
