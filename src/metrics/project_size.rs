//! Project Size Aggregator
//!
//! Per commit the size is the sum of its file sizes, 0 for a counted commit
//! with no countable files. Per day the size is a gauge: the per-commit size
//! of the last commit authored that day. A day whose last commit has no size
//! gets no row.

use log::{info, warn};
use std::collections::{BTreeMap, HashMap};

use crate::day::DayBucketer;
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::schema::{FILE_SIZE_SAMPLES, PROJECT_SIZE_PER_COMMIT, PROJECT_SIZE_PER_DAY};
use crate::store::{
    sort_chronologically, Commit, FileSize, FileSizeSample, ProjectSizePerCommit, ProjectSizePerDay, Store,
};

pub const STAGE: &str = "project-size";

/// Total lines of code per sampled commit, ordered by hash
pub fn per_commit(samples: &[FileSizeSample], sizes: &[FileSize]) -> Vec<ProjectSizePerCommit> {
    let mut totals: BTreeMap<&str, i64> = samples.iter().map(|s| (s.commit_hash.as_str(), 0)).collect();
    for size in sizes {
        if let Some(total) = totals.get_mut(size.commit_hash.as_str()) {
            *total += size.lines_of_code;
        }
    }
    totals
        .into_iter()
        .map(|(hash, lines_of_code)| ProjectSizePerCommit {
            commit_hash: hash.to_string(),
            lines_of_code,
        })
        .collect()
}

/// End-of-day size snapshot for every day whose last commit was sampled.
///
/// `commits` must be in chronological order.
pub fn per_day(
    commits: &[Commit],
    per_commit: &[ProjectSizePerCommit],
    bucketer: &DayBucketer,
) -> Vec<ProjectSizePerDay> {
    let sizes: HashMap<&str, i64> = per_commit
        .iter()
        .map(|s| (s.commit_hash.as_str(), s.lines_of_code))
        .collect();

    // Later commits overwrite earlier ones of the same day
    let mut last_of_day = BTreeMap::new();
    for commit in commits {
        last_of_day.insert(bucketer.day_of(&commit.authored_at), commit);
    }

    last_of_day
        .into_iter()
        .filter_map(|(day, commit)| match sizes.get(commit.hash.as_str()) {
            Some(&lines_of_code) => Some(ProjectSizePerDay {
                day,
                lines_of_code,
                commit_hash: commit.hash.clone(),
            }),
            None => {
                warn!("No size for {}, the last commit of {}; day skipped", commit.hash, day);
                None
            }
        })
        .collect()
}

pub fn run(store: &mut Store) -> PipelineResult<StageOutcome> {
    store.require_populated(STAGE, &FILE_SIZE_SAMPLES)?;

    let samples: Vec<FileSizeSample> = store.read_all()?;
    let sizes: Vec<FileSize> = store.read_all()?;
    let mut commits: Vec<Commit> = store.read_all()?;
    sort_chronologically(&mut commits);

    let per_commit = per_commit(&samples, &sizes);
    let per_day = per_day(&commits, &per_commit, &store.bucketer());
    info!(
        "Aggregated {} file sizes into {} commit and {} day samples",
        sizes.len(),
        per_commit.len(),
        per_day.len()
    );

    let (commits_written, days_written) =
        store.transaction(|w| Ok((w.replace(&per_commit)?, w.replace(&per_day)?)))?;

    Ok(StageOutcome::new()
        .wrote(PROJECT_SIZE_PER_COMMIT.name, commits_written)
        .wrote(PROJECT_SIZE_PER_DAY.name, days_written))
}
