//! VCS ingestion stage
//!
//! Reads commits and tags from the repository and appends the ones the
//! store does not hold yet, so repeated runs pick up only new history.

pub mod walker;

pub use walker::{walk_history, History};

use log::info;

use crate::error::PipelineResult;
use crate::git::RepositoryHandle;
use crate::pipeline::StageOutcome;
use crate::store::schema::{COMMITS, RELEASES};
use crate::store::Store;

pub fn run(store: &mut Store, handle: &RepositoryHandle) -> PipelineResult<StageOutcome> {
    info!("Reading history from {}", handle.path().display());
    let History { commits, releases } = walk_history(handle)?;

    let known_commits = store.distinct_text(&COMMITS, "hash")?;
    let known_tags = store.distinct_text(&RELEASES, "tag_name")?;

    let walked = commits.len() + releases.len();
    let new_commits: Vec<_> = commits
        .into_iter()
        .filter(|c| !known_commits.contains(&c.hash))
        .collect();
    let new_releases: Vec<_> = releases
        .into_iter()
        .filter(|r| !known_tags.contains(&r.tag_name))
        .collect();
    let skipped = walked - new_commits.len() - new_releases.len();

    info!(
        "Found {} new commits and {} new releases ({} already stored)",
        new_commits.len(),
        new_releases.len(),
        skipped
    );

    let (commits_written, releases_written) = store.transaction(|w| {
        let commits = w.append(&new_commits)?;
        let releases = w.append(&new_releases)?;
        Ok((commits, releases))
    })?;

    Ok(StageOutcome::new()
        .wrote(COMMITS.name, commits_written)
        .wrote(RELEASES.name, releases_written)
        .skipped(skipped))
}
