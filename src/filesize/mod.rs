//! File Size Sampler
//!
//! For every stored commit without a sample yet, check the commit's tree
//! out into the checkout area and record per-file line counts, plus one
//! `file_size_samples` row marking the commit as counted. A counter
//! failure on one commit is recorded in `file_size_errors` and the sweep
//! carries on, unless failures exceed the configured ratio.

pub mod checkout;
pub mod counter;

pub use checkout::{CheckoutArea, CommitCheckout};
pub use counter::{CounterError, FileCount, LineCounter, SccCounter};

use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::error::{PipelineError, PipelineResult};
use crate::git::RepositoryHandle;
use crate::pipeline::StageOutcome;
use crate::store::schema::{COMMITS, FILE_SIZES, FILE_SIZE_ERRORS, FILE_SIZE_SAMPLES};
use crate::store::{sort_chronologically, Commit, FileSize, FileSizeError, FileSizeSample, Store};

pub const STAGE: &str = "filesize";

#[derive(Debug, Clone, PartialEq)]
pub struct FileSizeSettings {
    /// Scratch directory for checkouts; a fresh temp dir when unset
    pub checkout_dir: Option<PathBuf>,
    /// Largest tolerated share of failed commits, 0.0 to 1.0
    pub max_failure_ratio: f64,
    pub show_progress: bool,
}

impl Default for FileSizeSettings {
    fn default() -> Self {
        Self {
            checkout_dir: None,
            max_failure_ratio: 0.25,
            show_progress: false,
        }
    }
}

/// Outcome of counting the commits of one sweep
#[derive(Debug, Default)]
struct Sweep {
    sizes: Vec<FileSize>,
    samples: Vec<FileSizeSample>,
    errors: Vec<FileSizeError>,
    attempted: usize,
}

pub fn run(
    store: &mut Store,
    handle: &RepositoryHandle,
    counter: &dyn LineCounter,
    settings: &FileSizeSettings,
) -> PipelineResult<StageOutcome> {
    store.require_populated(STAGE, &COMMITS)?;

    let mut commits: Vec<Commit> = store.read_all()?;
    sort_chronologically(&mut commits);

    let mut sampled = store.distinct_text(&FILE_SIZE_SAMPLES, "commit_hash")?;
    sampled.extend(store.distinct_text(&FILE_SIZE_ERRORS, "commit_hash")?);
    let pending: Vec<&Commit> = commits.iter().filter(|c| !sampled.contains(&c.hash)).collect();
    let skipped = commits.len() - pending.len();

    info!(
        "Counting lines with {} for {} commits ({} already sampled)",
        counter.name(),
        pending.len(),
        skipped
    );

    let sweep = sweep(handle, counter, settings, &pending)?;

    let failed = sweep.errors.len();
    if sweep.attempted > 0 && failed as f64 / sweep.attempted as f64 > settings.max_failure_ratio {
        return Err(PipelineError::FailureThreshold {
            failed,
            attempted: sweep.attempted,
            max_ratio: settings.max_failure_ratio,
        });
    }
    if failed > 0 {
        warn!("Line counting failed on {} of {} commits", failed, sweep.attempted);
    }

    let (sizes, samples, errors) = store.transaction(|w| {
        Ok((
            w.append(&sweep.sizes)?,
            w.append(&sweep.samples)?,
            w.append(&sweep.errors)?,
        ))
    })?;

    Ok(StageOutcome::new()
        .wrote(FILE_SIZES.name, sizes)
        .wrote(FILE_SIZE_SAMPLES.name, samples)
        .wrote(FILE_SIZE_ERRORS.name, errors)
        .skipped(skipped))
}

fn sweep(
    handle: &RepositoryHandle,
    counter: &dyn LineCounter,
    settings: &FileSizeSettings,
    pending: &[&Commit],
) -> PipelineResult<Sweep> {
    let mut result = Sweep::default();
    if pending.is_empty() {
        return Ok(result);
    }

    let mut area = CheckoutArea::acquire(settings.checkout_dir.as_deref())?;
    let bar = if settings.show_progress {
        ProgressBar::new(pending.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_message("Counting lines");

    for commit in pending {
        let checkout = area.checkout(handle, &commit.hash)?;
        result.attempted += 1;

        match counter.count(checkout.path()) {
            Ok(counts) => {
                debug!("Commit {}: {} files", commit.hash, counts.len());
                result.samples.push(FileSizeSample {
                    commit_hash: commit.hash.clone(),
                    file_count: counts.len() as i64,
                });
                result.sizes.extend(counts.into_iter().map(|count| FileSize {
                    commit_hash: commit.hash.clone(),
                    path: count.path,
                    language: count.language,
                    lines_of_code: count.code,
                    blank_lines: count.blanks,
                    comment_lines: count.comments,
                }));
            }
            Err(e) if e.is_fatal() => {
                bar.abandon();
                return Err(PipelineError::LineCounter {
                    commit: commit.hash.clone(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Line counter failed on commit {}: {}", commit.hash, e);
                result.errors.push(FileSizeError {
                    commit_hash: commit.hash.clone(),
                    message: e.to_string(),
                });
            }
        }
        drop(checkout);
        bar.inc(1);
    }

    bar.finish_with_message("Line counting complete");
    Ok(result)
}
