//! Issue Density Calculator
//!
//! density(D) = open issues on D / project size on D in KLOC, where the
//! project size on D is the latest per-day snapshot at or before D.

use log::info;
use std::collections::BTreeMap;

use crate::day::{day_range, DayBucketer};
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::schema::{ISSUES, ISSUE_DENSITY_PER_DAY, PROJECT_SIZE_PER_DAY};
use crate::store::{Issue, IssueDensityPerDay, ProjectSizePerDay, Store};

pub const STAGE: &str = "issue-density";

/// One sample per day from the first size snapshot to the later of the
/// last snapshot and the last issue event. `sizes` must be ordered by day.
pub fn per_day(issues: &[Issue], sizes: &[ProjectSizePerDay], bucketer: &DayBucketer) -> Vec<IssueDensityPerDay> {
    let (Some(first_size), Some(last_size)) = (sizes.first(), sizes.last()) else {
        return Vec::new();
    };
    let first = first_size.day;

    // Net change in open issues at the start of each day
    let mut changes: BTreeMap<_, i64> = BTreeMap::new();
    let mut last = last_size.day;
    for issue in issues {
        let created = bucketer.day_of(&issue.created_at);
        *changes.entry(created).or_default() += 1;
        last = last.max(created);
        if let Some(closed_at) = issue.closed_at {
            let closed = bucketer.day_of(&closed_at);
            *changes.entry(closed).or_default() -= 1;
            last = last.max(closed);
        }
    }

    let mut open: i64 = changes.range(..first).map(|(_, change)| change).sum();
    let mut snapshots = sizes.iter().peekable();
    let mut lines_of_code = first_size.lines_of_code;

    day_range(first, last)
        .map(|day| {
            open += changes.get(&day).copied().unwrap_or(0);
            while let Some(snapshot) = snapshots.next_if(|s| s.day <= day) {
                lines_of_code = snapshot.lines_of_code;
            }
            let kloc = lines_of_code as f64 / 1000.0;
            IssueDensityPerDay {
                day,
                open_issues: open,
                kloc,
                density: (lines_of_code > 0).then(|| open as f64 / kloc),
            }
        })
        .collect()
}

pub fn run(store: &mut Store) -> PipelineResult<StageOutcome> {
    store.require_populated(STAGE, &ISSUES)?;
    store.require_populated(STAGE, &PROJECT_SIZE_PER_DAY)?;

    let issues: Vec<Issue> = store.read_all()?;
    let sizes: Vec<ProjectSizePerDay> = store.read_all()?;
    let samples = per_day(&issues, &sizes, &store.bucketer());
    info!(
        "Computed issue density over {} days from {} issues",
        samples.len(),
        issues.len()
    );

    let written = store.replace(&samples)?;
    Ok(StageOutcome::new().wrote(ISSUE_DENSITY_PER_DAY.name, written))
}
