//! Issue and pull request spoilage
//!
//! spoilage(D) = mean(closed_at - created_at) over the items closed on D.
//! Days without closures carry no mean, which keeps them apart from days
//! whose closures all took zero seconds.

use log::info;
use std::collections::BTreeMap;

use crate::day::{day_range, DayBucketer};
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::{ItemKind, SpoilagePerDay, Store, TrackedItem};

pub const ISSUE_STAGE: &str = "issue-spoilage";
pub const PULL_REQUEST_STAGE: &str = "pull-request-spoilage";

/// One sample per day from the earliest creation to the latest event
pub fn per_day<K: ItemKind>(items: &[TrackedItem<K>], bucketer: &DayBucketer) -> Vec<SpoilagePerDay<K>> {
    let Some(first) = items.iter().map(|i| bucketer.day_of(&i.created_at)).min() else {
        return Vec::new();
    };
    let last = items
        .iter()
        .map(|i| bucketer.day_of(&i.closed_at.unwrap_or(i.created_at)))
        .max()
        .unwrap_or(first)
        .max(first);

    let mut closures: BTreeMap<_, (i64, i64)> = BTreeMap::new();
    for item in items {
        if let Some(closed_at) = item.closed_at {
            let entry = closures.entry(bucketer.day_of(&closed_at)).or_default();
            entry.0 += 1;
            entry.1 += (closed_at - item.created_at).num_seconds();
        }
    }

    day_range(first, last)
        .map(|day| match closures.get(&day) {
            Some(&(count, total_seconds)) => {
                SpoilagePerDay::new(day, count, Some(total_seconds as f64 / count as f64))
            }
            None => SpoilagePerDay::new(day, 0, None),
        })
        .collect()
}

pub fn run<K: ItemKind>(store: &mut Store, stage: &str) -> PipelineResult<StageOutcome> {
    store.require_populated(stage, K::schema())?;

    let items: Vec<TrackedItem<K>> = store.read_all()?;
    let samples = per_day(&items, &store.bucketer());
    let closed = samples.iter().filter(|s| s.mean_lifetime_seconds.is_some()).count();
    info!(
        "Computed {} spoilage over {} days ({} with closures)",
        K::LABEL,
        samples.len(),
        closed
    );

    let written = store.replace(&samples)?;
    Ok(StageOutcome::new().wrote(K::spoilage_schema().name, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Issue, IssueKind};
    use chrono::{TimeZone, Utc};

    fn issue(id: &str, created: (u32, u32), closed: Option<(u32, u32)>) -> Issue {
        let at = |(day, hour): (u32, u32)| Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap();
        let state = if closed.is_some() { "CLOSED" } else { "OPEN" };
        Issue::new(id, 1, "octocat", at(created), closed.map(at), state, vec![])
    }

    #[test]
    fn test_zero_duration_closure_is_defined() {
        let issues = vec![issue("I_1", (1, 9), Some((1, 9))), issue("I_2", (1, 10), None)];
        let samples = per_day(&issues, &DayBucketer::utc());
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].closed_count, 1);
        assert_eq!(samples[0].mean_lifetime_seconds, Some(0.0));
    }

    #[test]
    fn test_days_without_closures_have_no_mean() {
        let issues = vec![
            issue("I_1", (1, 0), Some((3, 0))),
            issue("I_2", (1, 12), Some((3, 12))),
        ];
        let samples = per_day(&issues, &DayBucketer::utc());
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].mean_lifetime_seconds, None);
        assert_eq!(samples[1].mean_lifetime_seconds, None);
        assert_eq!(samples[2].closed_count, 2);
        assert_eq!(samples[2].mean_lifetime_seconds, Some(2.0 * 86_400.0));
    }

    #[test]
    fn test_no_items_no_samples() {
        assert!(per_day::<IssueKind>(&[], &DayBucketer::utc()).is_empty());
    }
}
