//! Bus Factor Calculator
//!
//! For each day D from the first to the last commit day, rank authors by
//! their cumulative contribution up to and including D and count how many
//! of the top authors it takes to reach the threshold share of the total.

use log::info;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::day::{day_range, DayBucketer};
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::schema::{BUS_FACTOR_PER_DAY, COMMITS, PRODUCTIVITY_PER_COMMIT};
use crate::store::{sort_chronologically, BusFactorPerDay, Commit, ProductivityPerCommit, Store};

pub const STAGE: &str = "bus-factor";

/// What counts as one author's contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContributionUnit {
    /// Number of commits authored
    #[default]
    Commits,
    /// Lines of churn of the commits authored
    Churn,
}

impl ContributionUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionUnit::Commits => "commits",
            ContributionUnit::Churn => "churn",
        }
    }
}

impl fmt::Display for ContributionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContributionUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commits" | "commit" => Ok(ContributionUnit::Commits),
            "churn" => Ok(ContributionUnit::Churn),
            _ => Err(format!("Invalid contribution unit: {}. Valid options: commits, churn", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusFactorPolicy {
    pub unit: ContributionUnit,
    /// Share of total contribution the top authors must cover, in (0, 1]
    pub threshold: f64,
}

impl Default for BusFactorPolicy {
    fn default() -> Self {
        Self {
            unit: ContributionUnit::Commits,
            threshold: 0.5,
        }
    }
}

/// Smallest number of top contributors covering `threshold` of the total.
///
/// Always at least 1; an empty or all-zero contribution set yields 1.
pub fn bus_factor<I>(contributions: I, threshold: f64) -> i64
where
    I: IntoIterator<Item = i64>,
{
    let mut values: Vec<i64> = contributions.into_iter().filter(|&v| v > 0).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let total: i64 = values.iter().sum();
    if total == 0 {
        return 1;
    }

    let target = threshold * total as f64;
    let mut covered = 0i64;
    for (index, value) in values.iter().enumerate() {
        covered += value;
        if covered as f64 >= target {
            return index as i64 + 1;
        }
    }
    values.len().max(1) as i64
}

/// One sample per calendar day from the first to the last commit day.
///
/// `commits` must be in chronological order. `churn` is consulted only
/// for [`ContributionUnit::Churn`]; commits missing from it contribute 0.
pub fn per_day(
    commits: &[Commit],
    policy: &BusFactorPolicy,
    churn: &HashMap<String, i64>,
    bucketer: &DayBucketer,
) -> Vec<BusFactorPerDay> {
    let (Some(first), Some(last)) = (commits.first(), commits.last()) else {
        return Vec::new();
    };
    let first_day = bucketer.day_of(&first.authored_at);
    let last_day = bucketer.day_of(&last.authored_at);

    let mut by_day: BTreeMap<_, Vec<&Commit>> = BTreeMap::new();
    for commit in commits {
        by_day
            .entry(bucketer.day_of(&commit.authored_at))
            .or_default()
            .push(commit);
    }

    let mut totals: HashMap<String, i64> = HashMap::new();
    let mut samples = Vec::new();
    for day in day_range(first_day, last_day) {
        for commit in by_day.get(&day).into_iter().flatten() {
            let amount = match policy.unit {
                ContributionUnit::Commits => 1,
                ContributionUnit::Churn => churn.get(&commit.hash).copied().unwrap_or(0),
            };
            *totals.entry(commit.author_key()).or_default() += amount;
        }

        let author_count = totals.len() as i64;
        let factor = bus_factor(totals.values().copied(), policy.threshold).min(author_count.max(1));
        samples.push(BusFactorPerDay {
            day,
            bus_factor: factor,
            author_count,
            contribution: policy.unit.to_string(),
        });
    }
    samples
}

pub fn run(store: &mut Store, policy: &BusFactorPolicy) -> PipelineResult<StageOutcome> {
    store.require_populated(STAGE, &COMMITS)?;

    let churn: HashMap<String, i64> = match policy.unit {
        ContributionUnit::Commits => HashMap::new(),
        ContributionUnit::Churn => {
            store.require_populated(STAGE, &PRODUCTIVITY_PER_COMMIT)?;
            store
                .read_all::<ProductivityPerCommit>()?
                .into_iter()
                .map(|p| (p.commit_hash, p.churn))
                .collect()
        }
    };

    let mut commits: Vec<Commit> = store.read_all()?;
    sort_chronologically(&mut commits);

    let samples = per_day(&commits, policy, &churn, &store.bucketer());
    info!(
        "Computed bus factor by {} for {} days from {} commits",
        policy.unit,
        samples.len(),
        commits.len()
    );

    let written = store.replace(&samples)?;
    Ok(StageOutcome::new().wrote(BUS_FACTOR_PER_DAY.name, written))
}
