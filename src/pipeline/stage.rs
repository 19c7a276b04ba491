//! The ordered stage list

use std::fmt;
use std::str::FromStr;

use crate::metrics::ContributionUnit;
use crate::store::schema::*;
use crate::store::TableSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vcs,
    Filesize,
    ProjectSize,
    ProjectProductivity,
    BusFactor,
    Issues,
    IssueSpoilage,
    IssueDensity,
    PullRequests,
    PullRequestSpoilage,
}

impl Stage {
    /// Every stage in the order a fresh store must be built in
    pub const ALL: [Stage; 10] = [
        Stage::Vcs,
        Stage::Filesize,
        Stage::ProjectSize,
        Stage::ProjectProductivity,
        Stage::BusFactor,
        Stage::Issues,
        Stage::IssueSpoilage,
        Stage::IssueDensity,
        Stage::PullRequests,
        Stage::PullRequestSpoilage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Vcs => "vcs",
            Stage::Filesize => crate::filesize::STAGE,
            Stage::ProjectSize => crate::metrics::project_size::STAGE,
            Stage::ProjectProductivity => crate::metrics::productivity::STAGE,
            Stage::BusFactor => crate::metrics::bus_factor::STAGE,
            Stage::Issues => "issues",
            Stage::IssueSpoilage => crate::metrics::spoilage::ISSUE_STAGE,
            Stage::IssueDensity => crate::metrics::density::STAGE,
            Stage::PullRequests => "pull-requests",
            Stage::PullRequestSpoilage => crate::metrics::spoilage::PULL_REQUEST_STAGE,
        }
    }

    /// Store tables that must be populated before the stage runs.
    ///
    /// Bus factor by churn also reads per-commit productivity.
    pub fn requires(&self, unit: ContributionUnit) -> Vec<&'static TableSchema> {
        match self {
            Stage::Vcs | Stage::Issues | Stage::PullRequests => vec![],
            Stage::Filesize => vec![&COMMITS],
            Stage::ProjectSize => vec![&FILE_SIZE_SAMPLES],
            Stage::ProjectProductivity => vec![&PROJECT_SIZE_PER_COMMIT],
            Stage::BusFactor => match unit {
                ContributionUnit::Commits => vec![&COMMITS],
                ContributionUnit::Churn => vec![&COMMITS, &PRODUCTIVITY_PER_COMMIT],
            },
            Stage::IssueSpoilage => vec![&ISSUES],
            Stage::IssueDensity => vec![&ISSUES, &PROJECT_SIZE_PER_DAY],
            Stage::PullRequestSpoilage => vec![&PULL_REQUESTS],
        }
    }

    pub fn produces(&self) -> Vec<&'static TableSchema> {
        match self {
            Stage::Vcs => vec![&COMMITS, &RELEASES],
            Stage::Filesize => vec![&FILE_SIZES, &FILE_SIZE_SAMPLES, &FILE_SIZE_ERRORS],
            Stage::ProjectSize => vec![&PROJECT_SIZE_PER_COMMIT, &PROJECT_SIZE_PER_DAY],
            Stage::ProjectProductivity => vec![&PRODUCTIVITY_PER_COMMIT, &PRODUCTIVITY_PER_DAY],
            Stage::BusFactor => vec![&BUS_FACTOR_PER_DAY],
            Stage::Issues => vec![&ISSUES],
            Stage::IssueSpoilage => vec![&ISSUE_SPOILAGE_PER_DAY],
            Stage::IssueDensity => vec![&ISSUE_DENSITY_PER_DAY],
            Stage::PullRequests => vec![&PULL_REQUESTS],
            Stage::PullRequestSpoilage => vec![&PULL_REQUEST_SPOILAGE_PER_DAY],
        }
    }

    /// Stages that read the repository itself
    pub fn needs_repository(&self) -> bool {
        matches!(self, Stage::Vcs | Stage::Filesize)
    }

    /// Stages that call the issue tracker
    pub fn needs_tracker(&self) -> bool {
        matches!(self, Stage::Issues | Stage::PullRequests)
    }

    /// Stages of the tracker side of the pipeline, including the
    /// calculators that only read tracker tables
    pub fn is_tracker_side(&self) -> bool {
        matches!(
            self,
            Stage::Issues
                | Stage::IssueSpoilage
                | Stage::IssueDensity
                | Stage::PullRequests
                | Stage::PullRequestSpoilage
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
                format!("Unknown stage: {}. Valid stages: {}", s, names.join(", "))
            })
    }
}
