//! Settings shared by every stage of one pipeline invocation

use std::path::PathBuf;
use std::time::Duration;

use crate::day::DayBucketer;
use crate::error::{PipelineError, PipelineResult};
use crate::filesize::FileSizeSettings;
use crate::metrics::BusFactorPolicy;
use crate::tracker::github::DEFAULT_ENDPOINT;
use crate::tracker::IngestSettings;

pub const DEFAULT_DATABASE: &str = "prime.db";
pub const DEFAULT_COUNTER: &str = "scc";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub endpoint: String,
    /// Environment variable holding the API token
    pub token_env: String,
    pub timeout: Duration,
    pub ingest: IngestSettings,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout: Duration::from_secs(60),
            ingest: IngestSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub database: PathBuf,
    pub bucketer: DayBucketer,
    /// Line counter program
    pub counter: String,
    pub filesize: FileSizeSettings,
    pub bus_factor: BusFactorPolicy,
    pub tracker: TrackerSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            bucketer: DayBucketer::utc(),
            counter: DEFAULT_COUNTER.to_string(),
            filesize: FileSizeSettings::default(),
            bus_factor: BusFactorPolicy::default(),
            tracker: TrackerSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject out-of-range values before any stage runs
    pub fn validate(&self) -> PipelineResult<()> {
        if self.database.as_os_str().is_empty() {
            return Err(PipelineError::config("database path must not be empty"));
        }
        if self.counter.trim().is_empty() {
            return Err(PipelineError::config("filesize.counter must name a program"));
        }

        let ratio = self.filesize.max_failure_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PipelineError::config(format!(
                "filesize.max-failure-ratio must be between 0.0 and 1.0, got {}",
                ratio
            )));
        }

        let threshold = self.bus_factor.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(PipelineError::config(format!(
                "bus-factor.threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        let tracker = &self.tracker;
        if tracker.endpoint.trim().is_empty() {
            return Err(PipelineError::config("tracker.endpoint must not be empty"));
        }
        if tracker.token_env.trim().is_empty() {
            return Err(PipelineError::config("tracker.token-env must name a variable"));
        }
        if tracker.timeout.is_zero() {
            return Err(PipelineError::config("tracker.timeout-secs must be greater than 0"));
        }
        let page_size = tracker.ingest.page_size;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PipelineError::config(format!(
                "tracker.page-size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        tracker
            .ingest
            .retry
            .validate()
            .map_err(|e| PipelineError::config(format!("tracker retry policy: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database, PathBuf::from("prime.db"));
        assert_eq!(config.tracker.ingest.page_size, 100);
        assert_eq!(config.tracker.endpoint, "https://api.github.com/graphql");
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = PipelineConfig::default();
        config.filesize.max_failure_ratio = 1.5;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = PipelineConfig::default();
        config.bus_factor.threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.tracker.ingest.page_size = 101;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.tracker.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.counter = " ".to_string();
        assert!(config.validate().is_err());
    }
}
