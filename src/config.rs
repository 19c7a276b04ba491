use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use toml::Value;

use crate::day::DayBucketer;
use crate::metrics::ContributionUnit;
use crate::pipeline::PipelineConfig;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "PRIME_CONFIG";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load the first configuration file found by discovery, or nothing
    pub fn load() -> Result<Self> {
        for path in discover_config_files() {
            debug!("Looking for configuration at {}", path.display());
            if path.is_file() {
                return Self::load_from_file(path);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Look a key up in the selected section, then `section`, then `[base]`
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        let selected = self
            .selected_section
            .as_deref()
            .and_then(|name| self.config.get(name))
            .and_then(|s| s.get(key));

        selected
            .or_else(|| self.config.get(section).and_then(|s| s.get(key)))
            .or_else(|| self.config.get("base").and_then(|s| s.get(key)))
    }

    /// `--config-name`: values in `section` override every other section
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        self.get_value(section, key)
            .map(|value| crate::logging::parse_log_level(value))
            .transpose()
    }

    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Parse a value with its `FromStr` impl, naming the key on failure
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_value(section, key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for {}.{}: '{}' ({})", section, key, value, e)),
            None => Ok(None),
        }
    }

    /// Pipeline settings from `[base]`, `[pipeline]`, `[filesize]`,
    /// `[bus-factor]` and `[tracker]`, validated
    pub fn get_pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default();

        if let Some(database) = self.get_path("base", "database") {
            config.database = database;
        }
        if let Some(bucketer) = self.get_parsed::<DayBucketer>("pipeline", "utc-offset")? {
            config.bucketer = bucketer;
        }

        if let Some(counter) = self.get_value("filesize", "counter") {
            config.counter = counter.clone();
        }
        if let Some(dir) = self.get_path("filesize", "checkout-dir") {
            config.filesize.checkout_dir = Some(dir);
        }
        if let Some(ratio) = self.get_parsed::<f64>("filesize", "max-failure-ratio")? {
            config.filesize.max_failure_ratio = ratio;
        }

        if let Some(unit) = self.get_parsed::<ContributionUnit>("bus-factor", "contribution")? {
            config.bus_factor.unit = unit;
        }
        if let Some(threshold) = self.get_parsed::<f64>("bus-factor", "threshold")? {
            config.bus_factor.threshold = threshold;
        }

        let tracker = &mut config.tracker;
        if let Some(endpoint) = self.get_value("tracker", "endpoint") {
            tracker.endpoint = endpoint.clone();
        }
        if let Some(token_env) = self.get_value("tracker", "token-env") {
            tracker.token_env = token_env.clone();
        }
        if let Some(secs) = self.get_parsed::<u64>("tracker", "timeout-secs")? {
            tracker.timeout = Duration::from_secs(secs);
        }
        if let Some(page_size) = self.get_parsed::<u32>("tracker", "page-size")? {
            tracker.ingest.page_size = page_size;
        }
        let retry = &mut tracker.ingest.retry;
        if let Some(max_retries) = self.get_parsed::<u32>("tracker", "max-retries")? {
            retry.max_retries = max_retries;
        }
        if let Some(millis) = self.get_parsed::<u64>("tracker", "initial-delay-ms")? {
            retry.initial_delay = Duration::from_millis(millis);
        }
        if let Some(millis) = self.get_parsed::<u64>("tracker", "max-delay-ms")? {
            retry.max_delay = Duration::from_millis(millis);
        }

        config
            .validate()
            .context("Pipeline configuration validation failed")?;
        Ok(config)
    }
}

/// Candidate configuration files, most specific first
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV) {
        paths.push(PathBuf::from(env_path));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("prime").join("config.toml"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".prime.toml"));
    }
    paths.push(PathBuf::from("./.prime.toml"));

    paths
}

fn parse_toml_config(content: &str) -> Result<Configuration> {
    let table: toml::Table = content.parse().context("Failed to parse TOML content")?;
    let mut config = Configuration::new();
    for (key, value) in &table {
        match value {
            Value::Table(section) => flatten_section(key, section, &mut config),
            scalar => {
                config
                    .entry("base".to_string())
                    .or_default()
                    .insert(key.clone(), scalar_to_string(scalar));
            }
        }
    }
    Ok(config)
}

/// Scalars of `table` land in `section`; nested tables become dotted
/// sections, so `[profile.ci]` is read as "profile.ci"
fn flatten_section(section: &str, table: &toml::Table, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(nested) => flatten_section(&format!("{}.{}", section, key), nested, config),
            scalar => {
                config
                    .entry(section.to_string())
                    .or_default()
                    .insert(key.clone(), scalar_to_string(scalar));
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}
