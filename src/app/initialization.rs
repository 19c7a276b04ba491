//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, LevelFilter};

use crate::pipeline::PipelineConfig;
use crate::{cli, config, logging};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => config::ConfigManager::load_from_file(config_file.clone())?,
        None => config::ConfigManager::load()?,
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Command-line flags win over configuration, which wins over defaults
pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config
            .get_log_level("base", "console-level")?
            .unwrap_or(LevelFilter::Info)
    };

    let format = match args.log_format.as_deref().or(config.get_value("base", "log-format").map(String::as_str)) {
        Some(format) => format.parse::<logging::LogFormat>().map_err(|e| anyhow::anyhow!(e))?,
        None => logging::LogFormat::Text,
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config.get_log_level("base", "file-log-level")?,
    };

    let (destination, file_level) = match (log_file, file_level) {
        (Some(path), level) => (logging::LogDestination::Both(path), Some(level.unwrap_or(console_level))),
        (None, Some(_)) => {
            return Err(anyhow::anyhow!("A file log level was configured without a log file"));
        }
        (None, None) => (logging::LogDestination::Console, None),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Configured pipeline settings with the command line's overrides applied
pub fn pipeline_config(
    args: &cli::Args,
    config: &config::ConfigManager,
    log_config: &logging::LogConfig,
) -> Result<PipelineConfig> {
    let mut pipeline = config.get_pipeline_config()?;

    if let Some(db) = &args.db {
        pipeline.database = db.clone();
    }
    if let Some(filesize) = args.command.filesize() {
        if let Some(dir) = &filesize.checkout_dir {
            pipeline.filesize.checkout_dir = Some(dir.clone());
        }
        if let Some(counter) = &filesize.counter {
            pipeline.counter = counter.clone();
        }
    }
    if let Some(unit) = args.command.bus_factor().and_then(|b| b.contribution) {
        pipeline.bus_factor.unit = unit;
    }
    pipeline.filesize.show_progress = log_config.shows_progress();

    pipeline
        .validate()
        .context("Invalid pipeline settings from the command line")?;
    debug!("Pipeline configuration: {:?}", pipeline);
    Ok(pipeline)
}
