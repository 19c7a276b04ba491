//! Staged software-process metrics
//!
//! Ingestion stages fill a SQLite [`store`] from git history ([`vcs`],
//! [`filesize`]) and an issue tracker ([`tracker`]); the [`metrics`]
//! stages derive per-commit and per-day tables from it. [`pipeline`] runs
//! the stages in dependency order.

pub mod app;
pub mod cli;
pub mod config;
pub mod day;
pub mod error;
pub mod filesize;
pub mod git;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod tracker;
pub mod vcs;

pub use error::{PipelineError, PipelineResult, ValidationError};
