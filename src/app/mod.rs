//! Application orchestration module

pub mod execution;
pub mod initialization;
pub mod repository;

pub use execution::{exit_code, run_command, summarize};
pub use initialization::{configure_logging, load_configuration, pipeline_config};
pub use repository::resolve_repository_path;
