//! Repository path resolution

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

/// Expand a leading `~` and canonicalise when possible; no argument means
/// the current directory. Whether the path is a repository is left to
/// [`crate::git::RepositoryHandle::open`], which reports it as a VCS error.
pub fn resolve_repository_path(repository_arg: Option<&str>) -> Result<PathBuf> {
    let path = match repository_arg {
        Some(path) => expand_home(path),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    debug!("Repository path resolved to {}", path.display());
    Ok(path.canonicalize().unwrap_or(path))
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}
