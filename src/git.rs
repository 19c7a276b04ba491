use git2::{ErrorCode, Oid, Repository};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// A git2 repository together with the path it was opened from
pub struct RepositoryHandle {
    repository: Repository,
    path: PathBuf,
}

impl RepositoryHandle {
    /// Open a repository from a path.
    ///
    /// Any failure (missing path, not a repository, unreadable object
    /// database) is reported as a VCS access error.
    pub fn open<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        debug!("Opening git repository at: {}", path.display());

        if !path.exists() {
            return Err(PipelineError::vcs_access(path, "path does not exist"));
        }

        let repository = Repository::open(path)
            .map_err(|e| PipelineError::vcs_access(path, format!("failed to open repository: {}", e.message())))?;

        let canonical_path = path
            .canonicalize()
            .map_err(|e| PipelineError::vcs_access(path, format!("failed to resolve canonical path: {}", e)))?;

        if repository.is_bare() {
            debug!("Repository is bare: {}", canonical_path.display());
        }
        info!("Using git repository: {}", canonical_path.display());

        Ok(Self {
            repository,
            path: canonical_path,
        })
    }

    /// Create a handle from an existing Repository
    pub fn from_repository(repository: Repository) -> Self {
        let path = repository
            .workdir()
            .unwrap_or_else(|| repository.path())
            .to_path_buf();

        Self { repository, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Map a git2 failure onto this repository's path
    pub fn access_error(&self, context: &str, error: git2::Error) -> PipelineError {
        PipelineError::vcs_access(&self.path, format!("{}: {}", context, error.message()))
    }
}

/// Where HEAD points, captured so it can be put back after a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD is a symbolic reference, e.g. `refs/heads/main`
    Symbolic(String),
    Detached(Oid),
    /// HEAD names a branch with no commits yet
    Unborn(String),
}

impl HeadState {
    pub fn capture(repository: &Repository) -> Result<Self, git2::Error> {
        let detached = match repository.head_detached() {
            Ok(detached) => detached,
            Err(e) if e.code() == ErrorCode::UnbornBranch => false,
            Err(e) => return Err(e),
        };
        match repository.head() {
            Ok(head) if detached => {
                let oid = head
                    .target()
                    .ok_or_else(|| git2::Error::from_str("detached HEAD without a target"))?;
                Ok(HeadState::Detached(oid))
            }
            Ok(head) => {
                let name = head
                    .name()
                    .ok_or_else(|| git2::Error::from_str("HEAD reference name is not UTF-8"))?;
                Ok(HeadState::Symbolic(name.to_string()))
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let reference = repository.find_reference("HEAD")?;
                let target = reference.symbolic_target().unwrap_or("refs/heads/master");
                Ok(HeadState::Unborn(target.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Point HEAD back at the captured location if it has moved
    pub fn restore(&self, repository: &Repository) -> Result<bool, git2::Error> {
        if HeadState::capture(repository)? == *self {
            return Ok(false);
        }
        match self {
            HeadState::Symbolic(name) | HeadState::Unborn(name) => repository.set_head(name)?,
            HeadState::Detached(oid) => repository.set_head_detached(*oid)?,
        }
        debug!("Restored HEAD to {:?}", self);
        Ok(true)
    }
}
