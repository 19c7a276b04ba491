//! Issue tracker collaborator
//!
//! [`TrackerClient`] is the seam between the ingest stages and the network.
//! [`github::GitHubClient`] talks to the GitHub GraphQL API; tests supply
//! in-memory clients.

pub mod github;
pub mod ingest;
pub mod retry;

pub use github::GitHubClient;
pub use ingest::{ingest, Fetchable, IngestSettings};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Tracker failures, split into retryable and fatal kinds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("tracker rejected the credential (401 Unauthorized)")]
    Unauthorized,

    #[error("repository {target} not found or not visible to the credential")]
    NotFound { target: String },

    #[error("tracker rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("tracker server error (HTTP {0})")]
    Server(u16),

    #[error("tracker request timed out")]
    Timeout,

    #[error("tracker transport error: {0}")]
    Transport(String),

    #[error("tracker request failed (HTTP {0})")]
    Http(u16),

    #[error("tracker API error: {0}")]
    Api(String),

    #[error("could not decode tracker response: {0}")]
    Decode(String),

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<TrackerError> },
}

impl TrackerError {
    /// Timeouts, rate limiting, 5xx and dropped connections are retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::RateLimited { .. }
                | TrackerError::Server(_)
                | TrackerError::Timeout
                | TrackerError::Transport(_)
        )
    }
}

/// Repository on the tracker, `owner/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerTarget {
    pub owner: String,
    pub name: String,
}

impl TrackerTarget {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TrackerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Issue,
    PullRequest,
}

impl ItemType {
    /// Repository connection holding this item type in the GraphQL schema
    pub fn connection(&self) -> &'static str {
        match self {
            ItemType::Issue => "issues",
            ItemType::PullRequest => "pullRequests",
        }
    }
}

/// An item as returned by the tracker, before normalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub id: String,
    pub number: i64,
    /// `None` when the author account no longer exists
    pub author: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub state: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPage {
    pub items: Vec<RawItem>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Fetch one page of items, starting after `cursor`
    async fn fetch_page(
        &self,
        target: &TrackerTarget,
        item_type: ItemType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RawPage, TrackerError>;
}
