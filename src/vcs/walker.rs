//! Revision Walker
//!
//! Walks every commit reachable from HEAD and the local branches, and
//! resolves tags to the commits they name.

use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, Signature, Sort};
use log::debug;
use std::collections::HashSet;

use crate::error::{PipelineError, PipelineResult};
use crate::git::RepositoryHandle;
use crate::store::{sort_chronologically, Commit, Release};

/// Commits and releases read from one repository
#[derive(Debug, Default)]
pub struct History {
    /// Ascending by authored timestamp, ties broken by hash
    pub commits: Vec<Commit>,
    /// Ascending by tag name
    pub releases: Vec<Release>,
}

pub fn walk_history(handle: &RepositoryHandle) -> PipelineResult<History> {
    let repo = handle.repository();

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| handle.access_error("failed to create revwalk", e))?;
    revwalk
        .set_sorting(Sort::TOPOLOGICAL)
        .map_err(|e| handle.access_error("failed to configure revwalk", e))?;

    match revwalk.push_head() {
        Ok(()) => {}
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            debug!("HEAD has no commits yet in {}", handle.path().display());
        }
        Err(e) => return Err(handle.access_error("failed to push HEAD", e)),
    }
    revwalk
        .push_glob("refs/heads")
        .map_err(|e| handle.access_error("failed to push local branches", e))?;

    let mut commits = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| handle.access_error("failed to get commit OID", e))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| handle.access_error("failed to find commit", e))?;
        commits.push(convert_commit(handle, &commit)?);
    }
    sort_chronologically(&mut commits);
    debug!("Walked {} commits", commits.len());

    let known: HashSet<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
    let mut releases = Vec::new();
    let tag_names = repo
        .tag_names(None)
        .map_err(|e| handle.access_error("failed to list tags", e))?;

    for tag_name in tag_names.iter().flatten() {
        let target = repo
            .revparse_single(&format!("refs/tags/{}", tag_name))
            .and_then(|object| object.peel_to_commit());
        match target {
            Ok(commit) => {
                let hash = commit.id().to_string();
                if known.contains(hash.as_str()) {
                    releases.push(Release {
                        tag_name: tag_name.to_string(),
                        commit_hash: hash,
                    });
                } else {
                    debug!("Skipping tag {}: commit {} is not in the walked history", tag_name, hash);
                }
            }
            Err(e) => debug!("Skipping tag {}: does not resolve to a commit ({})", tag_name, e.message()),
        }
    }
    releases.sort_by(|a, b| a.tag_name.cmp(&b.tag_name));

    Ok(History { commits, releases })
}

fn convert_commit(handle: &RepositoryHandle, commit: &git2::Commit<'_>) -> PipelineResult<Commit> {
    let hash = commit.id().to_string();
    let author = commit.author();
    let committer = commit.committer();

    Ok(Commit {
        author: identity_name(&author),
        author_email: identity_email(&author),
        authored_at: signature_time(handle, &hash, &author)?,
        committer: identity_name(&committer),
        committer_email: identity_email(&committer),
        committed_at: signature_time(handle, &hash, &committer)?,
        parents: commit.parent_ids().map(|id| id.to_string()).collect(),
        message: String::from_utf8_lossy(commit.message_bytes()).trim_end().to_string(),
        hash,
    })
}

fn identity_name(signature: &Signature<'_>) -> String {
    String::from_utf8_lossy(signature.name_bytes()).trim().to_string()
}

fn identity_email(signature: &Signature<'_>) -> String {
    String::from_utf8_lossy(signature.email_bytes()).trim().to_string()
}

fn signature_time(handle: &RepositoryHandle, hash: &str, signature: &Signature<'_>) -> PipelineResult<DateTime<Utc>> {
    let seconds = signature.when().seconds();
    Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
        PipelineError::vcs_access(
            handle.path(),
            format!("commit {} has an invalid timestamp {}", hash, seconds),
        )
    })
}
