//! Checkout Area
//!
//! The line counter needs a real directory tree for each commit. A
//! [`CheckoutArea`] owns a scratch directory guarded by an exclusive file
//! lock, and hands out at most one [`CommitCheckout`] at a time (the
//! checkout mutably borrows the area).
//!
//! ```text
//! checkout-dir/
//! ├── .prime-checkout.lock
//! └── commit_abc123de/          (8-char commit prefix, removed on drop)
//!     ├── src/main.rs
//!     └── Cargo.toml
//! ```
//!
//! Trees are materialised by writing blobs straight from the object
//! database. HEAD is captured before each checkout and put back when the
//! checkout is dropped, on success and on failure alike.

use fs2::FileExt;
use git2::{ObjectType, Oid, TreeWalkMode, TreeWalkResult};
use log::{debug, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{PipelineError, PipelineResult};
use crate::git::{HeadState, RepositoryHandle};

const LOCK_FILE: &str = ".prime-checkout.lock";
const GITLINK_MODE: i32 = 0o160000;
const SYMLINK_MODE: i32 = 0o120000;

/// Exclusively held scratch directory for commit checkouts
pub struct CheckoutArea {
    root: PathBuf,
    lock: File,
    // Keeps an auto-created directory alive until the area is dropped
    _scratch: Option<TempDir>,
}

impl CheckoutArea {
    /// Lock `base`, or a fresh temporary directory when `base` is `None`
    pub fn acquire(base: Option<&Path>) -> PipelineResult<Self> {
        let (root, scratch) = match base {
            Some(base) => {
                fs::create_dir_all(base)?;
                (base.to_path_buf(), None)
            }
            None => {
                let dir = tempfile::Builder::new().prefix("prime-checkout-").tempdir()?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };

        let lock = File::create(root.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|e| {
            PipelineError::vcs_access(&root, format!("checkout directory is in use by another process: {}", e))
        })?;
        debug!("Acquired checkout area at {}", root.display());

        Ok(Self {
            root,
            lock,
            _scratch: scratch,
        })
    }

    /// Materialise the tree of `commit_hash` into a commit-scoped directory
    pub fn checkout<'a>(
        &'a mut self,
        handle: &'a RepositoryHandle,
        commit_hash: &str,
    ) -> PipelineResult<CommitCheckout<'a>> {
        let repo = handle.repository();
        let head = HeadState::capture(repo).map_err(|e| handle.access_error("failed to read HEAD", e))?;

        let short = commit_hash.get(..8).unwrap_or(commit_hash);
        let dir = self.root.join(format!("commit_{short}"));
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        // From here on the guard cleans up, whatever happens next
        let checkout = CommitCheckout {
            dir,
            handle,
            head,
            _area: self,
        };
        checkout.materialise(commit_hash)?;
        Ok(checkout)
    }
}

impl Drop for CheckoutArea {
    fn drop(&mut self) {
        // The lock file goes while the lock is still held
        if let Err(e) = fs::remove_file(self.root.join(LOCK_FILE)) {
            debug!("Failed to remove lock file in {}: {}", self.root.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.lock) {
            warn!("Failed to unlock checkout area {}: {}", self.root.display(), e);
        }
    }
}

/// One commit's tree on disk; cleaned up and HEAD restored on drop
pub struct CommitCheckout<'a> {
    dir: PathBuf,
    handle: &'a RepositoryHandle,
    head: HeadState,
    _area: &'a mut CheckoutArea,
}

impl CommitCheckout<'_> {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn materialise(&self, commit_hash: &str) -> PipelineResult<()> {
        let handle = self.handle;
        let repo = handle.repository();
        let oid = Oid::from_str(commit_hash).map_err(|e| handle.access_error("invalid commit hash", e))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| handle.access_error(&format!("failed to find commit {}", commit_hash), e))?;
        let tree = commit
            .tree()
            .map_err(|e| handle.access_error(&format!("failed to read tree of {}", commit_hash), e))?;

        let mut blobs = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |parent, entry| {
            let name = String::from_utf8_lossy(entry.name_bytes()).into_owned();
            if matches!(name.as_str(), "" | "." | ".." | ".git") {
                return TreeWalkResult::Skip;
            }
            match entry.kind() {
                Some(ObjectType::Tree) => TreeWalkResult::Ok,
                Some(ObjectType::Blob) if entry.filemode() != SYMLINK_MODE => {
                    blobs.push((format!("{parent}{name}"), entry.id()));
                    TreeWalkResult::Ok
                }
                _ if entry.filemode() == GITLINK_MODE => {
                    debug!("Skipping submodule {}{}", parent, name);
                    TreeWalkResult::Ok
                }
                _ => TreeWalkResult::Ok,
            }
        })
        .map_err(|e| handle.access_error(&format!("failed to walk tree of {}", commit_hash), e))?;

        for (relative, blob_id) in &blobs {
            let blob = repo
                .find_blob(*blob_id)
                .map_err(|e| handle.access_error(&format!("failed to read blob for {}", relative), e))?;
            let target = self.dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, blob.content())?;
        }

        debug!("Checked out {} files of {} into {}", blobs.len(), commit_hash, self.dir.display());
        Ok(())
    }
}

impl Drop for CommitCheckout<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.head.restore(self.handle.repository()) {
            warn!("Failed to restore HEAD of {}: {}", self.handle.path().display(), e.message());
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!("Failed to remove checkout directory {}: {}", self.dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};

    fn repo_with_files(files: &[(&str, &str)]) -> (TempDir, RepositoryHandle, String) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let hash = {
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
                .unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "files", &tree, &[])
                .unwrap()
                .to_string()
        };
        (dir, RepositoryHandle::from_repository(repo), hash)
    }

    #[test]
    fn test_checkout_writes_tree_and_cleans_up() {
        let (_repo_dir, handle, hash) = repo_with_files(&[("a.txt", "one\n"), ("src/b.rs", "fn b() {}\n")]);
        let base = TempDir::new().unwrap();
        let mut area = CheckoutArea::acquire(Some(base.path())).unwrap();

        let checkout_dir = {
            let checkout = area.checkout(&handle, &hash).unwrap();
            let dir = checkout.path().to_path_buf();
            assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "one\n");
            assert_eq!(fs::read_to_string(dir.join("src/b.rs")).unwrap(), "fn b() {}\n");
            assert!(dir.file_name().unwrap().to_string_lossy().starts_with("commit_"));
            dir
        };
        assert!(!checkout_dir.exists());
    }

    #[test]
    fn test_checkout_restores_head() {
        let (_repo_dir, handle, hash) = repo_with_files(&[("a.txt", "one\n")]);
        let before = HeadState::capture(handle.repository()).unwrap();

        let mut area = CheckoutArea::acquire(None).unwrap();
        {
            let _checkout = area.checkout(&handle, &hash).unwrap();
            handle
                .repository()
                .set_head_detached(Oid::from_str(&hash).unwrap())
                .unwrap();
        }
        assert_eq!(HeadState::capture(handle.repository()).unwrap(), before);
    }

    #[test]
    fn test_unknown_commit_is_vcs_error() {
        let (_repo_dir, handle, _) = repo_with_files(&[("a.txt", "one\n")]);
        let mut area = CheckoutArea::acquire(None).unwrap();
        let err = area
            .checkout(&handle, "0123456789012345678901234567890123456789")
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_area_is_exclusive() {
        let base = TempDir::new().unwrap();
        let _held = CheckoutArea::acquire(Some(base.path())).unwrap();
        assert!(CheckoutArea::acquire(Some(base.path())).is_err());
    }

    #[test]
    fn test_dropped_area_removes_lock_file_and_releases() {
        let base = TempDir::new().unwrap();
        let area = CheckoutArea::acquire(Some(base.path())).unwrap();
        assert!(base.path().join(LOCK_FILE).exists());
        drop(area);

        assert!(!base.path().join(LOCK_FILE).exists());
        let again = CheckoutArea::acquire(Some(base.path())).unwrap();
        assert!(base.path().join(LOCK_FILE).exists());
        drop(again);
    }
}
