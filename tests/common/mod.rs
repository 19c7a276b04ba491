//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

use prime::filesize::{CounterError, FileCount, LineCounter};
use prime::tracker::{ItemType, RawItem, RawPage, TrackerClient, TrackerError, TrackerTarget};

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

/// A throwaway repository whose commits carry explicit timestamps
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init test repository");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `files` (path, line count) into the work tree, then commit
    /// everything on HEAD as `email`
    pub fn commit(&self, email: &str, when: DateTime<Utc>, files: &[(&str, usize)], message: &str) -> Oid {
        for (path, lines) in files {
            let full = self.dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            let content: String = (0..*lines).map(|i| format!("line {}\n", i)).collect();
            fs::write(full, content).unwrap();
        }

        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let name = email.split('@').next().unwrap_or(email);
        let signature = Signature::new(name, email, &Time::new(when.timestamp(), 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }

    pub fn tag(&self, name: &str, oid: Oid) {
        let object = self.repo.find_object(oid, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }
}

/// Counts every line of every regular file as code
#[derive(Debug, Default)]
pub struct WholeLineCounter {
    /// Commits (by directory suffix) the counter fails on
    pub fail_for: Vec<String>,
}

impl WholeLineCounter {
    fn visit(dir: &Path, root: &Path, out: &mut Vec<FileCount>) -> std::io::Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Self::visit(&path, root, out)?;
            } else if file_type.is_file() {
                let content = fs::read_to_string(&path)?;
                let relative = path.strip_prefix(root).unwrap_or(&path);
                out.push(FileCount {
                    path: relative.to_string_lossy().replace('\\', "/"),
                    language: "Plain Text".to_string(),
                    code: content.lines().count() as i64,
                    blanks: 0,
                    comments: 0,
                });
            }
        }
        Ok(())
    }
}

impl LineCounter for WholeLineCounter {
    fn name(&self) -> &str {
        "whole-line"
    }

    fn count(&self, dir: &Path) -> Result<Vec<FileCount>, CounterError> {
        let dir_name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if self.fail_for.iter().any(|prefix| dir_name.ends_with(prefix.as_str())) {
            return Err(CounterError::Failed {
                program: "whole-line".to_string(),
                status: "exit status: 2".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }

        let mut out = Vec::new();
        Self::visit(dir, dir, &mut out).map_err(|e| CounterError::Parse {
            program: "whole-line".to_string(),
            message: e.to_string(),
        })?;
        Ok(out)
    }
}

pub fn raw_item(id: &str, number: i64, created_at: &str, closed_at: Option<&str>) -> RawItem {
    RawItem {
        id: id.to_string(),
        number,
        author: Some("octocat".to_string()),
        created_at: created_at.to_string(),
        closed_at: closed_at.map(str::to_string),
        state: if closed_at.is_some() { "CLOSED" } else { "OPEN" }.to_string(),
        labels: vec![],
    }
}

/// One recorded `fetch_page` call
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub item_type: ItemType,
    pub cursor: Option<String>,
    pub page_size: u32,
}

/// Replays scripted responses in order and records every request
#[derive(Debug, Default)]
pub struct ScriptedTracker {
    responses: Mutex<VecDeque<Result<RawPage, TrackerError>>>,
    pub requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedTracker {
    pub fn new(responses: Vec<Result<RawPage, TrackerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every page of `items` in one response
    pub fn single_page(items: Vec<RawItem>) -> Self {
        Self::new(vec![Ok(RawPage {
            items,
            end_cursor: None,
            has_next_page: false,
        })])
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackerClient for ScriptedTracker {
    async fn fetch_page(
        &self,
        _target: &TrackerTarget,
        item_type: ItemType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RawPage, TrackerError> {
        self.requests.lock().unwrap().push(PageRequest {
            item_type,
            cursor: cursor.map(str::to_string),
            page_size,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TrackerError::Api("no scripted response left".to_string())))
    }
}
