//! End-to-end pipeline runs over synthetic repositories

mod common;

use chrono::NaiveDate;
use tempfile::TempDir;

use common::{at, raw_item, ScriptedTracker, TestRepo, WholeLineCounter};
use prime::day::DayBucketer;
use prime::git::RepositoryHandle;
use prime::pipeline::{PipelineConfig, PipelineRunner, Stage};
use prime::store::*;
use prime::tracker::{RawPage, TrackerTarget};
use prime::PipelineError;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// root = 100 LOC and second = 150 LOC on day 1 by alice, third = 120 LOC
/// on day 2 by bob
fn three_commit_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit("alice@example.com", at(1, 9), &[("src/main.txt", 100)], "root");
    repo.commit("alice@example.com", at(1, 18), &[("src/main.txt", 120), ("README", 30)], "grow");
    repo.commit("bob@example.com", at(2, 10), &[("src/main.txt", 90)], "shrink");
    repo
}

fn runner(repo: &TestRepo, db_dir: &TempDir) -> PipelineRunner {
    let mut config = PipelineConfig::default();
    config.database = db_dir.path().join("prime.db");
    let store = Store::open(&config.database, config.bucketer).unwrap();
    PipelineRunner::new(store, config)
        .with_repository(RepositoryHandle::open(repo.path()).unwrap())
        .with_line_counter(Box::new(WholeLineCounter::default()))
}

#[tokio::test]
async fn test_vcs_side_derivations() {
    let repo = three_commit_repo();
    let db_dir = TempDir::new().unwrap();
    let mut runner = runner(&repo, &db_dir);

    let reports = runner.run_all().await.unwrap();
    let stages: Vec<Stage> = reports.iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Vcs,
            Stage::Filesize,
            Stage::ProjectSize,
            Stage::ProjectProductivity,
            Stage::BusFactor,
        ]
    );
    let store = runner.store();

    let commits: Vec<Commit> = store.read_all().unwrap();
    assert_eq!(commits.len(), 3);

    let per_commit: Vec<ProjectSizePerCommit> = store.read_all().unwrap();
    let mut sizes: Vec<i64> = per_commit.iter().map(|s| s.lines_of_code).collect();
    sizes.sort();
    assert_eq!(sizes, vec![100, 120, 150]);

    let per_day: Vec<ProjectSizePerDay> = store.read_all().unwrap();
    let per_day: Vec<_> = per_day.iter().map(|s| (s.day, s.lines_of_code)).collect();
    assert_eq!(per_day, vec![(day(1), 150), (day(2), 120)]);

    let productivity: Vec<ProductivityPerDay> = store.read_all().unwrap();
    let productivity: Vec<_> = productivity.iter().map(|p| (p.day, p.churn, p.commit_count)).collect();
    assert_eq!(productivity, vec![(day(1), 150, 2), (day(2), 30, 1)]);

    let bus_factor: Vec<BusFactorPerDay> = store.read_all().unwrap();
    assert_eq!(bus_factor.len(), 2);
    assert_eq!((bus_factor[0].bus_factor, bus_factor[0].author_count), (1, 1));
    // alice holds 2 of 3 commits by day 2, which covers half on her own
    assert_eq!((bus_factor[1].bus_factor, bus_factor[1].author_count), (1, 2));
    assert_eq!(bus_factor[1].contribution, "commits");
}

#[tokio::test]
async fn test_tracker_side_scenario() {
    let repo = three_commit_repo();
    let db_dir = TempDir::new().unwrap();

    let client = ScriptedTracker::new(vec![
        Ok(RawPage {
            items: vec![
                raw_item("I_1", 1, "2024-01-01T10:00:00Z", Some("2024-01-01T10:00:00Z")),
                raw_item("I_2", 2, "2024-01-01T11:00:00Z", None),
            ],
            end_cursor: None,
            has_next_page: false,
        }),
        Ok(RawPage {
            items: vec![raw_item("PR_1", 3, "2024-01-01T12:00:00Z", Some("2024-01-02T12:00:00Z"))],
            end_cursor: None,
            has_next_page: false,
        }),
    ]);
    let mut runner = runner(&repo, &db_dir).with_tracker(Box::new(client), TrackerTarget::new("octo", "demo"));

    let reports = runner.run_all().await.unwrap();
    assert_eq!(reports.len(), Stage::ALL.len());
    let store = runner.store();

    let spoilage: Vec<IssueSpoilagePerDay> = store.read_all().unwrap();
    assert_eq!(spoilage.len(), 1);
    assert_eq!(spoilage[0].day, day(1));
    assert_eq!(spoilage[0].closed_count, 1);
    assert_eq!(spoilage[0].mean_lifetime_seconds, Some(0.0));

    let density: Vec<IssueDensityPerDay> = store.read_all().unwrap();
    let density: Vec<_> = density.iter().map(|d| (d.day, d.open_issues, d.kloc)).collect();
    assert_eq!(density, vec![(day(1), 1, 0.15), (day(2), 1, 0.12)]);

    let pr_spoilage: Vec<PullRequestSpoilagePerDay> = store.read_all().unwrap();
    assert_eq!(pr_spoilage.len(), 2);
    assert_eq!(pr_spoilage[0].mean_lifetime_seconds, None);
    assert_eq!(pr_spoilage[1].mean_lifetime_seconds, Some(86_400.0));
}

#[tokio::test]
async fn test_derivations_are_idempotent() {
    let repo = three_commit_repo();
    let db_dir = TempDir::new().unwrap();
    let mut runner = runner(&repo, &db_dir);
    runner.run_all().await.unwrap();

    let before: Vec<ProductivityPerCommit> = runner.store().read_all().unwrap();
    let bus_before: Vec<BusFactorPerDay> = runner.store().read_all().unwrap();

    let reports = runner.run_all().await.unwrap();
    // nothing new to ingest or count
    assert_eq!(reports[0].outcome.rows_written(), 0);
    assert_eq!(reports[1].outcome.rows_written(), 0);
    assert_eq!(reports[1].outcome.skipped, 3);

    let after: Vec<ProductivityPerCommit> = runner.store().read_all().unwrap();
    let bus_after: Vec<BusFactorPerDay> = runner.store().read_all().unwrap();
    assert_eq!(before, after);
    assert_eq!(bus_before, bus_after);
}

#[tokio::test]
async fn test_incremental_history_is_counted_on_rerun() {
    let repo = three_commit_repo();
    let db_dir = TempDir::new().unwrap();
    runner(&repo, &db_dir).run_all().await.unwrap();

    repo.commit("carol@example.com", at(4, 8), &[("src/extra.txt", 10)], "add extra");
    let mut runner = runner(&repo, &db_dir);
    let reports = runner.run_all().await.unwrap();
    assert_eq!(reports[0].outcome.rows_for("commits"), Some(1));

    let per_day: Vec<ProjectSizePerDay> = runner.store().read_all().unwrap();
    assert_eq!(per_day.last().map(|s| (s.day, s.lines_of_code)), Some((day(4), 130)));

    let bus_factor: Vec<BusFactorPerDay> = runner.store().read_all().unwrap();
    // day 3 is filled in between the commit days
    assert_eq!(bus_factor.len(), 4);
    assert_eq!(bus_factor[3].author_count, 3);
}

#[tokio::test]
async fn test_downstream_stage_refuses_empty_store() {
    let db_dir = TempDir::new().unwrap();
    let store = Store::open(db_dir.path().join("prime.db"), DayBucketer::utc()).unwrap();
    let mut runner = PipelineRunner::new(store, PipelineConfig::default());

    let err = runner
        .run_stages(&[Stage::ProjectSize, Stage::ProjectProductivity])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingDependency { ref table, .. } if table == "file_size_samples"));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(runner.store().row_count(&schema::PROJECT_SIZE_PER_COMMIT).unwrap(), 0);
}

#[tokio::test]
async fn test_isolated_counter_failure_excludes_commit() {
    let repo = TestRepo::new();
    repo.commit("alice@example.com", at(1, 9), &[("a.txt", 10)], "one");
    let second = repo.commit("alice@example.com", at(1, 10), &[("a.txt", 20)], "two");
    repo.commit("alice@example.com", at(1, 11), &[("a.txt", 25)], "three");
    repo.commit("alice@example.com", at(1, 12), &[("a.txt", 40)], "four");

    let db_dir = TempDir::new().unwrap();
    let counter = WholeLineCounter {
        fail_for: vec![second.to_string()[..8].to_string()],
    };
    let mut runner = runner(&repo, &db_dir).with_line_counter(Box::new(counter));
    runner.run_all().await.unwrap();
    let store = runner.store();

    let errors: Vec<FileSizeError> = store.read_all().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].commit_hash, second.to_string());

    // the commit after the failed one has no parent size to diff against
    let churn: Vec<ProductivityPerCommit> = store.read_all().unwrap();
    let mut values: Vec<i64> = churn.iter().map(|p| p.churn).collect();
    values.sort();
    assert_eq!(values, vec![10, 15]);
}

#[tokio::test]
async fn test_empty_commit_counts_as_zero_size() {
    let repo = TestRepo::new();
    let root = repo.commit("alice@example.com", at(1, 9), &[], "empty root");
    let child = repo.commit("alice@example.com", at(1, 10), &[("a.txt", 10)], "add a");

    let db_dir = TempDir::new().unwrap();
    let mut runner = runner(&repo, &db_dir);
    runner.run_all().await.unwrap();
    let store = runner.store();

    let samples: Vec<FileSizeSample> = store.read_all().unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().any(|s| s.commit_hash == root.to_string() && s.file_count == 0));

    let per_commit: Vec<ProjectSizePerCommit> = store.read_all().unwrap();
    let size_of = |hash: &str| per_commit.iter().find(|s| s.commit_hash == hash).map(|s| s.lines_of_code);
    assert_eq!(size_of(&root.to_string()), Some(0));
    assert_eq!(size_of(&child.to_string()), Some(10));

    let churn: Vec<ProductivityPerCommit> = store.read_all().unwrap();
    let churn_of = |hash: &str| churn.iter().find(|p| p.commit_hash == hash).map(|p| p.churn);
    assert_eq!(churn_of(&root.to_string()), Some(0));
    assert_eq!(churn_of(&child.to_string()), Some(10));

    // the empty commit is not counted again
    let reports = runner.run_all().await.unwrap();
    assert_eq!(reports[1].outcome.rows_written(), 0);
    assert_eq!(reports[1].outcome.skipped, 2);
}

#[tokio::test]
async fn test_day_with_unsized_last_commit_has_no_size() {
    let repo = TestRepo::new();
    repo.commit("alice@example.com", at(1, 9), &[("a.txt", 100)], "morning");
    let evening = repo.commit("alice@example.com", at(1, 18), &[("a.txt", 110)], "evening");
    repo.commit("alice@example.com", at(2, 9), &[("a.txt", 120)], "next day");
    repo.commit("alice@example.com", at(3, 9), &[("a.txt", 125)], "third day");

    let db_dir = TempDir::new().unwrap();
    let counter = WholeLineCounter {
        fail_for: vec![evening.to_string()[..8].to_string()],
    };
    let mut runner = runner(&repo, &db_dir).with_line_counter(Box::new(counter));
    runner.run_all().await.unwrap();

    // the morning commit is sized, but it is not the day's last
    let per_day: Vec<ProjectSizePerDay> = runner.store().read_all().unwrap();
    let per_day: Vec<_> = per_day.iter().map(|s| (s.day, s.lines_of_code)).collect();
    assert_eq!(per_day, vec![(day(2), 120), (day(3), 125)]);
}
