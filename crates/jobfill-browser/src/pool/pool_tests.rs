use std::sync::Arc;
use std::time::Duration;

use jobfill_config::PoolConfig;
use tempfile::TempDir;

use super::*;
use crate::fake::{FakeDocument, FakeLauncher, FakePage};

fn pool_with(max: usize, launcher: Arc<FakeLauncher>, dir: &TempDir) -> BrowserPool {
    let config = PoolConfig {
        max_browsers: max,
        acquire_timeout_ms: 0,
    };
    BrowserPool::new(config, launcher, dir.path().join("shots"))
}

#[tokio::test]
async fn test_acquire_and_release() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::new());
    let pool = pool_with(2, launcher.clone(), &dir);

    let lease = pool.acquire("job-1").await.unwrap();
    assert_eq!(lease.job_id(), "job-1");
    assert_eq!(pool.active_count(), 1);
    assert_eq!(pool.available_slots(), 1);
    assert!(pool.get("job-1").is_some());

    assert!(pool.release("job-1").await);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.available_slots(), 2);
    assert_eq!(launcher.closed(), 1);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::new());
    let pool = pool_with(1, launcher.clone(), &dir);

    pool.acquire("job-1").await.unwrap();
    assert!(pool.release("job-1").await);
    assert!(!pool.release("job-1").await);
    assert!(!pool.release("never-leased").await);
    assert_eq!(launcher.closed(), 1);
    assert_eq!(pool.available_slots(), 1);
}

#[tokio::test]
async fn test_exhausted_when_full() {
    let dir = TempDir::new().unwrap();
    let pool = pool_with(2, Arc::new(FakeLauncher::new()), &dir);

    pool.acquire("a").await.unwrap();
    pool.acquire("b").await.unwrap();
    let err = pool.acquire("c").await.unwrap_err();
    assert!(matches!(err, PoolError::Exhausted { max: 2 }));

    pool.release("a").await;
    assert!(pool.acquire("c").await.is_ok());
}

#[tokio::test]
async fn test_same_job_cannot_hold_two_browsers() {
    let dir = TempDir::new().unwrap();
    let pool = pool_with(3, Arc::new(FakeLauncher::new()), &dir);

    pool.acquire("job-1").await.unwrap();
    let err = pool.acquire("job-1").await.unwrap_err();
    assert!(matches!(err, PoolError::AlreadyLeased(ref id) if id == "job-1"));
    assert_eq!(pool.active_count(), 1);
}

#[tokio::test]
async fn test_launch_failure_returns_slot() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::new().failing("chrome crashed"));
    let pool = pool_with(1, launcher, &dir);

    let err = pool.acquire("job-1").await.unwrap_err();
    assert!(matches!(err, PoolError::Launch(_)));
    assert_eq!(pool.available_slots(), 1);
    assert!(pool.leased_jobs().is_empty());
}

#[tokio::test]
async fn test_cancelled_acquire_frees_the_job_id() {
    let dir = TempDir::new().unwrap();
    let config = PoolConfig {
        max_browsers: 1,
        acquire_timeout_ms: 10_000,
    };
    let pool = BrowserPool::new(config, Arc::new(FakeLauncher::new()), dir.path().to_path_buf());

    pool.acquire("a").await.unwrap();
    let waited = tokio::time::timeout(Duration::from_millis(20), pool.acquire("b")).await;
    assert!(waited.is_err());

    pool.release("a").await;
    let lease = pool.acquire("b").await.unwrap();
    assert_eq!(lease.job_id(), "b");
}

#[tokio::test]
async fn test_acquire_waits_when_timeout_configured() {
    let dir = TempDir::new().unwrap();
    let config = PoolConfig {
        max_browsers: 1,
        acquire_timeout_ms: 50,
    };
    let pool = BrowserPool::new(config, Arc::new(FakeLauncher::new()), dir.path().to_path_buf());

    pool.acquire("a").await.unwrap();
    let err = pool.acquire("b").await.unwrap_err();
    assert!(matches!(err, PoolError::Exhausted { .. }));
}

#[tokio::test]
async fn test_screenshot_written_for_leased_job() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(FakePage::single(FakeDocument::new("https://a", "A")));
    let launcher = Arc::new(FakeLauncher::new().with_page("job/1", page));
    let pool = pool_with(1, launcher, &dir);

    pool.acquire("job/1").await.unwrap();
    let path = pool.screenshot("job/1", "after submit").await.unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("job_1_after_submit_"));
    assert!(name.ends_with(".png"));
    assert!(std::fs::read(&path).unwrap().starts_with(b"\x89PNG"));

    let err = pool.screenshot("other", "x").await.unwrap_err();
    assert!(matches!(err, PoolError::NotLeased(_)));
}

#[tokio::test]
async fn test_shutdown_all_closes_everything() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::new());
    let pool = pool_with(3, launcher.clone(), &dir);

    pool.acquire("a").await.unwrap();
    pool.acquire("b").await.unwrap();
    pool.shutdown_all().await;

    assert_eq!(launcher.closed(), 2);
    assert_eq!(pool.active_count(), 0);
    assert!(matches!(pool.acquire("c").await, Err(PoolError::ShutDown)));
}
