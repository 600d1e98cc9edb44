use limbo_storage::*;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);

fn backdate(path: &Path, by: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}

async fn store_with_window(temp: &TempDir, max_age: Duration) -> FileStore {
    FileStore::builder()
        .root(temp.path().join("storage"))
        .max_age(max_age)
        .temp_max_age(Duration::from_secs(15 * 60))
        .sweep_interval(Duration::from_millis(50))
        .poll_interval(Duration::from_millis(10))
        .build()
        .await
        .unwrap()
}

async fn upload(store: &FileStore, name: &str) -> StoredEntry {
    let mut writer = store.open_writer(name).await.unwrap();
    writer.write(name.as_bytes()).await.unwrap();
    writer.commit().await.unwrap().unwrap()
}

#[tokio::test]
async fn test_sweep_removes_only_expired_files() {
    let temp = TempDir::new().unwrap();
    let store = store_with_window(&temp, 24 * HOUR).await;
    let expired = upload(&store, "expired.txt").await;
    let inside = upload(&store, "inside.txt").await;
    backdate(&expired.path, 25 * HOUR);
    backdate(&inside.path, 23 * HOUR);

    let report = store.sweep_now().await.unwrap();

    assert_eq!(report, SweepReport { removed: 1, failed: 0 });
    let names: Vec<_> =
        store.enumerate().await.unwrap().iter().map(|e| e.display_name().to_owned()).collect();
    assert_eq!(names, ["inside.txt"]);
}

#[tokio::test]
async fn test_sweep_reclaims_abandoned_uploads() {
    let temp = TempDir::new().unwrap();
    let store = store_with_window(&temp, 24 * HOUR).await;

    let stale = store.open_writer("stale.bin").await.unwrap();
    let stale_path = stale.temp_path().to_path_buf();
    stale.abort();
    let mut live = store.open_writer("live.bin").await.unwrap();
    live.write(b"y").await.unwrap();
    backdate(&stale_path, Duration::from_secs(16 * 60));

    let report = store.sweep_now().await.unwrap();

    assert_eq!(report.removed, 1);
    assert!(!stale_path.exists());
    assert!(live.temp_path().exists());
    live.commit().await.unwrap();
    assert_eq!(store.enumerate().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_on_missing_root_is_empty() {
    let temp = TempDir::new().unwrap();
    let store =
        FileStore::builder().root(temp.path().join("never")).create(false).build().await.unwrap();

    assert_eq!(store.sweep_now().await.unwrap(), SweepReport::default());
}

#[tokio::test]
async fn test_background_sweeper_evicts_expired_files() {
    let temp = TempDir::new().unwrap();
    let store = store_with_window(&temp, HOUR).await;
    let expired = upload(&store, "old.log").await;
    backdate(&expired.path, 2 * HOUR);

    assert!(store.start());
    tokio::time::timeout(Duration::from_secs(5), async {
        while expired.path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sweeper should remove the expired file");

    store.stop().await;
    assert_eq!(store.sweeper_state(), SweeperState::Stopped);
}

#[tokio::test]
async fn test_stop_interrupts_long_wait() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::builder()
        .root(temp.path().join("storage"))
        .poll_interval(Duration::from_secs(3600))
        .build()
        .await
        .unwrap();

    assert!(store.start());
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), store.stop())
        .await
        .expect("stop must not wait out the poll interval");
    assert_eq!(store.sweeper_state(), SweeperState::Stopped);
}

#[tokio::test]
async fn test_sweeper_lifecycle() {
    let temp = TempDir::new().unwrap();
    let store = store_with_window(&temp, HOUR).await;
    assert_eq!(store.sweeper_state(), SweeperState::Idle);

    assert!(store.start());
    assert!(!store.start(), "second start is a no-op");
    assert_eq!(store.sweeper_state(), SweeperState::Running);

    store.stop().await;
    store.stop().await;
    assert_eq!(store.sweeper_state(), SweeperState::Stopped);

    assert!(store.start(), "a stopped sweeper can be restarted");
    store.stop().await;
}

#[tokio::test]
async fn test_failed_sweep_backs_off_and_recovers() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::builder()
        .root(temp.path().join("storage"))
        .max_age(HOUR)
        .sweep_interval(Duration::from_secs(1))
        .poll_interval(Duration::from_millis(10))
        .build()
        .await
        .unwrap();
    let root = store.root().to_path_buf();

    // A regular file where the root should be makes listing `incomplete/` fail.
    std::fs::remove_dir_all(&root).unwrap();
    std::fs::write(&root, b"not a directory").unwrap();
    assert!(store.sweep_now().await.is_err());

    assert!(store.start());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.sweeper_state(), SweeperState::Running);

    std::fs::remove_file(&root).unwrap();
    std::fs::create_dir(&root).unwrap();
    let expired = root.join("old.log");
    std::fs::write(&expired, b"x").unwrap();
    backdate(&expired, 2 * HOUR);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(expired.exists(), "no retry before the sweep interval has passed");
    assert_eq!(store.sweeper_state(), SweeperState::Running);

    tokio::time::timeout(Duration::from_secs(5), async {
        while expired.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sweeping resumes after the backoff");

    tokio::time::timeout(Duration::from_secs(5), store.stop())
        .await
        .expect("stop completes after a failed sweep");
    assert_eq!(store.sweeper_state(), SweeperState::Stopped);
}
