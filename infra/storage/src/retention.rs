//! Age-based eviction running as one background task per store.
//!
//! The task sweeps at most once per [`RetentionPolicy::sweep_interval`] and
//! otherwise waits on a `watch` channel, so [`Sweeper::stop`] interrupts the wait
//! instead of sleeping it out. Sweeps run on the blocking pool.

use crate::directory::StorageDirectory;
use crate::error::{StorageError, StorageErrorExt};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::ops::AddAssign;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_TEMP_MAX_AGE: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Thresholds and cadence of the retention sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Stored files older than this are deleted.
    pub max_age: Duration,
    /// Staged uploads older than this are considered abandoned.
    pub temp_max_age: Duration,
    /// Minimum time between two sweeps, also the backoff after a failed sweep.
    pub sweep_interval: Duration,
    /// Longest wait between two checks of the stop flag.
    pub poll_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            temp_max_age: DEFAULT_TEMP_MAX_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Outcome of one sweep. Files that vanish mid-sweep count as neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

impl AddAssign for SweepReport {
    fn add_assign(&mut self, rhs: Self) {
        self.removed += rhs.removed;
        self.failed += rhs.failed;
    }
}

/// Lifecycle of the background sweeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SweeperState {
    #[default]
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Deletes expired stored files and abandoned staged uploads.
///
/// # Errors
/// Returns [`StorageError::Io`] if a directory cannot be listed and
/// [`StorageError::Task`] if the blocking task dies. Individual deletion
/// failures are counted in the report instead.
pub(crate) async fn sweep(
    directory: &StorageDirectory,
    policy: &RetentionPolicy,
) -> Result<SweepReport, StorageError> {
    let root = directory.root().to_path_buf();
    let incomplete = directory.incomplete().to_path_buf();
    let policy = *policy;

    tokio::task::spawn_blocking(move || -> Result<SweepReport, StorageError> {
        let now = SystemTime::now();
        let mut report = remove_expired(&root, now, policy.max_age)?;
        report += remove_expired(&incomplete, now, policy.temp_max_age)?;
        Ok(report)
    })
    .await
    .context("Retention sweep task failed")?
}

fn remove_expired(
    dir: &Path,
    now: SystemTime,
    max_age: Duration,
) -> Result<SweepReport, StorageError> {
    let mut report = SweepReport::default();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                if err.io_error().is_some_and(|e| e.kind() == ErrorKind::NotFound) {
                    return Ok(report);
                }
                return Err(StorageError::Io {
                    source: err.into(),
                    context: Some(format!("Failed to list {}", dir.display()).into()),
                });
            },
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Skipping unreadable entry");
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        let expired = modified
            .and_then(|at| now.duration_since(at).ok())
            .is_some_and(|age| age > max_age);
        if !expired {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed outdated file");
                report.removed += 1;
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {},
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to remove outdated file");
                report.failed += 1;
            },
        }
    }

    Ok(report)
}

#[derive(Debug)]
struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Control {
    state: SweeperState,
    running: Option<Running>,
}

/// Start/stop handle for the background task. Only this signaling is locked;
/// the storage directory itself never is.
#[derive(Debug, Default)]
pub(crate) struct Sweeper {
    control: Mutex<Control>,
}

impl Sweeper {
    pub(crate) fn state(&self) -> SweeperState {
        self.control.lock().state
    }

    /// Spawns the sweep loop. Returns `false` if one is already running or stopping.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn start(&self, directory: StorageDirectory, policy: RetentionPolicy) -> bool {
        let mut control = self.control.lock();
        if matches!(control.state, SweeperState::Running | SweeperState::Stopping) {
            warn!(state = ?control.state, "Retention sweeper already active");
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(directory, policy, stop_rx));
        control.running = Some(Running { stop, task });
        control.state = SweeperState::Running;
        true
    }

    /// Signals the loop and waits for it to exit. A no-op unless running.
    ///
    /// The sweeper ends up `Stopped` even if this future is dropped mid-wait; the
    /// loop has already been signalled and exits on its own.
    pub(crate) async fn stop(&self) {
        let running = {
            let mut control = self.control.lock();
            let Some(running) = control.running.take() else {
                return;
            };
            control.state = SweeperState::Stopping;
            running
        };
        let _stopped = MarkStopped(&self.control);

        running.stop.send_replace(true);
        if let Err(err) = running.task.await {
            error!(error = %err, "Retention sweeper task failed");
        }
    }
}

#[derive(Debug)]
struct MarkStopped<'a>(&'a Mutex<Control>);

impl Drop for MarkStopped<'_> {
    fn drop(&mut self) {
        self.0.lock().state = SweeperState::Stopped;
    }
}

async fn run(
    directory: StorageDirectory,
    policy: RetentionPolicy,
    mut stop: watch::Receiver<bool>,
) {
    info!(
        root = %directory.root().display(),
        max_age_secs = policy.max_age.as_secs(),
        "Retention sweeper started"
    );
    let mut last_sweep: Option<Instant> = None;

    loop {
        if *stop.borrow() {
            break;
        }

        let mut pause = policy.poll_interval;
        if last_sweep.is_none_or(|at| at.elapsed() > policy.sweep_interval) {
            debug!("Checking for outdated files");
            match sweep(&directory, &policy).await {
                Ok(report) => {
                    last_sweep = Some(Instant::now());
                    if report != SweepReport::default() {
                        info!(
                            removed = report.removed,
                            failed = report.failed,
                            "Retention sweep finished"
                        );
                    }
                },
                Err(err) => {
                    error!(kind = err.kind(), error = %err, "Retention sweep failed, backing off");
                    pause = policy.sweep_interval;
                },
            }
        }

        // A dropped sender also ends the wait; treat it as a stop request.
        if tokio::time::timeout(pause, stop.wait_for(|stopped| *stopped)).await.is_ok() {
            break;
        }
    }

    info!("Retention sweeper stopped");
}
