//! The [`FileStore`] handle tying names, staging, listing and retention together.

use crate::builder::FileStoreBuilder;
use crate::directory::{FileLocation, StorageDirectory, StoredEntry};
use crate::error::StorageError;
use crate::name::FileName;
use crate::retention::{self, RetentionPolicy, SweepReport, Sweeper, SweeperState};
use crate::writer::FileWriter;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared state behind every clone of a [`FileStore`].
#[derive(Debug)]
pub struct FileStoreInner {
    pub(crate) directory: StorageDirectory,
    pub(crate) policy: RetentionPolicy,
    pub(crate) disabled: bool,
    pub(crate) sweeper: Sweeper,
}

/// A thread-safe handle to one storage root.
///
/// Foreground operations never lock: concurrent uploads, downloads and removals
/// rely on the filesystem's rename and unlink semantics. The only state guarded in
/// process is the retention sweeper's start/stop signaling.
///
/// # Example
///
/// ```rust
/// use limbo_storage::{FileStore, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("storage");
///     let store = FileStore::builder().root(&root).build().await?;
///
///     let mut writer = store.open_writer("notes.txt").await?;
///     writer.write(b"hello").await?;
///     writer.commit().await?;
///
///     let files = store.enumerate().await?;
///     assert_eq!(files[0].display_name(), "notes.txt");
///
///     store.remove("notes.txt").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    pub(crate) inner: Arc<FileStoreInner>,
}

impl Deref for FileStore {
    type Target = FileStoreInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FileStore {
    #[must_use = "The store is not initialized until you call .build()"]
    pub fn builder() -> FileStoreBuilder {
        FileStoreBuilder::new()
    }

    /// Absolute path of the storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.directory.root()
    }

    /// Staging directory for in-flight uploads.
    #[must_use]
    pub fn incomplete_dir(&self) -> &Path {
        self.directory.incomplete()
    }

    #[must_use]
    pub fn policy(&self) -> &RetentionPolicy {
        &self.inner.policy
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled
    }

    /// Starts an upload of `original_name`.
    ///
    /// # Errors
    /// * [`StorageError::Collision`] if a file with the canonical name exists.
    /// * [`StorageError::Integrity`] if the name cannot be canonicalized stably.
    /// * [`StorageError::Io`] if the staging file cannot be created.
    pub async fn open_writer(&self, original_name: &str) -> Result<FileWriter, StorageError> {
        let name = FileName::from_original(original_name)?;
        info!(name = %name, original = %original_name, "Upload file");
        FileWriter::create(&self.directory, name, self.disabled).await
    }

    /// Lists published files in directory order. Staged uploads are never listed.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if the root cannot be read.
    pub async fn enumerate(&self) -> Result<Vec<StoredEntry>, StorageError> {
        self.directory.enumerate().await
    }

    /// Resolves a URL name to where the file would live. Does not check existence.
    ///
    /// # Errors
    /// Returns [`StorageError::Integrity`] if the name cannot be canonicalized stably.
    pub fn read_info(&self, url_name: &str) -> Result<FileLocation, StorageError> {
        self.directory.read_info(url_name)
    }

    /// Deletes one stored file.
    ///
    /// # Errors
    /// Returns [`StorageError::FileNotFound`] if no such stored file exists.
    pub async fn remove(&self, url_name: &str) -> Result<(), StorageError> {
        self.directory.remove(url_name).await
    }

    /// Deletes every stored file and every staged upload. Returns how many went.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] on the first file that cannot be deleted.
    pub async fn remove_all(&self) -> Result<usize, StorageError> {
        self.directory.remove_all().await
    }

    /// Launches the retention sweeper. Starting a running sweeper is a no-op that
    /// returns `false`.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start(&self) -> bool {
        self.sweeper.start(self.directory.clone(), self.policy)
    }

    /// Stops the retention sweeper and waits for its task to exit.
    pub async fn stop(&self) {
        self.sweeper.stop().await;
    }

    #[must_use]
    pub fn sweeper_state(&self) -> SweeperState {
        self.sweeper.state()
    }

    /// Runs one retention sweep immediately, independent of the background task.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if a directory cannot be listed.
    pub async fn sweep_now(&self) -> Result<SweepReport, StorageError> {
        retention::sweep(&self.directory, &self.policy).await
    }
}
