//! Staged, atomically published uploads.
//!
//! Bytes go to `incomplete/<token>.<disk name>` and only appear under the storage
//! root once [`FileWriter::commit`] renames the finished file into place. A writer
//! that is aborted or dropped leaves its temp file to the retention sweeper.

use crate::directory::{StorageDirectory, StoredEntry};
use crate::error::{StorageError, StorageErrorExt};
use crate::name::FileName;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Longest file name most filesystems accept, in bytes.
const MAX_SEGMENT_BYTES: usize = 255;

/// An open upload. Nothing is visible to readers until [`commit`](Self::commit).
///
/// The existence check in [`FileStore::open_writer`](crate::FileStore::open_writer)
/// and the final rename are not atomic together: two concurrent uploads of the same
/// name both pass the check and the later rename replaces the earlier file.
#[derive(Debug)]
#[must_use = "Dropping a writer without commit() discards the upload"]
pub struct FileWriter {
    name: FileName,
    final_path: PathBuf,
    temp_path: PathBuf,
    file: Option<fs::File>,
    written: u64,
    finished: bool,
    failed: bool,
}

impl FileWriter {
    pub(crate) async fn create(
        directory: &StorageDirectory,
        name: FileName,
        disabled: bool,
    ) -> Result<Self, StorageError> {
        let final_path = directory.path_of(&name);
        match fs::symlink_metadata(&final_path).await {
            Ok(_) => {
                return Err(StorageError::Collision {
                    message: name.disk_name().to_owned().into(),
                    context: None,
                });
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {},
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to inspect {}", final_path.display()).into()),
                });
            },
        }

        let temp_path = directory.incomplete().join(temp_name(&name));
        if disabled {
            debug!(name = %name, "Storage disabled, upload will be discarded");
            let file = None;
            return Ok(Self {
                name,
                final_path,
                temp_path,
                file,
                written: 0,
                finished: false,
                failed: false,
            });
        }

        directory.ensure().await?;
        let file = open_temp(&temp_path).await?;
        debug!(name = %name, temp = %temp_path.display(), "Upload staged");

        let file = Some(file);
        Ok(Self { name, final_path, temp_path, file, written: 0, finished: false, failed: false })
    }

    #[must_use]
    pub const fn name(&self) -> &FileName {
        &self.name
    }

    /// Path of the staging file under `incomplete/`.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Bytes accepted so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Appends `data` to the staged file.
    ///
    /// A failed write poisons the writer: later writes and [`commit`](Self::commit)
    /// fail too, so a truncated file is never published.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if the disk rejects the write or an earlier
    /// write already failed.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.failed {
            return Err(self.poisoned());
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.write_all(data).await {
                self.failed = true;
                self.file = None;
                warn!(name = %self.name, error = %err, "Upload write failed");
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Write failed: {}", self.temp_path.display()).into()),
                });
            }
        }
        self.written += data.len() as u64;
        Ok(())
    }

    fn poisoned(&self) -> StorageError {
        StorageError::Io {
            source: std::io::Error::other("an earlier write failed"),
            context: Some(format!("Upload of {} is unusable", self.name).into()),
        }
    }

    /// Flushes, syncs and renames the staged file to its final name.
    ///
    /// Returns the published entry, or `None` when storage is disabled and the
    /// bytes were discarded.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if syncing or renaming fails. The temp file is
    /// then left for the sweeper.
    pub async fn commit(mut self) -> Result<Option<StoredEntry>, StorageError> {
        self.finished = true;
        if self.failed {
            return Err(self.poisoned());
        }
        let Some(mut file) = self.file.take() else {
            debug!(name = %self.name, bytes = self.written, "Upload discarded");
            return Ok(None);
        };

        file.flush().await.context("Flush failed")?;
        file.sync_all().await.context("Hardware sync failed")?;
        drop(file);

        fs::rename(&self.temp_path, &self.final_path).await.context(format!(
            "Atomic publish failed: {} -> {}",
            self.temp_path.display(),
            self.final_path.display()
        ))?;
        if let Some(root) = self.final_path.parent() {
            sync_dir(root).await;
        }

        let meta = fs::metadata(&self.final_path)
            .await
            .context(format!("Failed to stat {}", self.final_path.display()))?;
        info!(name = %self.name, bytes = meta.len(), "File published");

        Ok(Some(StoredEntry {
            path: self.final_path.clone(),
            name: self.name.clone(),
            size: meta.len(),
            modified: meta.modified().unwrap_or_else(|_| SystemTime::now()),
        }))
    }

    /// Gives up on the upload. The staged file stays until the sweeper removes it.
    pub fn abort(mut self) {
        self.finished = true;
        self.file = None;
        info!(
            name = %self.name,
            bytes = self.written,
            temp = %self.temp_path.display(),
            "Upload aborted"
        );
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.finished && self.file.is_some() {
            warn!(
                name = %self.name,
                bytes = self.written,
                temp = %self.temp_path.display(),
                "Upload dropped before commit"
            );
        }
    }
}

async fn open_temp(path: &Path) -> Result<fs::File, StorageError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path).await.context(format!("Temp creation failed: {}", path.display()))
}

/// `<random token>.<disk name>`, cut at a char boundary to fit one path segment.
fn temp_name(name: &FileName) -> String {
    let mut temp = format!("{}.{}", nanoid::nanoid!(), name.disk_name());
    if temp.len() > MAX_SEGMENT_BYTES {
        let mut end = MAX_SEGMENT_BYTES;
        while !temp.is_char_boundary(end) {
            end -= 1;
        }
        temp.truncate(end);
    }
    temp
}

async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names_are_unique_and_bounded() {
        let name = FileName::from_original(&"я".repeat(125)).unwrap();
        let a = temp_name(&name);
        let b = temp_name(&name);
        assert_ne!(a, b);
        assert!(a.len() <= MAX_SEGMENT_BYTES);
        assert!(a.contains('.'));
    }

    #[tokio::test]
    async fn failed_write_is_never_published() {
        let device = Path::new("/dev/full");
        if !device.exists() {
            return;
        }
        let temp = tempfile::TempDir::new().unwrap();
        let final_path = temp.path().join("out.bin");
        let file = fs::OpenOptions::new().write(true).open(device).await.unwrap();
        let mut writer = FileWriter {
            name: FileName::from_original("out.bin").unwrap(),
            final_path: final_path.clone(),
            temp_path: device.to_path_buf(),
            file: Some(file),
            written: 0,
            finished: false,
            failed: false,
        };

        let mut rejected = false;
        for _ in 0..8 {
            if writer.write(&[0_u8; 4096]).await.is_err() {
                rejected = true;
                break;
            }
        }
        assert!(rejected, "writes to a full device must fail");
        assert!(writer.write(b"more").await.is_err());

        let err = writer.commit().await.unwrap_err();
        assert_eq!(err.kind(), "Io");
        assert!(!final_path.exists());
    }

    #[test]
    fn short_temp_names_keep_the_disk_name() {
        let name = FileName::from_original("report.txt").unwrap();
        assert!(temp_name(&name).ends_with(".report.txt"));
    }
}
