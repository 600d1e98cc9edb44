use crate::error::{StorageError, StorageErrorExt};
use crate::name::FileName;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

/// Reserved subdirectory of the storage root holding in-flight uploads.
pub const INCOMPLETE_DIR: &str = "incomplete";

/// A published file, derived from the directory listing on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Full path of the file on disk.
    pub path: PathBuf,
    pub name: FileName,
    pub size: u64,
    pub modified: SystemTime,
}

impl StoredEntry {
    #[must_use]
    pub fn url_name(&self) -> &str {
        self.name.url_name()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.display_name()
    }
}

/// Where a stored file lives, as resolved from its URL name.
///
/// Resolution does not touch the disk; a missing file surfaces when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub root: PathBuf,
    pub name: FileName,
}

impl FileLocation {
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.root.join(self.name.disk_name())
    }

    #[must_use]
    pub fn disk_name(&self) -> &str {
        self.name.disk_name()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.display_name()
    }
}

/// The storage root plus its reserved [`INCOMPLETE_DIR`] staging area.
///
/// Only regular files directly under the root are user content. Both directories
/// are created lazily with owner-only permissions.
#[derive(Debug, Clone)]
pub(crate) struct StorageDirectory {
    root: PathBuf,
    incomplete: PathBuf,
}

impl StorageDirectory {
    pub(crate) fn new(root: PathBuf) -> Self {
        let incomplete = root.join(INCOMPLETE_DIR);
        Self { root, incomplete }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn incomplete(&self) -> &Path {
        &self.incomplete
    }

    pub(crate) fn path_of(&self, name: &FileName) -> PathBuf {
        self.root.join(name.disk_name())
    }

    /// Creates the root and the staging directory if missing. Idempotent.
    pub(crate) async fn ensure(&self) -> Result<(), StorageError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);

        builder
            .create(&self.incomplete)
            .await
            .context(format!("Failed to create storage directory: {}", self.incomplete.display()))
    }

    pub(crate) async fn enumerate(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to list {}", self.root.display()).into()),
                });
            },
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.context("Failed to read directory entry")? {
            let Ok(file_type) = entry.file_type().await else { continue };
            if !file_type.is_file() {
                continue;
            }
            let disk_name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "Skipping stored file with a non UTF-8 name");
                    continue;
                },
            };
            // The file may be removed between listing and stat.
            let Ok(meta) = entry.metadata().await else { continue };

            entries.push(StoredEntry {
                path: entry.path(),
                name: FileName::from_disk(disk_name),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    pub(crate) fn read_info(&self, url_name: &str) -> Result<FileLocation, StorageError> {
        Ok(FileLocation { root: self.root.clone(), name: FileName::from_url(url_name)? })
    }

    pub(crate) async fn remove(&self, url_name: &str) -> Result<(), StorageError> {
        let name = FileName::from_url(url_name)?;
        let path = self.path_of(&name);

        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(e, name.disk_name(), "Remove failed"))?;
        if !meta.is_file() {
            return Err(StorageError::FileNotFound {
                message: name.disk_name().to_owned().into(),
                context: Some("Not a stored file".into()),
            });
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::from_io(e, name.disk_name(), "Remove failed"))?;
        info!(name = %name, size = meta.len(), "File removed");
        Ok(())
    }

    /// Deletes every regular file in the root and in the staging directory.
    pub(crate) async fn remove_all(&self) -> Result<usize, StorageError> {
        let stored = remove_files_in(&self.root).await?;
        let staged = remove_files_in(&self.incomplete).await?;
        info!(stored, staged, "All files removed");
        Ok(stored + staged)
    }
}

async fn remove_files_in(dir: &Path) -> Result<usize, StorageError> {
    let mut listing = match fs::read_dir(dir).await {
        Ok(listing) => listing,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to list {}", dir.display()).into()),
            });
        },
    };

    let mut removed = 0;
    while let Some(entry) = listing.next_entry().await.context("Failed to read directory entry")? {
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "File removed");
                removed += 1;
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {},
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to remove {}", path.display()).into()),
                });
            },
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn enumerate_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let dir = StorageDirectory::new(temp.path().join("not-yet"));
        assert!(dir.enumerate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumerate_skips_subdirectories() {
        let temp = TempDir::new().unwrap();
        let dir = StorageDirectory::new(temp.path().to_path_buf());
        dir.ensure().await.unwrap();
        std::fs::write(dir.incomplete().join("abc.staged"), b"x").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("visible.txt"), b"hello").unwrap();

        let entries = dir.enumerate().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name(), "visible.txt");
        assert_eq!(entries[0].size, 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ensure_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = StorageDirectory::new(temp.path().join("root"));
        dir.ensure().await.unwrap();
        dir.ensure().await.unwrap();

        let mode = std::fs::metadata(dir.root()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "storage root must be owner-only");
        assert!(dir.incomplete().is_dir());
    }

    #[tokio::test]
    async fn read_info_canonicalizes_without_touching_disk() {
        let temp = TempDir::new().unwrap();
        let dir = StorageDirectory::new(temp.path().to_path_buf());

        let location = dir.read_info("a/b.txt").unwrap();
        assert_eq!(location.disk_name(), "a_b.txt");
        assert_eq!(location.root, temp.path());
        assert_eq!(location.path(), temp.path().join("a_b.txt"));
    }

    #[tokio::test]
    async fn remove_refuses_directories() {
        let temp = TempDir::new().unwrap();
        let dir = StorageDirectory::new(temp.path().to_path_buf());
        dir.ensure().await.unwrap();

        let err = dir.remove(INCOMPLETE_DIR).await.unwrap_err();
        assert!(matches!(err, StorageError::FileNotFound { .. }));
        assert!(dir.incomplete().is_dir());
    }
}
