//! File storage engine for Limbo, an ephemeral file-sharing service.
//!
//! Clients upload files under names they choose; the store keeps them in one flat
//! directory for a limited time and then deletes them.
//!
//! # Core Features
//!
//! - **Safe Names**: Any user-supplied string maps to a single, bounded path segment
//!   through an idempotent canonicalizer ([`canonicalize`]).
//! - **Atomic Uploads**: Bytes are staged under `incomplete/` and renamed into place
//!   on commit, so readers never see a partial file.
//! - **No Overwrites**: Uploading an existing name fails with [`StorageError::Collision`].
//! - **Retention**: A background sweeper deletes files older than the retention window
//!   and staged uploads abandoned by crashed or cancelled clients.
//!
//! # Examples
//!
//! ```rust
//! use limbo_storage::{FileStore, StorageError};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("storage");
//!     let store = FileStore::builder()
//!         .root(&root)
//!         .max_age(Duration::from_secs(3600))
//!         .build()
//!         .await?;
//!     store.start();
//!
//!     let mut writer = store.open_writer("CON.txt").await?;
//!     writer.write(b"reserved device names are rewritten").await?;
//!     let entry = writer.commit().await?.expect("storage is enabled");
//!     assert_eq!(entry.display_name(), "DEV.txt");
//!
//!     store.stop().await;
//!     Ok(())
//! }
//! ```

mod builder;
mod directory;
mod engine;
mod error;
mod name;
mod retention;
mod writer;

pub use builder::{FileStoreBuilder, NoRoot, WithRoot};
pub use directory::{FileLocation, INCOMPLETE_DIR, StoredEntry};
pub use engine::{FileStore, FileStoreInner};
pub use error::{StorageError, StorageErrorExt};
pub use name::{EMPTY_PLACEHOLDER, FileName, MAX_NAME_LEN, RESERVED_MARKER, canonicalize};
pub use retention::{
    DEFAULT_MAX_AGE, DEFAULT_POLL_INTERVAL, DEFAULT_SWEEP_INTERVAL, DEFAULT_TEMP_MAX_AGE,
    RetentionPolicy, SweepReport, SweeperState,
};
pub use writer::FileWriter;
