use crate::directory::StorageDirectory;
use crate::engine::{FileStore, FileStoreInner};
use crate::error::{StorageError, StorageErrorExt};
use crate::retention::{RetentionPolicy, Sweeper};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
struct StoreConfig {
    policy: RetentionPolicy,
    disabled: bool,
    create: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { policy: RetentionPolicy::default(), disabled: false, create: true }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct FileStoreBuilder<S: Sealed = NoRoot> {
    state: S,
    config: StoreConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> FileStoreBuilder<S> {
    /// Retention window for published files (default 24h).
    #[must_use = "Sets how long stored files are kept"]
    pub const fn max_age(mut self, max_age: Duration) -> Self {
        self.config.policy.max_age = max_age;
        self
    }

    /// Age after which a staged upload is treated as abandoned (default 15 min).
    #[must_use = "Sets how long staged uploads are kept"]
    pub const fn temp_max_age(mut self, max_age: Duration) -> Self {
        self.config.policy.temp_max_age = max_age;
        self
    }

    #[must_use = "Sets the minimum time between retention sweeps"]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.policy.sweep_interval = interval;
        self
    }

    #[must_use = "Sets how often the sweeper checks for a stop request"]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.policy.poll_interval = interval;
        self
    }

    #[must_use = "Replaces the whole retention policy"]
    pub const fn policy(mut self, policy: RetentionPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Accept uploads but discard their bytes. Used for throughput testing.
    #[must_use = "Sets whether uploads are discarded"]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.config.disabled = disabled;
        self
    }

    #[must_use = "Sets whether the storage root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> FileStoreBuilder<N> {
        FileStoreBuilder { state, config: self.config }
    }
}

impl FileStoreBuilder<NoRoot> {
    #[must_use = "Creates a new store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the storage root directory"]
    pub fn root(self, path: impl Into<PathBuf>) -> FileStoreBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl FileStoreBuilder<WithRoot> {
    /// Validates the policy, prepares the root and returns the store handle.
    ///
    /// With `create(true)` (the default) the root and its staging directory are
    /// created with owner-only permissions. Otherwise they are created lazily on
    /// the first upload. The root is resolved to an absolute path either way.
    /// The retention sweeper is not started; call [`FileStore::start`].
    ///
    /// # Errors
    /// * [`StorageError::InvalidConfiguration`] for a zero sweep or poll interval.
    /// * [`StorageError::Io`] if the root cannot be created or resolved.
    pub async fn build(self) -> Result<FileStore, StorageError> {
        validate(&self.config.policy)?;
        let root = self.state.0;

        if self.config.create {
            StorageDirectory::new(root.clone()).ensure().await?;
            info!(path = %root.display(), "Bootstrapped storage root directory");
        }

        let resolved = match fs::canonicalize(&root).await {
            Ok(path) => path,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => std::path::absolute(&root)
                .context(format!("Failed to resolve storage root: {}", root.display()))?,
            Err(err) => {
                let context = format!("Failed to resolve storage root: {}", root.display());
                return Err(StorageError::Io { source: err, context: Some(context.into()) });
            },
        };

        info!(
            root = %resolved.display(),
            max_age_secs = self.config.policy.max_age.as_secs(),
            disabled = self.config.disabled,
            "File storage ready"
        );

        Ok(FileStore {
            inner: Arc::new(FileStoreInner {
                directory: StorageDirectory::new(resolved),
                policy: self.config.policy,
                disabled: self.config.disabled,
                sweeper: Sweeper::default(),
            }),
        })
    }
}

fn validate(policy: &RetentionPolicy) -> Result<(), StorageError> {
    if policy.sweep_interval.is_zero() || policy.poll_interval.is_zero() {
        return Err(StorageError::InvalidConfiguration {
            message: "Sweep and poll intervals must be greater than zero".into(),
            context: None,
        });
    }
    Ok(())
}
