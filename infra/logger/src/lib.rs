//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for Limbo.
//!
//! * Console output (compact, ANSI) is on by default.
//! * File output goes through a rolling, non-blocking appender; the returned
//!   [`Logger`] owns the worker guard and must outlive the program's logging.
//! * Filtering starts from [`LoggerBuilder::level`], can be refined with
//!   [`LoggerBuilder::env_filter`], and is otherwise overridable through `RUST_LOG`.
//!
//! ## Example
//!
//! ```rust
//! # use limbo_logger::{Logger, LevelFilter};
//! let _logger = Logger::builder()
//!     .name("limbo")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use private::Sealed;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 7;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

#[derive(Debug)]
pub struct NoName;
#[derive(Debug)]
pub struct WithName(String);
#[derive(Debug)]
pub struct NoFile;
#[derive(Debug)]
pub struct WithFile;

mod private {
    pub trait Sealed {}
}
impl Sealed for NoName {}
impl Sealed for WithName {}
impl Sealed for NoFile {}
impl Sealed for WithFile {}

/// Typestate builder for the global subscriber.
///
/// A name is mandatory (it prefixes log files); file-only knobs such as
/// [`rotation`](LoggerBuilder::rotation) unlock after [`path`](LoggerBuilder::path).
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = NoName, F: Sealed = NoFile> {
    config: LoggerConfig,
    name: N,
    file: PhantomData<F>,
}

impl<F: Sealed> LoggerBuilder<NoName, F> {
    /// Sets the logger name, also used as the log file prefix.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<WithName, F> {
        LoggerBuilder { name: WithName(name.into()), config: self.config, file: PhantomData }
    }
}

impl LoggerBuilder<WithName, WithFile> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Writes the file output as JSON lines; the console stays human-readable.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }
}

impl<F: Sealed> LoggerBuilder<WithName, F> {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Adds filter directives (e.g. `limbo_storage=debug,tower_http=info`).
    ///
    /// Invalid directives make [`LoggerBuilder::init`] fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Enables rolling file output into `path`.
    pub fn path(self, path: impl Into<PathBuf>) -> LoggerBuilder<WithName, WithFile> {
        let mut config = self.config;
        config.path = Some(path.into());
        LoggerBuilder { config, name: self.name, file: PhantomData }
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, `max_files == 0`,
    ///   a malformed filter, or when no output is enabled.
    /// * [`LoggerError::Appender`] if the log directory cannot be used.
    /// * [`LoggerError::Subscriber`] if a global subscriber already exists.
    pub fn init(self) -> Result<Logger, LoggerError> {
        validate_config(&self.config, &self.name.0)?;
        let env_filter = build_env_filter(&self.config)?;

        let mut layers = Vec::new();
        if self.config.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = match self.config.path {
            Some(path) => {
                fs::create_dir_all(&path).map_err(|e| LoggerError::Internal {
                    message: e.to_string().into(),
                    context: Some(format!("Failed to create path: {}", path.display()).into()),
                })?;

                let appender = RollingFileAppender::builder()
                    .rotation(self.config.rotation)
                    .filename_prefix(&self.name.0)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(self.config.max_files)
                    .build(path)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let file_layer = layer().with_writer(writer).with_ansi(false);
                layers.push(if self.config.json {
                    file_layer.json().boxed()
                } else {
                    file_layer.boxed()
                });
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No logging layers enabled. Enable console or file output.".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;

        Ok(Logger { guard })
    }
}

/// Handle to the installed logging system.
///
/// Holds the non-blocking writer guard; dropping it flushes and stops file output.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: NoName, file: PhantomData }
    }

    /// Returns the file writer guard, present only when file output is enabled.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

/// Parses a level name such as `"info"` or `"DEBUG"`.
///
/// # Errors
/// Returns [`LoggerError::InvalidConfiguration`] for unknown names.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggerError> {
    level.trim().parse::<LevelFilter>().map_err(|e| LoggerError::InvalidConfiguration {
        message: format!("Unknown log level '{level}': {e}").into(),
        context: None,
    })
}

fn validate_config(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "Logger name cannot be empty".into(),
            context: None,
        });
    }
    if config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }
    Ok(())
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.env_filter {
        None => Ok(builder.from_env_lossy()),
        Some(filter) => builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
            message: format!("Invalid env filter '{filter}': {e}").into(),
            context: None,
        }),
    }
}
