use std::borrow::Cow;

/// Errors produced by the file storage engine.
#[limbo_derive::limbo_error]
pub enum StorageError {
    /// The name canonicalizer is not idempotent for some input. This is a defect,
    /// never a user error; the triggering operation is aborted.
    #[error("Name canonicalization integrity violation{}: {message}", format_context(.context))]
    Integrity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A stored file with the same disk name already exists.
    #[error("File already exists{}: {message}", format_context(.context))]
    Collision { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("File not found{}: {message}", format_context(.context))]
    FileNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid storage configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A blocking filesystem task panicked or was cancelled.
    #[error("Background task failure{}: {source}", format_context(.context))]
    Task { source: tokio::task::JoinError, context: Option<Cow<'static, str>> },
}

impl StorageError {
    /// `true` for errors that reject the request itself (collision, missing file)
    /// rather than signalling a server-side failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Collision { .. } | Self::FileNotFound { .. })
    }

    /// Maps `NotFound` I/O failures onto [`StorageError::FileNotFound`] for `name`.
    pub(crate) fn from_io(err: std::io::Error, name: &str, action: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { message: name.to_owned().into(), context: Some(action.into()) }
        } else {
            Self::Io { source: err, context: Some(format!("{action}: {name}").into()) }
        }
    }
}
