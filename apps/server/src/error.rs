use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use limbo_storage::StorageError;
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, error};

/// Failures of a single HTTP request.
#[limbo_derive::limbo_error]
pub enum ApiError {
    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal server error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl ApiError {
    /// Collisions and missing files are rejections the client can act on; every
    /// other failure is reported as a generic server error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Storage { source: StorageError::Collision { .. }, .. } => StatusCode::CONFLICT,
            Self::Storage { source: StorageError::FileNotFound { .. }, .. }
            | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest { message: rejection.body_text().into(), context: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
            ErrorBody { error: "Internal server error".to_owned(), kind: "Internal" }
        } else {
            debug!(kind = self.kind(), error = %self, "Request rejected");
            let kind = match &self {
                Self::Storage { source, .. } if source.is_rejection() => source.kind(),
                other => other.kind(),
            };
            ErrorBody { error: self.to_string(), kind }
        };
        (status, Json(body)).into_response()
    }
}
