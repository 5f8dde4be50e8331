use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy surfaced by every handler. Each variant maps to a stable
/// machine-readable kind plus a human message in the JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered.")]
    DuplicateIdentity,

    /// Covers bad credentials and invalid or expired tokens. Deliberately one
    /// generic message so callers cannot probe which check failed.
    #[error("Invalid credentials.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("Journal has already been decided.")]
    AlreadyDecided,

    #[error("Only PDF uploads are accepted.")]
    UnsupportedType,

    #[error("Uploaded file exceeds the {0} MiB limit.")]
    SizeLimitExceeded(u64),

    #[error("File storage failed. Please try again.")]
    Storage(#[source] std::io::Error),

    #[error("Internal server error.")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::DuplicateIdentity => "duplicate_identity",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::AlreadyDecided => "already_decided",
            ApiError::UnsupportedType => "unsupported_type",
            ApiError::SizeLimitExceeded(_) => "size_limit",
            ApiError::Storage(_) => "storage",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateIdentity | ApiError::AlreadyDecided => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::SizeLimitExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(anyhow::Error::new(err).context("database query failed"))
    }
}

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(err) => error!(?err, "request failed"),
            ApiError::Storage(err) => error!(?err, "artifact storage failed"),
            _ => {}
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_share_one_message() {
        // Token and password failures must be indistinguishable to callers.
        assert_eq!(ApiError::Unauthorized.to_string(), "Invalid credentials.");
        assert_eq!(ApiError::Unauthorized.kind(), "unauthorized");
    }

    #[test]
    fn conflict_variants_use_409() {
        assert_eq!(ApiError::DuplicateIdentity.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyDecided.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn size_limit_mentions_the_cap() {
        let err = ApiError::SizeLimitExceeded(15);
        assert_eq!(err.to_string(), "Uploaded file exceeds the 15 MiB limit.");
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
