//! Error responses for the HTTP API.
//!
//! Every error is rendered as `{"error": <code>, "message": <text>}`. The
//! message is the short user-facing status; details only go to the log.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::{ErrorBody, ErrorCode};
use thiserror::Error;

use crate::files::FileError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

/// HTTP status for a file-layer error.
pub fn status_for(err: &FileError) -> StatusCode {
    match err {
        FileError::PathEscape(_)
        | FileError::InvalidPath(_)
        | FileError::NotADirectory(_)
        | FileError::IsADirectory(_)
        | FileError::Source(_) => StatusCode::BAD_REQUEST,
        FileError::NotFound(_) => StatusCode::NOT_FOUND,
        FileError::QuotaExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        FileError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        FileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::File(err) => status_for(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Self::File(err) => err.to_body(),
            Self::BadRequest(msg) => ErrorBody::new(ErrorCode::BadRequest, *msg),
            Self::Internal(_) => ErrorBody::new(ErrorCode::IoFailure, "Operation failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let ApiError::File(FileError::RangeNotSatisfiable { file_size }) = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{file_size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (FileError::PathEscape("..".into()), StatusCode::BAD_REQUEST),
            (FileError::InvalidPath("".into()), StatusCode::BAD_REQUEST),
            (FileError::NotADirectory("a".into()), StatusCode::BAD_REQUEST),
            (FileError::IsADirectory("a".into()), StatusCode::BAD_REQUEST),
            (FileError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (
                FileError::QuotaExceeded {
                    path: "a".into(),
                    size: 2,
                    limit: 1,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                FileError::RangeNotSatisfiable { file_size: 1 },
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
            (
                FileError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[test]
    fn test_range_error_sets_content_range() {
        let response = ApiError::from(FileError::RangeNotSatisfiable { file_size: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */42");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::Internal("/srv/share/x: boom".to_string());
        let body = err.body();
        assert_eq!(body.error, ErrorCode::IoFailure);
        assert!(!body.message.contains("/srv"));
    }
}
