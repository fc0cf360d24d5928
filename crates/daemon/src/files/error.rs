//! Error taxonomy for the file-tree access layer.
//!
//! Every variant carries the *root-relative* path as the client supplied it,
//! never the absolute location on disk.

use protocol::{ErrorBody, ErrorCode};
use thiserror::Error;

/// Errors that can occur while resolving, listing, uploading or downloading.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path would resolve outside the storage root.
    #[error("path escapes the storage root: {0}")]
    PathEscape(String),

    /// The path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(String),

    /// The path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    /// The path is a directory, not a file.
    #[error("path is a directory: {0}")]
    IsADirectory(String),

    /// The path or file name is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A quota policy rejected the write.
    #[error("quota exceeded for {path}: {size} bytes exceeds limit of {limit} bytes")]
    QuotaExceeded { path: String, size: u64, limit: u64 },

    /// The requested byte range cannot be served.
    #[error("range not satisfiable for file of size {file_size}")]
    RangeNotSatisfiable { file_size: u64 },

    /// The upload stream itself failed (malformed body, client went away).
    #[error("upload stream failed: {0}")]
    Source(String),

    /// Disk-level IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for file operations.
pub type Result<T> = std::result::Result<T, FileError>;

impl FileError {
    /// Map an IO error raised while touching `path`.
    ///
    /// `NotFound` keeps its own variant so callers can tell a missing path
    /// from a failing disk.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound(path.to_string()),
            _ => FileError::Io(err),
        }
    }

    /// Machine-readable code for the wire.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PathEscape(_) => ErrorCode::PathEscape,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotADirectory(_) => ErrorCode::NotADirectory,
            Self::IsADirectory(_) => ErrorCode::IsADirectory,
            Self::InvalidPath(_) => ErrorCode::InvalidPath,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::RangeNotSatisfiable { .. } => ErrorCode::RangeNotSatisfiable,
            Self::Source(_) => ErrorCode::BadRequest,
            Self::Io(_) => ErrorCode::IoFailure,
        }
    }

    /// Short status suitable for showing to the user.
    ///
    /// Never includes filesystem paths or OS error text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PathEscape(_) | Self::InvalidPath(_) => "Invalid path",
            Self::NotFound(_) => "Not found",
            Self::NotADirectory(_) => "Not a directory",
            Self::IsADirectory(_) => "Cannot download a directory",
            Self::QuotaExceeded { .. } => "File too large",
            Self::RangeNotSatisfiable { .. } => "Range not satisfiable",
            Self::Source(_) => "Upload failed",
            Self::Io(_) => "Operation failed",
        }
    }

    /// Wire body for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code(), self.user_message())
    }
}
