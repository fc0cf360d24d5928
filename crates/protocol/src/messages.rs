//! Wire message definitions for LanShare.
//!
//! These types describe the JSON bodies exchanged between the daemon and the
//! presentation layer: directory listings, upload reports, progress updates
//! and structured errors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current API version reported by the daemon.
pub const API_VERSION: u8 = 1;

/// A single file or directory entry in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Response to a listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingResponse {
    /// The root-relative path that was listed, as supplied by the client.
    pub path: String,
    /// Entries ordered by the requested sort key.
    pub items: Vec<FileEntry>,
}

/// The attribute a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Name,
    Size,
    Modified,
}

/// Sort key accepted by the listing endpoint.
///
/// The set is closed. Anything else coming off the wire is mapped to
/// [`SortKey::Name`] by [`SortKey::parse_or_default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Name, ascending.
    #[default]
    Name,
    /// Size, ascending.
    Size,
    /// Modification time, oldest first.
    Modified,
    /// Name, descending.
    NameDesc,
    /// Size, descending.
    SizeDesc,
    /// Modification time, newest first.
    ModifiedDesc,
}

impl SortKey {
    /// All recognized sort keys.
    pub const ALL: [SortKey; 6] = [
        SortKey::Name,
        SortKey::Size,
        SortKey::Modified,
        SortKey::NameDesc,
        SortKey::SizeDesc,
        SortKey::ModifiedDesc,
    ];

    /// Parse a wire value, falling back to the default for unknown input.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// The primary attribute this key orders by.
    pub fn field(&self) -> SortField {
        match self {
            Self::Name | Self::NameDesc => SortField::Name,
            Self::Size | Self::SizeDesc => SortField::Size,
            Self::Modified | Self::ModifiedDesc => SortField::Modified,
        }
    }

    /// Whether the primary attribute is ordered descending.
    pub fn is_descending(&self) -> bool {
        matches!(self, Self::NameDesc | Self::SizeDesc | Self::ModifiedDesc)
    }

    /// The wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Modified => "modified",
            Self::NameDesc => "name_desc",
            Self::SizeDesc => "size_desc",
            Self::ModifiedDesc => "modified_desc",
        }
    }
}

impl FromStr for SortKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ProtocolError::UnknownSortKey(s.to_string()))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error code carried in error bodies and upload reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The path would resolve outside the shared root.
    PathEscape,
    /// The path does not exist.
    NotFound,
    /// A directory was required.
    NotADirectory,
    /// A file was required.
    IsADirectory,
    /// Disk-level failure (disk full, permission denied, ...).
    IoFailure,
    /// A quota policy rejected the write.
    QuotaExceeded,
    /// The path or file name is malformed.
    InvalidPath,
    /// The requested byte range cannot be served.
    RangeNotSatisfiable,
    /// The request body could not be parsed.
    BadRequest,
}

impl ErrorCode {
    /// The wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathEscape => "path_escape",
            Self::NotFound => "not_found",
            Self::NotADirectory => "not_a_directory",
            Self::IsADirectory => "is_a_directory",
            Self::IoFailure => "io_failure",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidPath => "invalid_path",
            Self::RangeNotSatisfiable => "range_not_satisfiable",
            Self::BadRequest => "bad_request",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error body rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub error: ErrorCode,
    /// Short user-facing status message.
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

/// Outcome of a single item within an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItemStatus {
    /// Sub-path of the item as submitted by the client.
    pub path: String,
    /// Bytes written to disk for this item.
    pub bytes_written: u64,
    /// Failure details, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl UploadItemStatus {
    /// A successfully written item.
    pub fn written(path: impl Into<String>, bytes_written: u64) -> Self {
        Self {
            path: path.into(),
            bytes_written,
            error: None,
        }
    }

    /// A failed item.
    pub fn failed(path: impl Into<String>, bytes_written: u64, error: ErrorBody) -> Self {
        Self {
            path: path.into(),
            bytes_written,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of an upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Root-relative target directory.
    pub target: String,
    /// Number of files written successfully.
    pub written: usize,
    /// Number of files that failed.
    pub failed: usize,
    /// Total bytes received across all items.
    pub bytes_transferred: u64,
    /// Per-item outcome, in stream order.
    pub items: Vec<UploadItemStatus>,
}

impl UploadReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Record the outcome of one item.
    pub fn push(&mut self, status: UploadItemStatus) {
        if status.is_ok() {
            self.written += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(status);
    }

    /// True when at least one item was submitted and none failed.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.written > 0
    }
}

/// Progress of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes received so far across all items.
    pub bytes_transferred: u64,
    /// Total bytes declared by the client, if any.
    pub total_bytes: Option<u64>,
}

impl UploadProgress {
    /// Completion percentage, when the total is known.
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some((self.bytes_transferred as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }
}

/// Static information about the running daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Product name.
    pub name: String,
    /// Daemon version.
    pub version: String,
    /// API version.
    pub api_version: u8,
    /// URL clients on the LAN can reach the daemon at.
    pub url: String,
}

/// Serialize a message to JSON.
pub fn to_json<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Deserialize a message from JSON bytes.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
