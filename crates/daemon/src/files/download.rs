//! File downloads as chunked byte streams.
//!
//! The size is taken from metadata before any content is read, so the HTTP
//! layer can send `Content-Length` up front. Content is never buffered whole.

use std::io::SeekFrom;
use std::time::SystemTime;

use mime_guess::Mime;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::error::{FileError, Result};
use super::root::StorageRoot;

/// Default read buffer for download streams (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a `Range` header value against a file of `file_size` bytes.
    ///
    /// Supports a single `bytes=a-b`, `bytes=a-` or `bytes=-n` range. Headers
    /// that are malformed or ask for several ranges are ignored and the whole
    /// file is served. An end past the file is clamped to the last byte.
    pub fn parse(header: &str, file_size: u64) -> Result<Option<Self>> {
        let Some(ranges) = header.trim().strip_prefix("bytes=") else {
            return Ok(None);
        };
        if ranges.contains(',') {
            return Ok(None);
        }
        let Some((start_part, end_part)) = ranges.split_once('-') else {
            return Ok(None);
        };
        let (start_part, end_part) = (start_part.trim(), end_part.trim());

        let unsatisfiable = FileError::RangeNotSatisfiable { file_size };
        let last = match file_size.checked_sub(1) {
            Some(last) => last,
            None if start_part.is_empty() && end_part.is_empty() => return Ok(None),
            None => return Err(unsatisfiable),
        };

        let range = if start_part.is_empty() {
            let Ok(suffix) = end_part.parse::<u64>() else {
                return Ok(None);
            };
            if suffix == 0 {
                return Err(unsatisfiable);
            }
            Self {
                start: file_size.saturating_sub(suffix),
                end: last,
            }
        } else {
            let Ok(start) = start_part.parse::<u64>() else {
                return Ok(None);
            };
            let end = if end_part.is_empty() {
                last
            } else {
                match end_part.parse::<u64>() {
                    Ok(end) => end.min(last),
                    Err(_) => return Ok(None),
                }
            };
            if start > last || start > end {
                return Err(unsatisfiable);
            }
            Self { start, end }
        };

        Ok(Some(range))
    }

    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are inclusive, so they always hold at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value.
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// An opened download, ready to be streamed.
#[derive(Debug)]
pub struct Download {
    /// Name to offer the client when saving.
    pub file_name: String,
    /// Size of the whole file.
    pub total_size: u64,
    /// Bytes the stream will yield.
    pub length: u64,
    pub content_type: Mime,
    pub modified: Option<SystemTime>,
    /// Range being served, if partial.
    pub range: Option<ByteRange>,
    pub stream: ReaderStream<Take<File>>,
}

/// Opens files under the storage root for streaming.
#[derive(Debug, Clone)]
pub struct DownloadStreamer {
    root: StorageRoot,
    chunk_size: usize,
}

impl DownloadStreamer {
    pub fn new(root: StorageRoot) -> Self {
        Self {
            root,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the read buffer size used for streams.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Open `relative` for download, honoring an optional `Range` header.
    pub async fn open(&self, relative: &str, range_header: Option<&str>) -> Result<Download> {
        let path = self.root.resolve_file(relative).await?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FileError::from_io(e, relative))?;
        let total_size = metadata.len();

        let range = match range_header {
            Some(header) => ByteRange::parse(header, total_size)?,
            None => None,
        };

        let mut file = File::open(&path)
            .await
            .map_err(|e| FileError::from_io(e, relative))?;

        let length = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                debug!(
                    path = %relative,
                    start = range.start,
                    end = range.end,
                    "Serving byte range"
                );
                range.len()
            }
            None => {
                info!(path = %relative, size = total_size, "Serving download");
                total_size
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Download {
            content_type: mime_guess::from_path(&path).first_or_octet_stream(),
            file_name,
            total_size,
            length,
            modified: metadata.modified().ok(),
            range,
            stream: ReaderStream::with_capacity(file.take(length), self.chunk_size),
        })
    }
}
