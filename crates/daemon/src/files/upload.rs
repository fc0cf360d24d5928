//! Streaming upload ingestion.
//!
//! An upload is consumed as a pull-based sequence of items, each carrying a
//! sub-path and a lazy sequence of byte chunks. Chunks go to disk as they
//! arrive, so memory use is bounded by one chunk plus the write buffer no
//! matter how large the upload is.
//!
//! Items are independent: a bad sub-path or a failed write is recorded in the
//! [`UploadReport`] and the next item is processed. Partially written files
//! are left on disk. Existing files are overwritten.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use protocol::{UploadItemStatus, UploadProgress, UploadReport};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use super::error::{FileError, Result};
use super::quota::{QuotaPolicy, Unlimited};
use super::root::StorageRoot;

/// Write buffer size for uploaded files (64KB).
pub const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Per-item metadata announced before the item's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItemHeader {
    /// Path relative to the upload's target directory; may contain
    /// intermediate directories for folder uploads.
    pub sub_path: String,
    /// Size announced by the client, if any.
    pub declared_size: Option<u64>,
    /// Whether the part carries a file. Other parts (plain form fields) are
    /// drained and ignored.
    pub is_file: bool,
}

impl UploadItemHeader {
    pub fn new(sub_path: impl Into<String>) -> Self {
        Self {
            sub_path: sub_path.into(),
            declared_size: None,
            is_file: true,
        }
    }

    /// Header for a part that is not a file.
    pub fn ignored(name: impl Into<String>) -> Self {
        Self {
            is_file: false,
            ..Self::new(name)
        }
    }
}

/// Lazy sequence of content chunks for one upload item.
#[allow(async_fn_in_trait)]
pub trait ChunkSource {
    /// Next chunk, or `None` once the item's content is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Lazy sequence of upload items.
///
/// An item's chunks borrow the source, so the previous item must be dropped
/// before the next one is pulled. This matches how multipart bodies are laid
/// out on the wire.
#[allow(async_fn_in_trait)]
pub trait UploadSource {
    type Item<'a>: ChunkSource
    where
        Self: 'a;

    /// Next item, or `None` at the end of the upload.
    async fn next_item(&mut self) -> Result<Option<(UploadItemHeader, Self::Item<'_>)>>;
}

/// Upload source over already-buffered items.
#[derive(Debug, Default)]
pub struct MemorySource {
    items: VecDeque<(UploadItemHeader, VecDeque<Bytes>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item whose content arrives as the given chunks.
    pub fn push<I, B>(&mut self, header: UploadItemHeader, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.items
            .push_back((header, chunks.into_iter().map(Into::into).collect()));
    }

    /// Builder form of [`MemorySource::push`] for a single-chunk item.
    pub fn with_file(mut self, sub_path: &str, content: impl Into<Bytes>) -> Self {
        let content: Bytes = content.into();
        self.push(UploadItemHeader::new(sub_path), [content]);
        self
    }

    /// Sum of all buffered file content.
    pub fn total_bytes(&self) -> u64 {
        self.items
            .iter()
            .filter(|(header, _)| header.is_file)
            .flat_map(|(_, chunks)| chunks.iter())
            .map(|c| c.len() as u64)
            .sum()
    }
}

/// Chunks of one [`MemorySource`] item.
#[derive(Debug)]
pub struct MemoryChunks {
    chunks: VecDeque<Bytes>,
}

impl ChunkSource for MemoryChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.chunks.pop_front())
    }
}

impl UploadSource for MemorySource {
    type Item<'a> = MemoryChunks;

    async fn next_item(&mut self) -> Result<Option<(UploadItemHeader, MemoryChunks)>> {
        Ok(self
            .items
            .pop_front()
            .map(|(header, chunks)| (header, MemoryChunks { chunks })))
    }
}

/// Byte accounting for one upload request.
#[derive(Debug)]
struct UploadSession {
    bytes_transferred: u64,
    total_bytes: Option<u64>,
}

impl UploadSession {
    fn new(total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
        }
    }

    fn advance(&mut self, len: usize) -> UploadProgress {
        self.bytes_transferred += len as u64;
        self.progress()
    }

    fn progress(&self) -> UploadProgress {
        UploadProgress {
            bytes_transferred: self.bytes_transferred,
            // Never report a total below what has already arrived.
            total_bytes: self.total_bytes.map(|t| t.max(self.bytes_transferred)),
        }
    }

    /// Final snapshot; a declared total always equals the received count.
    fn finish(&self) -> UploadProgress {
        if let Some(total) = self.total_bytes {
            if total != self.bytes_transferred {
                debug!(
                    declared = total,
                    received = self.bytes_transferred,
                    "Declared upload size did not match received bytes"
                );
            }
        }
        UploadProgress {
            bytes_transferred: self.bytes_transferred,
            total_bytes: self.total_bytes.map(|_| self.bytes_transferred),
        }
    }
}

/// Writes upload items under a target directory.
#[derive(Debug, Clone)]
pub struct UploadIngestor {
    root: StorageRoot,
    quota: Arc<dyn QuotaPolicy>,
}

impl UploadIngestor {
    /// Create an ingestor with no quota.
    pub fn new(root: StorageRoot) -> Self {
        Self {
            root,
            quota: Arc::new(Unlimited),
        }
    }

    /// Set the quota policy consulted before each write.
    pub fn with_quota(mut self, quota: Arc<dyn QuotaPolicy>) -> Self {
        self.quota = quota;
        self
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Consume `source`, writing each item under `target_dir`.
    ///
    /// `target_dir` must already be resolved through the storage root.
    /// `on_progress` is called after every chunk and once at the end.
    ///
    /// Per-item failures are recorded in the report. An error is returned
    /// only when the source itself fails, which aborts the remaining items.
    pub async fn ingest<S, F>(
        &self,
        target_dir: &Path,
        total_bytes: Option<u64>,
        source: &mut S,
        mut on_progress: F,
    ) -> Result<UploadReport>
    where
        S: UploadSource,
        F: FnMut(UploadProgress),
    {
        let target_display = self.root.relative_display(target_dir);
        let mut report = UploadReport::new(target_display.clone());
        let mut session = UploadSession::new(total_bytes);

        while let Some((header, mut chunks)) = source.next_item().await? {
            if !header.is_file {
                debug!(field = %header.sub_path, "Ignoring non-file upload part");
                while chunks.next_chunk().await?.is_some() {}
                continue;
            }

            let mut written = 0u64;
            let outcome = self
                .write_item(
                    target_dir,
                    &header,
                    &mut chunks,
                    &mut written,
                    &mut session,
                    &mut on_progress,
                )
                .await;

            match outcome {
                Ok(()) => {
                    info!(
                        target = %target_display,
                        path = %header.sub_path,
                        bytes = written,
                        "Stored uploaded file"
                    );
                    report.push(UploadItemStatus::written(&header.sub_path, written));
                }
                Err(FileError::Source(msg)) => {
                    warn!(
                        target = %target_display,
                        path = %header.sub_path,
                        error = %msg,
                        "Upload stream failed; aborting remaining items"
                    );
                    return Err(FileError::Source(msg));
                }
                Err(e) => {
                    warn!(
                        target = %target_display,
                        path = %header.sub_path,
                        bytes = written,
                        error = %e,
                        "Upload item failed"
                    );
                    // Skip the rest of this item so the next one can be read.
                    while let Some(chunk) = chunks.next_chunk().await? {
                        on_progress(session.advance(chunk.len()));
                    }
                    report.push(UploadItemStatus::failed(
                        &header.sub_path,
                        written,
                        e.to_body(),
                    ));
                }
            }
        }

        let progress = session.finish();
        report.bytes_transferred = progress.bytes_transferred;
        on_progress(progress);

        info!(
            target = %target_display,
            written = report.written,
            failed = report.failed,
            bytes = report.bytes_transferred,
            "Upload finished"
        );

        Ok(report)
    }

    async fn write_item<C, F>(
        &self,
        target_dir: &Path,
        header: &UploadItemHeader,
        chunks: &mut C,
        written: &mut u64,
        session: &mut UploadSession,
        on_progress: &mut F,
    ) -> Result<()>
    where
        C: ChunkSource,
        F: FnMut(UploadProgress),
    {
        let sub_path = header.sub_path.as_str();

        if let Some(declared) = header.declared_size {
            self.quota.check(sub_path, declared)?;
        }

        let destination = self.root.resolve_within(target_dir, sub_path).await?;
        if destination == target_dir {
            return Err(FileError::InvalidPath(sub_path.to_string()));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
            self.root.ensure_confined(parent).await?;
        }

        if fs::metadata(&destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(FileError::IsADirectory(sub_path.to_string()));
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&destination)
            .await?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let mut outcome = Ok(());
        loop {
            let chunk = match chunks.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            let len = chunk.len();
            on_progress(session.advance(len));
            if let Err(e) = self.quota.check(sub_path, *written + len as u64) {
                outcome = Err(e);
                break;
            }
            if let Err(e) = writer.write_all(&chunk).await {
                outcome = Err(e.into());
                break;
            }
            *written += len as u64;
        }

        // Whatever was accepted stays on disk, even when the item failed.
        let flushed = writer.flush().await;
        match (outcome, flushed) {
            (Err(e), Err(flush_err)) => {
                debug!(path = %sub_path, error = %flush_err, "Flush after failed item also failed");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), flushed) => Ok(flushed?),
        }
    }
}
