//! File-tree access layer: everything that touches the shared directory.
//!
//! - [`root`]: path resolution confined to the storage root
//! - [`browser`]: directory listing with search and sorting
//! - [`upload`]: streaming multi-item upload ingestion
//! - [`download`]: chunked, range-aware downloads
//! - [`quota`]: per-file size policy consulted during uploads
//!
//! # Security
//!
//! Every client-supplied path goes through [`StorageRoot`] before any
//! filesystem call. Traversal segments are rejected, symlinks are followed
//! and re-checked against the canonical root, and error messages only carry
//! root-relative paths.

pub mod browser;
pub mod download;
pub mod error;
pub mod quota;
pub mod root;
pub mod upload;

pub use browser::{sort_entries, DirectoryBrowser, DirectoryEntry};
pub use download::{ByteRange, Download, DownloadStreamer};
pub use error::{FileError, Result};
pub use quota::{MaxFileSize, QuotaPolicy, Unlimited};
pub use root::StorageRoot;
pub use upload::{ChunkSource, MemorySource, UploadIngestor, UploadItemHeader, UploadSource};
