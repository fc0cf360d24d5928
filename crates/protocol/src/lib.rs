//! # LanShare Protocol Library
//!
//! This crate provides the wire types exchanged between the LanShare daemon
//! and the presentation layer that browses, uploads to and downloads from a
//! shared directory.
//!
//! ## Overview
//!
//! - **Listings**: [`ListingResponse`] of [`FileEntry`] values, ordered by a
//!   [`SortKey`]
//! - **Uploads**: [`UploadReport`] with a per-item [`UploadItemStatus`], and
//!   [`UploadProgress`] snapshots for progress observers
//! - **Errors**: [`ErrorBody`] carrying a machine-readable [`ErrorCode`] and
//!   a short user-facing message
//!
//! All bodies are JSON.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{SortKey, UploadProgress};
//!
//! // Unknown sort keys fall back to name ordering.
//! assert_eq!(SortKey::parse_or_default("colour"), SortKey::Name);
//!
//! let progress = UploadProgress { bytes_transferred: 50, total_bytes: Some(200) };
//! assert_eq!(progress.percent(), Some(25.0));
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Wire message definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    from_json, to_json, ErrorBody, ErrorCode, FileEntry, ListingResponse, ServerInfo, SortField,
    SortKey, UploadItemStatus, UploadProgress, UploadReport, API_VERSION,
};
