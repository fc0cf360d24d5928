//! # LanShare Daemon Library
//!
//! This crate shares one directory with browsers on the local network:
//! listing with search and sort, streaming uploads (including whole folders)
//! and range-aware downloads.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     HTTP router (axum)                    │
//! │   /api/list      /upload      /download/*    /api/info    │
//! ├───────────────────────────────────────────────────────────┤
//! │  DirectoryBrowser   UploadIngestor   DownloadStreamer     │
//! ├───────────────────────────────────────────────────────────┤
//! │                StorageRoot (path confinement)             │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests are independent. The only shared state is the immutable
//! [`StorageRoot`], which every component receives explicitly.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::files::StorageRoot;
//! use daemon::http::{router, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let root = StorageRoot::new("/srv/share")?;
//!     let app = router(AppState::new(root, "http://192.168.1.20:3000/"));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path confinement, listing, upload and download
//! - [`http`]: Routes, handlers and error responses
//! - [`ui`]: LAN address discovery and QR codes

pub mod config;
pub mod files;
pub mod http;
pub mod ui;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{
    DirectoryBrowser, DirectoryEntry, DownloadStreamer, FileError, StorageRoot, UploadIngestor,
};

// Re-export HTTP types for convenience
pub use http::{router, ApiError, AppState};
