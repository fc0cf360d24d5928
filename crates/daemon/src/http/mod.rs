//! HTTP surface over the file-tree access layer.
//!
//! | Route               | Method | Handler                  |
//! |---------------------|--------|--------------------------|
//! | `/api/list`         | GET    | [`handlers::list`]        |
//! | `/upload`           | POST   | [`handlers::upload`]      |
//! | `/download/{*path}` | GET    | [`handlers::download`]    |
//! | `/api/info`         | GET    | [`handlers::server_info`] |
//! | `/api/qr.png`       | GET    | [`handlers::qr_png`]      |

pub mod error;
pub mod handlers;
pub mod multipart;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::files::{DirectoryBrowser, DownloadStreamer, MaxFileSize, StorageRoot, UploadIngestor};

pub use error::{ApiError, ApiResult};

/// Shared, immutable state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub browser: DirectoryBrowser,
    pub ingestor: UploadIngestor,
    pub downloads: DownloadStreamer,
    /// URL advertised to clients on the LAN.
    pub share_url: String,
}

impl AppState {
    /// State with defaults: no upload limit, 64KB download chunks.
    pub fn new(root: StorageRoot, share_url: impl Into<String>) -> Self {
        Self {
            browser: DirectoryBrowser::new(root.clone()),
            ingestor: UploadIngestor::new(root.clone()),
            downloads: DownloadStreamer::new(root),
            share_url: share_url.into(),
        }
    }

    /// State configured from the `[storage]` section.
    pub fn from_config(root: StorageRoot, config: &Config, share_url: impl Into<String>) -> Self {
        let mut state = Self::new(root, share_url);
        state.downloads = state.downloads.with_chunk_size(config.storage.chunk_size);
        if let Some(limit) = config.upload_limit() {
            state.ingestor = state.ingestor.with_quota(Arc::new(MaxFileSize::new(limit)));
        }
        state
    }

    pub fn root(&self) -> &StorageRoot {
        self.browser.root()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/list", get(handlers::list))
        .route("/api/info", get(handlers::server_info))
        .route("/api/qr.png", get(handlers::qr_png))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/download/{*path}", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
