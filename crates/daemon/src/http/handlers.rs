//! Request handlers for listing, upload, download and share info.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::{ListingResponse, ServerInfo, SortKey, UploadProgress, UploadReport, API_VERSION};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use super::error::{ApiError, ApiResult};
use super::multipart::MultipartSource;
use super::AppState;
use crate::files::{Download, FileError};
use crate::ui::generate_png_qr_bytes;

/// Product name reported by `/api/info`.
pub const PRODUCT_NAME: &str = "LanShare";

/// Query parameters for `GET /api/list`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Directory relative to the storage root.
    pub path: String,
    /// Case-insensitive substring filter on entry names.
    pub search: String,
    /// One of the six sort keys; anything else sorts by name.
    pub sort: String,
}

/// Query parameters for `POST /upload`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UploadQuery {
    /// Target directory relative to the storage root. Created if missing.
    pub path: String,
    /// Total upload size announced by the client, used for progress.
    pub total: Option<u64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListingResponse>> {
    let sort = SortKey::parse_or_default(&query.sort);
    let entries = state.browser.list(&query.path, &query.search, sort).await?;

    Ok(Json(ListingResponse {
        path: query.path.trim_matches('/').to_string(),
        items: entries.iter().map(|e| e.to_protocol()).collect(),
    }))
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadReport>)> {
    let root = state.ingestor.root();
    let target = root.resolve_for_write(&query.path).await?;

    match fs::metadata(&target).await {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(FileError::NotADirectory(query.path).into());
        }
        Ok(_) => {}
        Err(_) => fs::create_dir_all(&target).await.map_err(FileError::from)?,
    }
    let target = root.ensure_confined(&target).await?;

    let mut source = MultipartSource::new(multipart);
    let mut last_percent = None;
    let report = state
        .ingestor
        .ingest(&target, query.total, &mut source, |progress| {
            log_progress(&progress, &mut last_percent)
        })
        .await?;

    if report.items.is_empty() {
        return Err(ApiError::BadRequest("No files provided"));
    }

    let status = if report.failed == 0 {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(report)))
}

/// Logs upload progress at most once per whole percent.
fn log_progress(progress: &UploadProgress, last_percent: &mut Option<u64>) {
    let Some(percent) = progress.percent().map(|p| p.floor() as u64) else {
        return;
    };
    if *last_percent != Some(percent) {
        *last_percent = Some(percent);
        debug!(
            bytes = progress.bytes_transferred,
            total = progress.total_bytes,
            percent,
            "Upload progress"
        );
    }
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let download = state.downloads.open(&path, range).await?;
    download_response(download)
}

fn download_response(download: Download) -> ApiResult<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(download.content_type.as_ref())?);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition(&download.file_name))?,
    );
    if let Some(modified) = download.modified {
        headers.insert(
            header::LAST_MODIFIED,
            header_value(&httpdate::fmt_http_date(modified))?,
        );
    }

    let status = match download.range {
        Some(range) => {
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&range.content_range(download.total_size))?,
            );
            StatusCode::PARTIAL_CONTENT
        }
        None => StatusCode::OK,
    };

    Ok((status, headers, Body::from_stream(download.stream)).into_response())
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::Internal(format!("invalid header value: {e}")))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

pub async fn server_info(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: PRODUCT_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: API_VERSION,
        url: state.share_url.clone(),
    })
}

pub async fn qr_png(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let url = state.share_url.clone();
    let png = tokio::task::spawn_blocking(move || generate_png_qr_bytes(&url))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    info!(url = %state.share_url, "Served share QR code");
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
