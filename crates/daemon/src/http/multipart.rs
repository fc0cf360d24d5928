//! Adapter from axum's multipart extractor to [`UploadSource`].

use axum::extract::multipart::{Field, Multipart, MultipartError};
use bytes::Bytes;

use crate::files::{ChunkSource, FileError, Result, UploadItemHeader, UploadSource};

/// Multipart request body as a lazy sequence of upload items.
///
/// Every part with a non-empty file name is a file; its file name is the
/// sub-path, so folder uploads may carry `dir/sub/file.txt`. Other parts are
/// passed through as ignored items.
pub struct MultipartSource {
    multipart: Multipart,
}

impl MultipartSource {
    pub fn new(multipart: Multipart) -> Self {
        Self { multipart }
    }
}

/// Content of one multipart part.
pub struct FieldChunks<'a> {
    field: Field<'a>,
}

impl ChunkSource for FieldChunks<'_> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.field.chunk().await.map_err(source_error)
    }
}

impl UploadSource for MultipartSource {
    type Item<'a> = FieldChunks<'a>;

    async fn next_item(&mut self) -> Result<Option<(UploadItemHeader, FieldChunks<'_>)>> {
        let Some(field) = self.multipart.next_field().await.map_err(source_error)? else {
            return Ok(None);
        };

        let header = match field.file_name() {
            Some(name) if !name.is_empty() => UploadItemHeader::new(name),
            _ => UploadItemHeader::ignored(field.name().unwrap_or_default()),
        };

        Ok(Some((header, FieldChunks { field })))
    }
}

fn source_error(err: MultipartError) -> FileError {
    FileError::Source(err.body_text())
}
