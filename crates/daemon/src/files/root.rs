//! Storage root and path confinement.
//!
//! Every client-supplied path goes through [`StorageRoot`] before the
//! filesystem is touched. Listing, upload targets, upload sub-paths and
//! downloads all share the same routine, so there is exactly one place where
//! confinement is decided.
//!
//! # Security
//!
//! - Any `..` segment is rejected outright, including percent-encoded forms
//!   (`%2e%2e`, `%252e%252e`) and segments hidden behind `\` separators.
//! - Leading separators never produce an absolute path; the result is always
//!   joined onto the root.
//! - Symlinks on the path are resolved and the real location must still lie
//!   inside the root. Dangling symlinks are rejected since their target can't
//!   be checked.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use super::error::{FileError, Result};

/// Percent-decoding rounds applied when looking for hidden `..` segments.
const MAX_DECODE_ROUNDS: usize = 5;

/// The single directory exposed by the daemon.
///
/// Cheap to clone; immutable after construction. Pass it explicitly into
/// every operation instead of keeping it in global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    /// Canonical absolute path of the root.
    path: PathBuf,
}

impl StorageRoot {
    /// Create a storage root from an existing directory.
    ///
    /// The path is canonicalized once here; all later checks compare against
    /// the canonical form.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let canonical =
            std::fs::canonicalize(path).map_err(|e| FileError::from_io(e, &shown))?;
        let metadata =
            std::fs::metadata(&canonical).map_err(|e| FileError::from_io(e, &shown))?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(shown));
        }

        Ok(Self { path: canonical })
    }

    /// Canonical absolute path of the root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a path that must exist.
    pub async fn resolve_existing(&self, relative: &str) -> Result<PathBuf> {
        self.confine(&self.path, relative, true).await
    }

    /// Resolve a path that must exist and be a directory.
    pub async fn resolve_dir(&self, relative: &str) -> Result<PathBuf> {
        let resolved = self.resolve_existing(relative).await?;
        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|e| FileError::from_io(e, relative))?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve a path that must exist and be a regular file.
    pub async fn resolve_file(&self, relative: &str) -> Result<PathBuf> {
        let resolved = self.resolve_existing(relative).await?;
        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|e| FileError::from_io(e, relative))?;
        if metadata.is_dir() {
            return Err(FileError::IsADirectory(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Resolve a path that may not exist yet.
    ///
    /// The existing prefix is canonicalized and checked; missing trailing
    /// segments are appended as plain names.
    pub async fn resolve_for_write(&self, relative: &str) -> Result<PathBuf> {
        self.confine(&self.path, relative, false).await
    }

    /// Resolve `sub_path` relative to an already-resolved directory.
    ///
    /// Confinement is still checked against the storage root, so a sub-path
    /// may not climb out of `base` and a symlink inside `base` may not point
    /// outside the root.
    pub async fn resolve_within(&self, base: &Path, sub_path: &str) -> Result<PathBuf> {
        if !base.starts_with(&self.path) {
            warn!(sub_path = %sub_path, "Base directory is outside the storage root");
            return Err(FileError::PathEscape(sub_path.to_string()));
        }
        self.confine(base, sub_path, false).await
    }

    /// Re-check that an existing absolute path is still inside the root.
    ///
    /// Used after directories are created, since the tree may have changed
    /// between resolution and creation.
    pub async fn ensure_confined(&self, path: &Path) -> Result<PathBuf> {
        let rel = self.relative_display(path);
        let canonical = fs::canonicalize(path)
            .await
            .map_err(|e| FileError::from_io(e, &rel))?;
        if !canonical.starts_with(&self.path) {
            warn!(path = %rel, "Path resolved outside the storage root");
            return Err(FileError::PathEscape(rel));
        }
        Ok(canonical)
    }

    /// Root-relative, slash-separated form of an absolute path.
    ///
    /// Paths outside the root collapse to their file name so the root's
    /// location never leaks into logs or responses.
    pub fn relative_display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.path) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    /// Shared confinement routine.
    async fn confine(&self, base: &Path, relative: &str, must_exist: bool) -> Result<PathBuf> {
        let segments = match split_segments(relative) {
            Ok(segments) => segments,
            Err(e) => {
                if matches!(e, FileError::PathEscape(_)) {
                    warn!(path = %relative, "Rejected path traversal attempt");
                }
                return Err(e);
            }
        };

        let mut current = base.to_path_buf();
        let mut index = 0;

        while index < segments.len() {
            let candidate = current.join(segments[index]);

            let metadata = match fs::symlink_metadata(&candidate).await {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if must_exist {
                        return Err(FileError::NotFound(relative.to_string()));
                    }
                    break;
                }
                Err(e) => return Err(FileError::from_io(e, relative)),
            };

            current = if metadata.file_type().is_symlink() {
                let target = match fs::canonicalize(&candidate).await {
                    Ok(t) => t,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        warn!(path = %relative, "Rejected dangling symlink");
                        return Err(FileError::PathEscape(relative.to_string()));
                    }
                    Err(e) => return Err(FileError::from_io(e, relative)),
                };
                if !target.starts_with(&self.path) {
                    warn!(path = %relative, "Rejected symlink pointing outside the storage root");
                    return Err(FileError::PathEscape(relative.to_string()));
                }
                target
            } else {
                candidate
            };

            index += 1;

            // Only directories can have children.
            if index < segments.len() {
                let is_dir = fs::metadata(&current)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    return Err(if must_exist {
                        FileError::NotFound(relative.to_string())
                    } else {
                        FileError::NotADirectory(relative.to_string())
                    });
                }
            }
        }

        for segment in &segments[index..] {
            current.push(segment);
        }

        Ok(current)
    }
}

/// Split a client path into its meaningful segments.
///
/// Both `/` and `\` separate segments; empty and `.` segments are dropped.
/// Fails with [`FileError::PathEscape`] if any segment is, or decodes to,
/// `..`, and with [`FileError::InvalidPath`] on NUL bytes.
pub fn split_segments(relative: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();

    for raw in relative.split(['/', '\\']) {
        if raw.is_empty() || raw == "." {
            continue;
        }
        check_segment(raw, relative)?;
        segments.push(raw);
    }

    Ok(segments)
}

fn check_segment(raw: &str, relative: &str) -> Result<()> {
    let mut current: Cow<'_, str> = Cow::Borrowed(raw);
    check_decoded(&current, relative)?;

    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = match urlencoding::decode(&current) {
            Ok(d) => d.into_owned(),
            // Not valid UTF-8 once decoded, so it can't spell `..`.
            Err(_) => break,
        };
        if decoded == current.as_ref() {
            break;
        }
        check_decoded(&decoded, relative)?;
        current = Cow::Owned(decoded);
    }

    Ok(())
}

fn check_decoded(segment: &str, relative: &str) -> Result<()> {
    if segment.contains('\0') {
        return Err(FileError::InvalidPath(relative.to_string()));
    }
    if segment == ".." || segment.contains(['/', '\\']) {
        return Err(FileError::PathEscape(relative.to_string()));
    }
    Ok(())
}
