//! Quota policy hook for uploads.
//!
//! No quota is enforced by default. A policy is consulted before every write
//! with the size the item would have afterwards.

use std::fmt::Debug;

use super::error::{FileError, Result};

/// Decides whether an upload item may grow to a given size.
pub trait QuotaPolicy: Debug + Send + Sync {
    /// Check that the item at `path` may reach `size` bytes.
    fn check(&self, path: &str, size: u64) -> Result<()>;
}

/// Accepts everything; the volume itself is the only limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl QuotaPolicy for Unlimited {
    fn check(&self, _path: &str, _size: u64) -> Result<()> {
        Ok(())
    }
}

/// Caps the size of every individual uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFileSize {
    limit: u64,
}

impl MaxFileSize {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl QuotaPolicy for MaxFileSize {
    fn check(&self, path: &str, size: u64) -> Result<()> {
        if size > self.limit {
            return Err(FileError::QuotaExceeded {
                path: path.to_string(),
                size,
                limit: self.limit,
            });
        }
        Ok(())
    }
}
