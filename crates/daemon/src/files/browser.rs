//! Directory listing with search and sort.
//!
//! Listings are non-recursive. Directories and files are ordered together by
//! the requested key, with ties broken by name so repeated requests always
//! return the same order.

use std::cmp::Ordering;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use protocol::{FileEntry, SortField, SortKey};
use tokio::fs;
use tracing::debug;

use super::error::{FileError, Result};
use super::root::StorageRoot;

/// A directory entry with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
}

impl DirectoryEntry {
    /// Convert to the wire representation.
    pub fn to_protocol(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            is_dir: self.is_dir,
            size: self.size,
            modified: DateTime::<Utc>::from(self.modified),
        }
    }
}

/// Directory browser bound to a storage root.
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    root: StorageRoot,
    /// Whether dot-files are listed.
    include_hidden: bool,
}

impl DirectoryBrowser {
    /// Create a browser over the given root. Hidden entries are listed.
    pub fn new(root: StorageRoot) -> Self {
        Self {
            root,
            include_hidden: true,
        }
    }

    /// Set whether entries starting with `.` are listed.
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Resolve a client path and list it.
    pub async fn list(
        &self,
        relative: &str,
        search: &str,
        sort: SortKey,
    ) -> Result<Vec<DirectoryEntry>> {
        let dir = self.root.resolve_dir(relative).await?;
        self.list_directory(&dir, search, sort).await
    }

    /// List an already-resolved directory.
    ///
    /// Children whose metadata can't be read, and symlinks leading outside
    /// the root, are skipped.
    pub async fn list_directory(
        &self,
        dir: &Path,
        search: &str,
        sort: SortKey,
    ) -> Result<Vec<DirectoryEntry>> {
        let rel = self.root.relative_display(dir);

        let metadata = fs::metadata(dir)
            .await
            .map_err(|e| FileError::from_io(e, &rel))?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(rel));
        }

        let mut reader = fs::read_dir(dir)
            .await
            .map_err(|e| FileError::from_io(e, &rel))?;

        let needle = search.to_lowercase();
        let mut results = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();

            if !self.include_hidden && name.starts_with('.') {
                continue;
            }
            if !needle.is_empty() && !name.to_lowercase().contains(&needle) {
                continue;
            }

            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    debug!(name = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if file_type.is_symlink() {
                match fs::canonicalize(entry.path()).await {
                    Ok(target) if target.starts_with(self.root.path()) => {}
                    _ => {
                        debug!(name = %name, "Skipping symlink leading outside the storage root");
                        continue;
                    }
                }
            }

            // Follows symlinks so a link is reported as what it points at.
            let metadata = match fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(e) => {
                    debug!(name = %name, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };

            let is_dir = metadata.is_dir();
            results.push(DirectoryEntry {
                name,
                is_dir,
                size: if is_dir { 0 } else { metadata.len() },
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        sort_entries(&mut results, sort);

        debug!(
            path = %rel,
            count = results.len(),
            sort = %sort,
            "Listed directory"
        );

        Ok(results)
    }
}

/// Sort entries by `key`; ties are broken by name ascending.
pub fn sort_entries(entries: &mut [DirectoryEntry], key: SortKey) {
    entries.sort_by(|a, b| compare_entries(a, b, key));
}

fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry, key: SortKey) -> Ordering {
    let primary = match key.field() {
        SortField::Name => compare_names(&a.name, &b.name),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Modified => a.modified.cmp(&b.modified),
    };
    let primary = if key.is_descending() {
        primary.reverse()
    } else {
        primary
    };
    primary.then_with(|| compare_names(&a.name, &b.name))
}

/// Case-insensitive name order, falling back to byte order so the result
/// is total.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};
    use std::os::unix::fs::symlink;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_modified(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn entry(name: &str, is_dir: bool, size: u64, secs: u64) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            is_dir,
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn create_browser() -> (DirectoryBrowser, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = StorageRoot::new(temp_dir.path()).unwrap();
        (DirectoryBrowser::new(root), temp_dir)
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (browser, temp_dir) = create_browser();
        stdfs::create_dir(temp_dir.path().join("subdir")).unwrap();
        stdfs::write(temp_dir.path().join("file.txt"), "Hello").unwrap();
        stdfs::write(temp_dir.path().join("subdir/nested.txt"), "Nested").unwrap();

        let entries = browser.list("", "", SortKey::Name).await.unwrap();

        // Non-recursive, sorted by name with no directory grouping.
        assert_eq!(names(&entries), vec!["file.txt", "subdir"]);
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 5);
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].size, 0);
    }

    #[tokio::test]
    async fn test_list_hidden_toggle() {
        let (browser, temp_dir) = create_browser();
        stdfs::write(temp_dir.path().join(".hidden"), "h").unwrap();
        stdfs::write(temp_dir.path().join("shown"), "s").unwrap();

        let entries = browser.list("", "", SortKey::Name).await.unwrap();
        assert_eq!(names(&entries), vec![".hidden", "shown"]);

        let browser = browser.include_hidden(false);
        let entries = browser.list("", "", SortKey::Name).await.unwrap();
        assert_eq!(names(&entries), vec!["shown"]);
    }

    #[tokio::test]
    async fn test_search_case_insensitive() {
        let (browser, temp_dir) = create_browser();
        for name in ["Report.txt", "report_old.txt", "NOTES.md"] {
            stdfs::write(temp_dir.path().join(name), name).unwrap();
        }

        let entries = browser.list("", "report", SortKey::Name).await.unwrap();
        assert_eq!(names(&entries), vec!["Report.txt", "report_old.txt"]);

        let entries = browser.list("", "REPORT", SortKey::NameDesc).await.unwrap();
        assert_eq!(names(&entries), vec!["report_old.txt", "Report.txt"]);

        let entries = browser.list("", "missing", SortKey::Name).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_name_desc_is_reverse_of_name() {
        let (browser, temp_dir) = create_browser();
        for name in ["beta", "Alpha", "gamma.txt", "alpha2", "Zulu"] {
            stdfs::write(temp_dir.path().join(name), "x").unwrap();
        }
        stdfs::create_dir(temp_dir.path().join("delta")).unwrap();

        let ascending = browser.list("", "", SortKey::Name).await.unwrap();
        let mut descending = browser.list("", "", SortKey::NameDesc).await.unwrap();
        descending.reverse();

        assert_eq!(names(&ascending), names(&descending));
        assert_eq!(
            names(&ascending),
            vec!["Alpha", "alpha2", "beta", "delta", "gamma.txt", "Zulu"]
        );
    }

    #[tokio::test]
    async fn test_sort_by_size_and_modified() {
        let (browser, temp_dir) = create_browser();
        stdfs::write(temp_dir.path().join("small"), "1").unwrap();
        stdfs::write(temp_dir.path().join("large"), "1234567890").unwrap();
        stdfs::write(temp_dir.path().join("medium"), "12345").unwrap();
        set_modified(&temp_dir.path().join("small"), 3_000);
        set_modified(&temp_dir.path().join("large"), 1_000);
        set_modified(&temp_dir.path().join("medium"), 2_000);

        let entries = browser.list("", "", SortKey::Size).await.unwrap();
        assert_eq!(names(&entries), vec!["small", "medium", "large"]);

        let entries = browser.list("", "", SortKey::SizeDesc).await.unwrap();
        assert_eq!(names(&entries), vec!["large", "medium", "small"]);

        let entries = browser.list("", "", SortKey::Modified).await.unwrap();
        assert_eq!(names(&entries), vec!["large", "medium", "small"]);

        let entries = browser.list("", "", SortKey::ModifiedDesc).await.unwrap();
        assert_eq!(names(&entries), vec!["small", "medium", "large"]);
    }

    #[test]
    fn test_ties_broken_by_name_ascending() {
        let mut entries = vec![
            entry("c", false, 10, 5),
            entry("a", false, 10, 5),
            entry("dir", true, 0, 5),
            entry("b", false, 10, 5),
        ];

        sort_entries(&mut entries, SortKey::SizeDesc);
        assert_eq!(names(&entries), vec!["a", "b", "c", "dir"]);

        sort_entries(&mut entries, SortKey::Size);
        assert_eq!(names(&entries), vec!["dir", "a", "b", "c"]);

        sort_entries(&mut entries, SortKey::ModifiedDesc);
        assert_eq!(names(&entries), vec!["a", "b", "c", "dir"]);
    }

    #[test]
    fn test_directories_not_grouped_first() {
        let mut entries = vec![
            entry("zeta_dir", true, 0, 1),
            entry("apple.txt", false, 1, 1),
            entry("mid_dir", true, 0, 1),
        ];
        sort_entries(&mut entries, SortKey::Name);
        assert_eq!(names(&entries), vec!["apple.txt", "mid_dir", "zeta_dir"]);
    }

    #[tokio::test]
    async fn test_list_resolved_file_is_not_a_directory() {
        let (browser, temp_dir) = create_browser();
        stdfs::write(temp_dir.path().join("file.txt"), "Hello").unwrap();
        let file = browser.root().path().join("file.txt");

        let result = browser.list_directory(&file, "", SortKey::Name).await;
        assert!(matches!(result, Err(FileError::NotADirectory(p)) if p == "file.txt"));
    }

    #[tokio::test]
    async fn test_list_errors() {
        let (browser, temp_dir) = create_browser();
        stdfs::write(temp_dir.path().join("file.txt"), "Hello").unwrap();

        let result = browser.list("file.txt", "", SortKey::Name).await;
        assert!(matches!(result, Err(FileError::NotADirectory(_))));

        let result = browser.list("nope", "", SortKey::Name).await;
        assert!(matches!(result, Err(FileError::NotFound(_))));

        let result = browser.list("../", "", SortKey::Name).await;
        assert!(matches!(result, Err(FileError::PathEscape(_))));
    }

    #[tokio::test]
    async fn test_symlinks() {
        let (browser, temp_dir) = create_browser();
        let other_dir = TempDir::new().unwrap();
        stdfs::write(other_dir.path().join("secret.txt"), "Secret").unwrap();
        stdfs::write(temp_dir.path().join("file.txt"), "Hello").unwrap();

        symlink(temp_dir.path().join("file.txt"), temp_dir.path().join("link")).unwrap();
        symlink(other_dir.path().join("secret.txt"), temp_dir.path().join("sneaky")).unwrap();

        let entries = browser.list("", "", SortKey::Name).await.unwrap();
        assert_eq!(names(&entries), vec!["file.txt", "link"]);
        assert_eq!(entries[1].size, 5);
    }

    #[test]
    fn test_entry_to_protocol() {
        let entry = entry("test.txt", false, 1024, 1704067200);
        let proto = entry.to_protocol();
        assert_eq!(proto.name, "test.txt");
        assert!(!proto.is_dir);
        assert_eq!(proto.size, 1024);
        assert_eq!(proto.modified.timestamp(), 1704067200);
    }
}
