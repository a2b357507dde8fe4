//! Listing of the files stored directly in the sandbox root.
//!
//! Only regular files are reported. Hidden entries, subdirectories and
//! symlinks are skipped, so a link pointing outside the sandbox never has its
//! target's metadata exposed.

use std::io;
use std::path::Path;

use protocol::{FileMetadata, UNKNOWN_FORMAT};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use super::guard::SandboxRoot;

/// Smallest size ever reported, in kilobytes.
const MIN_REPORTED_KB: f64 = 0.01;

/// Errors that can occur while listing.
#[derive(Debug, Error)]
pub enum ListError {
    /// The sandbox directory itself could not be read.
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Convert a byte count to kilobytes rounded to two decimals.
///
/// Anything below 0.01 KB, including empty files, is reported as 0.01.
pub fn size_in_kb(bytes: u64) -> f64 {
    let kb = bytes as f64 / 1024.0;
    if kb < MIN_REPORTED_KB {
        MIN_REPORTED_KB
    } else {
        (kb * 100.0).round() / 100.0
    }
}

/// Lowercase extension of `name` without the dot, or `"unknown"`.
pub fn file_format(name: &str) -> String {
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => ext.to_lowercase(),
        _ => UNKNOWN_FORMAT.to_string(),
    }
}

/// Build the listing entry for `name` from the outcome of its stat call.
fn entry_metadata(name: String, metadata: io::Result<std::fs::Metadata>) -> FileMetadata {
    match metadata {
        Ok(metadata) => {
            let format = file_format(&name);
            FileMetadata::new(name, size_in_kb(metadata.len()), format)
        }
        Err(e) => {
            warn!(file = %name, error = %e, "Failed to stat file");
            FileMetadata::unreadable(name, e.to_string())
        }
    }
}

/// Enumerates files in the sandbox root.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    sandbox: SandboxRoot,
}

impl DirectoryLister {
    /// Create a lister over `sandbox`.
    pub fn new(sandbox: SandboxRoot) -> Self {
        Self { sandbox }
    }

    /// List every visible regular file in the sandbox root, sorted by name.
    ///
    /// A file whose metadata cannot be read is still reported, with format
    /// `"error"` and the failure message, and the listing carries on.
    pub async fn list(&self) -> Result<Vec<FileMetadata>, ListError> {
        let root = self.sandbox.path();
        let read_dir_error = |source| ListError::ReadDir {
            path: root.display().to_string(),
            source,
        };

        let mut entries = fs::read_dir(root).await.map_err(read_dir_error)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            match entry.file_type().await {
                Ok(file_type) if !file_type.is_file() => continue,
                Ok(_) => files.push(entry_metadata(name, entry.metadata().await)),
                Err(e) => files.push(entry_metadata(name, Err(e))),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = files.len(), "Listed sandbox files");

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ERROR_FORMAT, SIZE_UNIT};
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn lister(temp_dir: &TempDir) -> DirectoryLister {
        DirectoryLister::new(SandboxRoot::new(temp_dir.path()).unwrap())
    }

    #[test]
    fn test_size_in_kb() {
        assert_eq!(size_in_kb(2048), 2.0);
        assert_eq!(size_in_kb(1536), 1.5);
        assert_eq!(size_in_kb(1000), 0.98);
        assert_eq!(size_in_kb(11), 0.01);
        assert_eq!(size_in_kb(5), 0.01);
        assert_eq!(size_in_kb(0), 0.01);
    }

    #[test]
    fn test_file_format() {
        assert_eq!(file_format("a.txt"), "txt");
        assert_eq!(file_format("Photo.JPG"), "jpg");
        assert_eq!(file_format("archive.tar.gz"), "gz");
        assert_eq!(file_format("Makefile"), "unknown");
        assert_eq!(file_format("trailing."), "unknown");
    }

    #[test]
    fn test_entry_metadata_reports_stat_failure() {
        let entry = entry_metadata(
            "locked.bin".to_string(),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied")),
        );

        assert_eq!(entry.name, "locked.bin");
        assert_eq!(entry.size, 0.0);
        assert_eq!(entry.unit, SIZE_UNIT);
        assert_eq!(entry.format, ERROR_FORMAT);
        assert_eq!(entry.error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_entry_metadata_from_stat() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Report.PDF");
        std_fs::write(&path, vec![0u8; 1536]).unwrap();

        let entry = entry_metadata("Report.PDF".to_string(), std_fs::metadata(&path));
        assert_eq!(entry, FileMetadata::new("Report.PDF", 1.5, "pdf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_reports_file_removed_mid_listing() {
        let temp_dir = TempDir::new().unwrap();
        std_fs::write(temp_dir.path().join("kept.txt"), "k").unwrap();
        let root = SandboxRoot::new(temp_dir.path()).unwrap();

        let mut entries = fs::read_dir(root.path()).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        std_fs::remove_file(entry.path()).unwrap();

        let listed = entry_metadata(
            entry.file_name().to_string_lossy().to_string(),
            entry.metadata().await,
        );
        assert_eq!(listed.name, "kept.txt");
        assert_eq!(listed.format, ERROR_FORMAT);
        assert!(listed.error.is_some());
    }

    #[tokio::test]
    async fn test_list_skips_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        std_fs::write(temp_dir.path().join("a.txt"), vec![0u8; 2048]).unwrap();
        std_fs::write(temp_dir.path().join(".secret"), "hidden").unwrap();

        let files = lister(&temp_dir).list().await.unwrap();

        assert_eq!(files, vec![FileMetadata::new("a.txt", 2.0, "txt")]);
        assert_eq!(files[0].unit, SIZE_UNIT);
        assert!(files[0].error.is_none());
    }

    #[tokio::test]
    async fn test_list_skips_directories_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        std_fs::create_dir_all(temp_dir.path().join("docs")).unwrap();
        std_fs::write(temp_dir.path().join("docs/inner.txt"), "x").unwrap();
        std_fs::write(temp_dir.path().join("zeta.md"), "z").unwrap();
        std_fs::write(temp_dir.path().join("alpha"), "").unwrap();

        let files = lister(&temp_dir).list().await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, vec!["alpha", "zeta.md"]);
        assert_eq!(files[0].format, "unknown");
        assert_eq!(files[0].size, 0.01);
    }

    #[tokio::test]
    async fn test_list_empty_root() {
        let temp_dir = TempDir::new().unwrap();

        let files = lister(&temp_dir).list().await.unwrap();
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std_fs::write(outside.path().join("secret.bin"), vec![1u8; 4096]).unwrap();
        symlink(outside.path().join("secret.bin"), temp_dir.path().join("link.bin")).unwrap();

        let files = lister(&temp_dir).list().await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gone");
        std_fs::create_dir_all(&root).unwrap();
        let lister = DirectoryLister::new(SandboxRoot::new(&root).unwrap());
        std_fs::remove_dir(&root).unwrap();

        assert!(matches!(lister.list().await, Err(ListError::ReadDir { .. })));
    }
}
