//! Sandbox confinement and destination name policy.
//!
//! Every request path is relative to a single [`SandboxRoot`]. Paths are
//! checked twice: lexically before anything touches the filesystem (no
//! absolute paths, no `..`), and again after canonicalization so that
//! symlinks cannot lead outside the root.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use thiserror::Error;

/// Maximum length of a destination directory name, in characters.
pub const MAX_DIRECTORY_NAME_LEN: usize = 50;

/// Errors raised while confining a path to the sandbox.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The path is absolute or climbs above its starting point.
    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    /// The resolved path lies outside the sandbox root.
    #[error("path is outside the sandbox: {0}")]
    OutsideSandbox(PathBuf),

    /// IO error while resolving the path.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Check a destination directory name against the naming policy.
///
/// An empty name denotes the sandbox root and is always valid. Otherwise the
/// name must be at most [`MAX_DIRECTORY_NAME_LEN`] characters and every
/// separator-delimited segment must be non-empty and consist only of ASCII
/// letters, digits, `_` and `-`.
pub fn validate_directory_name(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }

    if name.chars().count() > MAX_DIRECTORY_NAME_LEN {
        return false;
    }

    name.split(MAIN_SEPARATOR).all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

/// Directory portion of a relative destination, as written by the caller.
///
/// Returns `None` when the destination does not name a file (it is empty or
/// ends with a separator). A bare file name, or one prefixed with `./`, yields
/// the empty string.
pub fn destination_dir(destination: &str) -> Option<&str> {
    if destination.is_empty() || destination.ends_with(MAIN_SEPARATOR) {
        return None;
    }

    match destination.rfind(MAIN_SEPARATOR) {
        Some(idx) => {
            let dir = &destination[..idx];
            Some(if dir == "." { "" } else { dir })
        }
        None => Some(""),
    }
}

/// The single directory all request paths are resolved against.
///
/// Holds the canonical form of the root so prefix comparisons are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    /// Open an existing directory as the sandbox root.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, GuardError> {
        let root = std::fs::canonicalize(path.as_ref())?;
        if !root.is_dir() {
            return Err(GuardError::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("sandbox root is not a directory: {}", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Create the directory (and parents) if missing, then open it.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self, GuardError> {
        std::fs::create_dir_all(path.as_ref())?;
        Self::new(path)
    }

    /// Canonical path of the root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Join a relative request path onto the root after a lexical check.
    ///
    /// Rejects absolute paths, drive prefixes and `..` components. `.`
    /// components are dropped. An empty path resolves to the root itself.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, GuardError> {
        let mut resolved = self.root.clone();

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(GuardError::PathTraversal(format!(
                        "parent directory traversal not allowed: {relative}"
                    )));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(GuardError::PathTraversal(format!(
                        "absolute path not allowed: {relative}"
                    )));
                }
            }
        }

        Ok(resolved)
    }

    /// Canonicalize `path` and assert it stays inside the root.
    ///
    /// The path need not exist: the deepest existing ancestor is
    /// canonicalized and the missing components are appended to it. A
    /// dangling symlink in place of a missing component is rejected, since
    /// writing through it could create a file anywhere.
    pub async fn confine(&self, path: &Path) -> Result<PathBuf, GuardError> {
        let mut existing = path.to_path_buf();
        let mut missing: Vec<OsString> = Vec::new();

        let canonical = loop {
            match tokio::fs::canonicalize(&existing).await {
                Ok(canonical) => break canonical,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if let Ok(meta) = tokio::fs::symlink_metadata(&existing).await {
                        if meta.file_type().is_symlink() {
                            return Err(GuardError::OutsideSandbox(path.to_path_buf()));
                        }
                    }
                    let name = existing
                        .file_name()
                        .ok_or_else(|| GuardError::OutsideSandbox(path.to_path_buf()))?
                        .to_os_string();
                    missing.push(name);
                    if !existing.pop() {
                        return Err(GuardError::OutsideSandbox(path.to_path_buf()));
                    }
                }
                Err(e) => return Err(GuardError::Io(e)),
            }
        };

        let mut full = canonical;
        for name in missing.into_iter().rev() {
            full.push(name);
        }

        if full.starts_with(&self.root) {
            Ok(full)
        } else {
            Err(GuardError::OutsideSandbox(path.to_path_buf()))
        }
    }
}
