//! Single-file copy and move inside the sandbox.
//!
//! A transfer runs in a fixed order: validate the destination, create its
//! parent directories, then check the source and copy or rename. Directories
//! created in the second step are left in place if the third step fails.

use std::io;
use std::path::{Path, PathBuf};

use protocol::{TransferMode, TransferRequest};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use super::guard::{destination_dir, validate_directory_name, GuardError, SandboxRoot};

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Source or destination was not supplied.
    #[error("source and destination are required")]
    MissingPath,

    /// The destination directory name violates the naming policy.
    #[error("invalid directory name: {0}")]
    InvalidDestination(String),

    /// The source file does not exist.
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// The source exists but is not a regular file.
    #[error("source is not a regular file: {0}")]
    NotAFile(String),

    /// A path escapes the sandbox.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Performs one copy or move between two sandbox-relative paths.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    sandbox: SandboxRoot,
}

impl TransferEngine {
    /// Create a new transfer engine confined to `sandbox`.
    pub fn new(sandbox: SandboxRoot) -> Self {
        Self { sandbox }
    }

    /// The sandbox this engine operates in.
    pub fn sandbox(&self) -> &SandboxRoot {
        &self.sandbox
    }

    /// Copy or move `request.source` to `request.destination`.
    ///
    /// Returns the canonical destination path on success.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        mode: TransferMode,
    ) -> Result<PathBuf, TransferError> {
        if !request.is_complete() {
            return Err(TransferError::MissingPath);
        }

        let source = self.sandbox.resolve(&request.source)?;
        let destination = self.sandbox.resolve(&request.destination)?;
        let destination = self.sandbox.confine(&destination).await?;

        let dir_name = destination_dir(&request.destination)
            .ok_or_else(|| TransferError::InvalidDestination(request.destination.clone()))?;
        if !validate_directory_name(dir_name) {
            return Err(TransferError::InvalidDestination(dir_name.to_string()));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let source = self.sandbox.confine(&source).await?;

        let metadata = fs::metadata(&source).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TransferError::SourceNotFound(request.source.clone())
            } else {
                TransferError::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(request.source.clone()));
        }

        if source == destination {
            debug!(path = %source.display(), "Source and destination are the same file");
            return Ok(destination);
        }

        match mode {
            TransferMode::Copy => {
                fs::copy(&source, &destination).await?;
            }
            TransferMode::Move => move_file(&source, &destination).await?,
        }

        debug!(
            mode = %mode,
            source = %source.display(),
            destination = %destination.display(),
            "Transfer complete"
        );

        Ok(destination)
    }
}

/// Rename `source` to `destination`, falling back to copy-then-delete when
/// they live on different filesystems. The fallback is not atomic: if removing
/// the source fails, both files remain.
async fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                source = %source.display(),
                destination = %destination.display(),
                "Cross-device move, falling back to non-atomic copy and delete"
            );
            fs::copy(source, destination).await?;
            fs::remove_file(source).await
        }
        Err(e) => Err(e),
    }
}
