//! Streaming file digests and hash verification.
//!
//! Files are read in fixed-size chunks and fed into an incremental hasher, so
//! memory use does not grow with file size.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use protocol::HashVerificationOutcome;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::guard::{GuardError, SandboxRoot};

/// Default read buffer for hashing (64KB).
pub const DEFAULT_HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Errors that can occur while hashing a file.
#[derive(Debug, Error)]
pub enum HashError {
    /// The algorithm name is not recognized.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// The path escapes the sandbox.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// IO error while reading.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Hex digest of an in-memory buffer.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Sha224 => hex::encode(Sha224::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(HashError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the lowercase hex digest of a file by streaming its contents.
pub async fn hash_file(
    path: &Path,
    algorithm: HashAlgorithm,
    buffer_size: usize,
) -> Result<String, io::Error> {
    let mut file = File::open(path).await?;
    match algorithm {
        HashAlgorithm::Md5 => stream_digest::<Md5>(&mut file, buffer_size).await,
        HashAlgorithm::Sha1 => stream_digest::<Sha1>(&mut file, buffer_size).await,
        HashAlgorithm::Sha224 => stream_digest::<Sha224>(&mut file, buffer_size).await,
        HashAlgorithm::Sha256 => stream_digest::<Sha256>(&mut file, buffer_size).await,
        HashAlgorithm::Sha384 => stream_digest::<Sha384>(&mut file, buffer_size).await,
        HashAlgorithm::Sha512 => stream_digest::<Sha512>(&mut file, buffer_size).await,
    }
}

async fn stream_digest<D: Digest>(file: &mut File, buffer_size: usize) -> Result<String, io::Error> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verifies files inside the sandbox against expected digests.
#[derive(Debug, Clone)]
pub struct HashVerifier {
    sandbox: SandboxRoot,
    buffer_size: usize,
}

impl HashVerifier {
    /// Create a verifier with the default buffer size.
    pub fn new(sandbox: SandboxRoot) -> Self {
        Self {
            sandbox,
            buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }

    /// Set the read buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Hash `file_path` (relative to the sandbox) and compare the result to
    /// `expected_hash`.
    ///
    /// The comparison is an exact, case-sensitive string match against the
    /// lowercase hex digest. The outcome echoes `algorithm` as given.
    pub async fn verify(
        &self,
        file_path: &str,
        algorithm: &str,
        expected_hash: &str,
    ) -> Result<HashVerificationOutcome, HashError> {
        let parsed: HashAlgorithm = algorithm.parse()?;

        let resolved = self.sandbox.resolve(file_path)?;
        let canonical = self.sandbox.confine(&resolved).await?;

        let metadata = tokio::fs::metadata(&canonical).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HashError::NotFound(file_path.to_string())
            } else {
                HashError::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(HashError::NotAFile(file_path.to_string()));
        }

        let actual_hash = hash_file(&canonical, parsed, self.buffer_size).await?;
        let matched = actual_hash == expected_hash;

        tracing::debug!(
            path = %file_path,
            algorithm = %parsed,
            matched,
            "Verified file digest"
        );

        Ok(HashVerificationOutcome {
            file_path: file_path.to_string(),
            algorithm: algorithm.to_string(),
            expected_hash: expected_hash.to_string(),
            actual_hash,
            matched,
        })
    }
}
