//! Request and response bodies for the Filedock HTTP API.
//!
//! All types serialize to JSON. Field names follow the wire format used by
//! existing clients, so a few structs rename fields to camelCase.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Unit reported alongside every [`FileMetadata::size`].
pub const SIZE_UNIT: &str = "KB";

/// Format marker for files without an extension.
pub const UNKNOWN_FORMAT: &str = "unknown";

/// Format marker for entries whose metadata could not be read.
pub const ERROR_FORMAT: &str = "error";

/// Digest algorithm used by `/verify` when none is given.
pub const DEFAULT_HASH_ALGORITHM: &str = "md5";

// ============================================================================
// Transfer Messages
// ============================================================================

/// A single copy or move request, with both paths relative to the sandbox root.
///
/// Missing fields deserialize to empty strings so that a malformed batch item
/// can be reported in its own result slot instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferRequest {
    /// Source file, relative to the sandbox root.
    pub source: String,
    /// Destination file, relative to the sandbox root.
    pub destination: String,
}

impl TransferRequest {
    /// Create a new transfer request.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Whether both paths were supplied.
    pub fn is_complete(&self) -> bool {
        !self.source.is_empty() && !self.destination.is_empty()
    }
}

/// Whether a transfer keeps or removes the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Duplicate the bytes, leaving the source intact.
    Copy,
    /// Relocate the source.
    Move,
}

impl TransferMode {
    /// Lowercase verb, e.g. `"copy"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }

    /// Past participle, e.g. `"copied"`.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Copy => "copied",
            Self::Move => "moved",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// The transfer completed.
    Success,
    /// The transfer failed; see [`TransferResult::error`].
    Failed,
}

/// Per-item result of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Source path as given in the request.
    pub source: String,
    /// Destination path as given in the request.
    pub destination: String,
    /// Whether the transfer succeeded.
    pub status: TransferStatus,
    /// Failure message, present only when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    /// A successful result for `request`.
    pub fn success(request: TransferRequest) -> Self {
        Self {
            source: request.source,
            destination: request.destination,
            status: TransferStatus::Success,
            error: None,
        }
    }

    /// A failed result for `request`.
    pub fn failed(request: TransferRequest, error: impl Into<String>) -> Self {
        Self {
            source: request.source,
            destination: request.destination,
            status: TransferStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Whether this item succeeded.
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Body of `POST /batch-copy` and `POST /batch-move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Transfers to perform.
    pub operations: Vec<TransferRequest>,
}

/// Response of the batch endpoints. `results[i]` corresponds to `operations[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<TransferResult>,
}

/// One entry of a batch body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem {
    /// A well-formed transfer request.
    Request(TransferRequest),
    /// An object whose fields could not be decoded. `request` echoes the
    /// fields as given so the failure lands in the matching result slot.
    Malformed {
        request: TransferRequest,
        reason: String,
    },
}

impl From<TransferRequest> for BatchItem {
    fn from(request: TransferRequest) -> Self {
        BatchItem::Request(request)
    }
}

/// Extract the `operations` array of a batch request body.
///
/// The body must be an object whose `operations` field is an array of
/// objects; anything else rejects the whole batch. An object whose fields
/// are not strings becomes a [`BatchItem::Malformed`] entry at its own index.
pub fn decode_operations(body: &serde_json::Value) -> Result<Vec<BatchItem>> {
    let operations = body
        .get("operations")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ProtocolError::MalformedRequest("operations must be an array".to_string()))?;

    operations
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(ProtocolError::MalformedRequest(format!(
                    "operation {index} is not an object"
                )));
            }
            Ok(match serde_json::from_value(item.clone()) {
                Ok(request) => BatchItem::Request(request),
                Err(e) => BatchItem::Malformed {
                    request: TransferRequest::new(
                        field_text(item, "source"),
                        field_text(item, "destination"),
                    ),
                    reason: ProtocolError::from(e).to_string(),
                },
            })
        })
        .collect()
}

/// Field value as text: strings verbatim, other JSON values rendered, missing
/// or null as empty.
fn field_text(item: &serde_json::Value, key: &str) -> String {
    match item.get(key) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Listing Messages
// ============================================================================

/// Metadata of one file in the sandbox root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File name (not full path).
    pub name: String,
    /// Size in kilobytes, rounded to two decimals.
    pub size: f64,
    /// Always [`SIZE_UNIT`].
    pub unit: String,
    /// Lowercase extension, [`UNKNOWN_FORMAT`] or [`ERROR_FORMAT`].
    pub format: String,
    /// Stat failure message, present only for [`ERROR_FORMAT`] entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileMetadata {
    /// Metadata for a file that was read successfully.
    pub fn new(name: impl Into<String>, size: f64, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            unit: SIZE_UNIT.to_string(),
            format: format.into(),
            error: None,
        }
    }

    /// Placeholder for a file whose metadata could not be read.
    pub fn unreadable(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0.0,
            unit: SIZE_UNIT.to_string(),
            format: ERROR_FORMAT.to_string(),
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Verification Messages
// ============================================================================

/// Query parameters of `GET /verify`. Everything is optional on the wire so
/// the handler can report which parameter is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    pub file_path: Option<String>,
    pub algorithm: Option<String>,
    pub expected_hash: Option<String>,
}

/// Result of hashing a file and comparing it to an expected digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashVerificationOutcome {
    /// Path as given in the request.
    pub file_path: String,
    /// Algorithm name as used for hashing.
    pub algorithm: String,
    /// Digest the caller expected.
    pub expected_hash: String,
    /// Lowercase hex digest of the file.
    pub actual_hash: String,
    /// Case-sensitive equality of the two digests.
    #[serde(rename = "match")]
    pub matched: bool,
}

// ============================================================================
// Generic Responses
// ============================================================================

/// Plain acknowledgement, e.g. `{"message": "File copied successfully"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Absolute path of the sandbox root.
    pub root: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short human-readable summary.
    pub error: String,
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Underlying failure, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error codes for common error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or malformed input.
    InvalidRequest,
    /// Destination directory name violates the naming policy.
    InvalidDestination,
    /// A path resolves outside the sandbox root.
    OutsideSandbox,
    /// Requested file does not exist.
    NotFound,
    /// Digest algorithm is not recognized.
    UnsupportedAlgorithm,
    /// Filesystem call failed.
    IoError,
}
