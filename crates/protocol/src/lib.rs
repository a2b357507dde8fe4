//! # Filedock Protocol Library
//!
//! Wire types for the Filedock file operations API.
//!
//! ## Overview
//!
//! The daemon exposes a small JSON-over-HTTP surface for listing, copying,
//! moving and hash-verifying files inside a single sandbox directory. This
//! crate holds the request and response bodies so that the daemon and any
//! client agree on field names and casing.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{decode_operations, BatchItem, TransferRequest};
//!
//! let body = serde_json::json!({
//!     "operations": [{"source": "a.txt", "destination": "backup/a.txt"}]
//! });
//! let operations = decode_operations(&body).unwrap();
//! assert_eq!(
//!     operations,
//!     vec![BatchItem::Request(TransferRequest::new("a.txt", "backup/a.txt"))]
//! );
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Request/response bodies
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    decode_operations, BatchItem, BatchRequest, BatchResponse, ErrorBody, ErrorCode, FileMetadata,
    HashVerificationOutcome, HealthResponse, MessageResponse, TransferMode, TransferRequest,
    TransferResult, TransferStatus, VerifyQuery, DEFAULT_HASH_ALGORITHM, ERROR_FORMAT, SIZE_UNIT,
    UNKNOWN_FORMAT,
};
