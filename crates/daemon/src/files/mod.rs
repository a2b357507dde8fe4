//! File operations confined to the sandbox root.
//!
//! - [`guard`]: lexical and canonical path confinement, destination naming policy
//! - [`hash`]: streaming digests and hash verification
//! - [`transfer`]: single-file copy and move
//! - [`batch`]: concurrent batches with per-item results
//! - [`browser`]: listing of the files in the sandbox root
//!
//! # Security
//!
//! Every path received from a request is relative to the sandbox. Absolute
//! paths and `..` components are rejected before any IO, and resolved paths
//! are canonicalized and prefix-checked against the root so that symlinks
//! cannot be used to escape it.

pub mod batch;
pub mod browser;
pub mod guard;
pub mod hash;
pub mod transfer;

pub use batch::{BatchCoordinator, DEFAULT_MAX_IN_FLIGHT};
pub use browser::{DirectoryLister, ListError};
pub use guard::{validate_directory_name, GuardError, SandboxRoot};
pub use hash::{HashAlgorithm, HashError, HashVerifier, DEFAULT_HASH_BUFFER_SIZE};
pub use transfer::{TransferEngine, TransferError};
