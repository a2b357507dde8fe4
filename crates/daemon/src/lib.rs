//! # Filedock Daemon Library
//!
//! This crate provides the HTTP service behind Filedock: listing, copying,
//! moving and hash-verifying files inside a single sandbox directory.
//!
//! ## Overview
//!
//! - **Path Guard**: Keeps every request path inside the sandbox root and
//!   enforces the destination directory naming policy
//! - **Transfers**: Single copy/move operations and concurrent batches with
//!   per-item results
//! - **Hash Verification**: Streaming md5, sha1 and sha2-family digests
//! - **Listing**: Size and format of the files in the sandbox root
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Daemon Orchestrator                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                      HTTP Router                           │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                 │
//! │  ┌────────────┐ ┌─────────────┐ ┌─────────────┐ ┌────────────┐  │
//! │  │   Batch    │ │  Transfer   │ │    Hash     │ │ Directory  │  │
//! │  │Coordinator │→│   Engine    │ │  Verifier   │ │   Lister   │  │
//! │  └────────────┘ └─────────────┘ └─────────────┘ └────────────┘  │
//! │                                                                 │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                 Path Guard / Sandbox Root                  │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(daemon::config::default_config_path())?;
//!
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     let addr = orchestrator.start().await?;
//!     println!("listening on {addr}");
//!
//!     tokio::signal::ctrl_c().await?;
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Sandbox confinement, transfers, hashing and listing
//! - [`router`]: HTTP routes and error mapping
//! - [`orchestrator`]: Server lifecycle
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod files;
pub mod logging;
pub mod orchestrator;
pub mod router;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError, EnvOverride};

// Re-export files types for convenience
pub use files::{
    BatchCoordinator, DirectoryLister, HashAlgorithm, HashVerifier, SandboxRoot, TransferEngine,
};

// Re-export router types for convenience
pub use router::{router, AppState, RouterError};

// Re-export orchestrator types for convenience
pub use orchestrator::{DaemonOrchestrator, OrchestratorEvent, OrchestratorState};
