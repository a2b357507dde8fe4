//! HTTP routes for the file operations API.
//!
//! Each route extracts its input, hands it to the matching component in
//! [`crate::files`] and turns the outcome into JSON. Failures are carried as
//! [`RouterError`], which decides the status code and [`ErrorBody`].

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use protocol::{
    decode_operations, BatchResponse, ErrorBody, ErrorCode, FileMetadata,
    HashVerificationOutcome, HealthResponse, MessageResponse, ProtocolError, TransferMode,
    TransferRequest, VerifyQuery, DEFAULT_HASH_ALGORITHM,
};
use tracing::{debug, error, info, warn};

use crate::files::{
    BatchCoordinator, DirectoryLister, GuardError, HashError, HashVerifier, ListError,
    SandboxRoot, TransferEngine, TransferError,
};

/// Errors that can occur while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Missing or malformed input. Holds the summary sent to the client.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body could not be parsed.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The batch body is not an array of operation objects.
    #[error("malformed batch: {0}")]
    MalformedBatch(#[from] ProtocolError),

    /// A single copy or move failed.
    #[error("{mode} failed: {source}")]
    Transfer {
        mode: TransferMode,
        #[source]
        source: TransferError,
    },

    /// Hash verification failed.
    #[error("verification failed: {0}")]
    Hash(#[from] HashError),

    /// The sandbox could not be listed.
    #[error("listing failed: {0}")]
    List(#[from] ListError),
}

impl RouterError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        self.classify().0
    }

    /// Convert the error to the JSON body sent to the client.
    pub fn to_error_body(&self) -> ErrorBody {
        let (_, code, error, details) = self.classify();
        ErrorBody {
            error,
            code,
            details,
        }
    }

    fn classify(&self) -> (StatusCode, ErrorCode, String, Option<String>) {
        match self {
            RouterError::InvalidRequest(summary) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                summary.clone(),
                None,
            ),
            RouterError::MalformedBody(details) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "Invalid request body".to_string(),
                Some(details.clone()),
            ),
            RouterError::MalformedBatch(e) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "Operations must be an array".to_string(),
                Some(e.to_string()),
            ),
            RouterError::Transfer { mode, source } => classify_transfer(*mode, source),
            RouterError::Hash(e) => classify_hash(e),
            RouterError::List(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::IoError,
                "Failed to list files".to_string(),
                Some(e.to_string()),
            ),
        }
    }
}

fn classify_transfer(
    mode: TransferMode,
    e: &TransferError,
) -> (StatusCode, ErrorCode, String, Option<String>) {
    let details = Some(e.to_string());
    match e {
        TransferError::MissingPath => (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "Source and destination are required".to_string(),
            None,
        ),
        TransferError::InvalidDestination(_) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidDestination,
            "Invalid directory name".to_string(),
            details,
        ),
        TransferError::SourceNotFound(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::NotFound,
            format!("Failed to {mode} file"),
            details,
        ),
        TransferError::NotAFile(_) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "Source is not a regular file".to_string(),
            details,
        ),
        TransferError::Guard(GuardError::PathTraversal(_) | GuardError::OutsideSandbox(_)) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::OutsideSandbox,
            "Path is outside the sandbox".to_string(),
            details,
        ),
        TransferError::Guard(GuardError::Io(_)) | TransferError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::IoError,
            format!("Failed to {mode} file"),
            details,
        ),
    }
}

fn classify_hash(e: &HashError) -> (StatusCode, ErrorCode, String, Option<String>) {
    let details = Some(e.to_string());
    match e {
        HashError::UnsupportedAlgorithm(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UnsupportedAlgorithm,
            "File verification failed".to_string(),
            details,
        ),
        HashError::NotFound(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::NotFound,
            "File verification failed".to_string(),
            details,
        ),
        HashError::NotAFile(_) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "Path is not a regular file".to_string(),
            details,
        ),
        HashError::Guard(GuardError::PathTraversal(_) | GuardError::OutsideSandbox(_)) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::OutsideSandbox,
            "Path is outside the sandbox".to_string(),
            details,
        ),
        HashError::Guard(GuardError::Io(_)) | HashError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::IoError,
            "File verification failed".to_string(),
            details,
        ),
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.to_error_body())).into_response()
    }
}

/// Shared, immutable handles to the file components.
#[derive(Debug, Clone)]
pub struct AppState {
    sandbox: SandboxRoot,
    engine: Arc<TransferEngine>,
    batch: Arc<BatchCoordinator>,
    verifier: Arc<HashVerifier>,
    lister: Arc<DirectoryLister>,
}

impl AppState {
    /// Build every component over `sandbox`.
    pub fn new(sandbox: SandboxRoot, max_in_flight: usize, hash_buffer_size: usize) -> Self {
        let engine = Arc::new(TransferEngine::new(sandbox.clone()));
        Self {
            batch: Arc::new(BatchCoordinator::new(Arc::clone(&engine), max_in_flight)),
            verifier: Arc::new(HashVerifier::new(sandbox.clone()).with_buffer_size(hash_buffer_size)),
            lister: Arc::new(DirectoryLister::new(sandbox.clone())),
            engine,
            sandbox,
        }
    }

    /// The sandbox every route operates in.
    pub fn sandbox(&self) -> &SandboxRoot {
        &self.sandbox
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/list", get(list_files))
        .route("/copy", post(copy_file))
        .route("/move", post(move_file))
        .route("/batch-copy", post(batch_copy))
        .route("/batch-move", post(batch_move))
        .route("/verify", get(verify_file))
        .route("/health", get(health))
        .with_state(state)
}

async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileMetadata>>, RouterError> {
    debug!("Listing sandbox root");
    let files = state.lister.list().await?;
    Ok(Json(files))
}

async fn copy_file(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RouterError> {
    transfer(&state, payload, TransferMode::Copy).await
}

async fn move_file(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RouterError> {
    transfer(&state, payload, TransferMode::Move).await
}

async fn transfer(
    state: &AppState,
    payload: Result<Json<TransferRequest>, JsonRejection>,
    mode: TransferMode,
) -> Result<Json<MessageResponse>, RouterError> {
    let Json(request) = payload.map_err(|e| RouterError::MalformedBody(e.body_text()))?;

    state
        .engine
        .transfer(&request, mode)
        .await
        .map_err(|source| RouterError::Transfer { mode, source })?;

    info!(
        "File {} from {} to {}",
        mode.past_tense(),
        request.source,
        request.destination
    );

    Ok(Json(MessageResponse::new(format!(
        "File {} successfully",
        mode.past_tense()
    ))))
}

async fn batch_copy(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, RouterError> {
    batch(&state, payload, TransferMode::Copy).await
}

async fn batch_move(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, RouterError> {
    batch(&state, payload, TransferMode::Move).await
}

async fn batch(
    state: &AppState,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
    mode: TransferMode,
) -> Result<Json<BatchResponse>, RouterError> {
    let Json(body) = payload.map_err(|e| RouterError::MalformedBody(e.body_text()))?;
    let operations = decode_operations(&body)?;

    debug!(mode = %mode, count = operations.len(), "Starting batch");
    let results = state.batch.run_batch(operations, mode).await;

    Ok(Json(BatchResponse { results }))
}

async fn verify_file(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<HashVerificationOutcome>, RouterError> {
    let Query(query) = query.map_err(|e| RouterError::MalformedBody(e.body_text()))?;

    let file_path = query.file_path.filter(|p| !p.is_empty());
    let expected_hash = query.expected_hash.filter(|h| !h.is_empty());
    let (Some(file_path), Some(expected_hash)) = (file_path, expected_hash) else {
        return Err(RouterError::InvalidRequest(
            "filePath and expectedHash are required".to_string(),
        ));
    };
    let algorithm = query
        .algorithm
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_HASH_ALGORITHM.to_string());

    let outcome = state
        .verifier
        .verify(&file_path, &algorithm, &expected_hash)
        .await?;

    info!(
        path = %outcome.file_path,
        algorithm = %outcome.algorithm,
        matched = outcome.matched,
        "Hash verification completed"
    );

    Ok(Json(outcome))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        root: state.sandbox.path().display().to_string(),
    })
}
