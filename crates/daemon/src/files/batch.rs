//! Batch copy/move with per-item failure isolation.
//!
//! Every item in a batch is dispatched at once and awaited together. A
//! semaphore shared by all batches caps how many transfers touch the
//! filesystem at the same time. Results come back in request order no matter
//! which transfer finishes first.

use std::sync::Arc;

use futures_util::future::join_all;
use protocol::{BatchItem, TransferMode, TransferRequest, TransferResult};
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::transfer::TransferEngine;

/// Default number of transfers allowed in flight at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Fans a list of transfer requests out to a [`TransferEngine`].
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    engine: Arc<TransferEngine>,
    permits: Arc<Semaphore>,
}

impl BatchCoordinator {
    /// Create a coordinator allowing at most `max_in_flight` concurrent
    /// transfers across all batches.
    pub fn new(engine: Arc<TransferEngine>, max_in_flight: usize) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Run every request and return one result per request, in input order.
    ///
    /// Never fails as a whole: each item's error is captured in its own
    /// [`TransferResult`]. [`BatchItem::Malformed`] entries fail in place
    /// without touching the filesystem.
    pub async fn run_batch<I>(&self, items: I, mode: TransferMode) -> Vec<TransferResult>
    where
        I: IntoIterator,
        I::Item: Into<BatchItem>,
    {
        let tasks: Vec<_> = items
            .into_iter()
            .map(|item| self.run_item(item.into(), mode))
            .collect();
        let total = tasks.len();

        let results = join_all(tasks).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(mode = %mode, total, failed, "Batch finished");

        results
    }

    async fn run_item(&self, item: BatchItem, mode: TransferMode) -> TransferResult {
        match item {
            BatchItem::Request(request) => self.run_one(request, mode).await,
            BatchItem::Malformed { request, reason } => {
                error!("Batch {} skipped malformed item: {}", mode, reason);
                TransferResult::failed(request, reason)
            }
        }
    }

    async fn run_one(&self, request: TransferRequest, mode: TransferMode) -> TransferResult {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return TransferResult::failed(request, "transfer limiter closed"),
        };

        match self.engine.transfer(&request, mode).await {
            Ok(_) => {
                info!(
                    "Batch {} file from {} to {}",
                    mode.past_tense(),
                    request.source,
                    request.destination
                );
                TransferResult::success(request)
            }
            Err(e) => {
                error!("Batch {} failed for {}: {}", mode, request.source, e);
                TransferResult::failed(request, e.to_string())
            }
        }
    }
}
