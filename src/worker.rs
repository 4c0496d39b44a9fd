//! Batch Worker
//!
//! Runs batch comparisons on a background task behind a typed request/response channel. Callers
//! send a request and await its reply; no state is shared across the boundary. Shutting down
//! closes the queue, lets queued requests finish and joins the task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    batch::{BatchEntryRecord, Comparison, ErrorRecord, calculate_batch_yielding},
    request::QuoteRequest,
    specification::Quantities,
    tables::PricingTable,
};

/// Requests queued before senders wait.
const QUEUE_CAPACITY: usize = 16;

/// Errors at the worker boundary.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker is no longer accepting requests.
    #[error("batch worker has stopped")]
    Stopped,

    /// The worker dropped the request without replying.
    #[error("batch worker dropped the request")]
    NoReply(#[from] oneshot::error::RecvError),

    /// The worker task panicked or was cancelled.
    #[error("batch worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Batch to calculate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    /// Base request; its own quantities are ignored
    pub request: QuoteRequest,

    /// Candidate quantity sets, in the order results are wanted
    pub quantities: Vec<Quantities>,
}

/// Message sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    /// Price a request at several quantities
    CalculateBatch(BatchPayload),
}

/// Reply from the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    /// Per-candidate results, in input order, and their comparison
    Results {
        /// One entry per candidate
        results: Vec<BatchEntryRecord>,
        /// Comparison across priced candidates
        comparison: Comparison,
    },

    /// The batch as a whole was rejected
    Error {
        /// Why
        error: ErrorRecord,
    },
}

#[derive(Debug)]
struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerResponse>,
}

/// Handle to a background batch worker.
#[derive(Debug)]
pub struct BatchWorker {
    sender: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl BatchWorker {
    /// Spawn a worker on the current Tokio runtime.
    pub fn spawn(table: Arc<PricingTable>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(run(table, receiver));

        Self { sender, handle }
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkerError`] if the worker has stopped or drops the request.
    pub async fn request(&self, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Job { request, reply })
            .await
            .map_err(|_err| WorkerError::Stopped)?;

        Ok(response.await?)
    }

    /// Stop accepting requests and wait for queued ones to finish.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Join`] if the worker task panicked.
    pub async fn shutdown(self) -> Result<(), WorkerError> {
        drop(self.sender);
        self.handle.await?;

        Ok(())
    }
}

async fn run(table: Arc<PricingTable>, mut receiver: mpsc::Receiver<Job>) {
    info!(table_version = %table.version, "batch worker started");

    while let Some(Job { request, reply }) = receiver.recv().await {
        let response = respond(&table, request).await;

        if reply.send(response).is_err() {
            debug!("requester went away before the reply");
        }
    }

    info!("batch worker stopped");
}

/// Handle one request.
pub async fn respond(table: &PricingTable, request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::CalculateBatch(payload) => {
            match calculate_batch_yielding(&payload.request, &payload.quantities, table).await {
                Ok(batch) => WorkerResponse::Results {
                    results: batch.entries.iter().map(|entry| entry.to_record()).collect(),
                    comparison: batch.comparison,
                },
                Err(err) => WorkerResponse::Error {
                    error: ErrorRecord::from(&err),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::batch::EntryOutcome;

    fn payload(quantities: &[u64]) -> TestResult<WorkerRequest> {
        Ok(WorkerRequest::CalculateBatch(BatchPayload {
            request: QuoteRequest {
                bag_type: Some("flat_3_side".to_string()),
                width: Some(Decimal::from(120)),
                height: Some(Decimal::from(180)),
                ..QuoteRequest::default()
            },
            quantities: quantities
                .iter()
                .map(|quantity| Quantities::single(*quantity))
                .collect::<Result<_, _>>()?,
        }))
    }

    #[test]
    fn request_serializes_as_typed_message() -> TestResult {
        let json = serde_json::to_value(payload(&[1000])?)?;

        assert_eq!(json.get("type"), Some(&serde_json::json!("CALCULATE_BATCH")));
        assert!(json.get("payload").and_then(|payload| payload.get("quantities")).is_some());

        Ok(())
    }

    #[tokio::test]
    async fn worker_replies_with_results_in_order() -> TestResult {
        let worker = BatchWorker::spawn(Arc::new(PricingTable::standard()?));

        let response = worker.request(payload(&[5000, 1000, 10_000])?).await?;

        let WorkerResponse::Results { results, comparison } = response else {
            return Err("expected results".into());
        };

        let quantities = results
            .iter()
            .map(|entry| entry.quantities.total())
            .collect::<Result<Vec<u64>, _>>()?;

        assert_eq!(quantities, [5000, 1000, 10_000]);
        assert!(results.iter().all(|entry| matches!(entry.outcome, EntryOutcome::Quote(_))));
        assert_eq!(comparison.cheapest, Some(Quantities::single(10_000)?));

        worker.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn rejected_batch_replies_with_error() -> TestResult {
        let worker = BatchWorker::spawn(Arc::new(PricingTable::standard()?));

        let response = worker.request(payload(&[])?).await?;

        let json = serde_json::to_value(&response)?;
        assert_eq!(
            json.pointer("/error/field"),
            Some(&serde_json::json!("quantities"))
        );

        worker.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn response_round_trips_through_json() -> TestResult {
        let table = PricingTable::standard()?;
        let response = respond(&table, payload(&[1000, 20_000])?).await;

        let json = serde_json::to_string(&response)?;
        let restored: WorkerResponse = serde_json::from_str(&json)?;

        assert_eq!(restored, response);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_requests_get_their_own_replies() -> TestResult {
        let worker = BatchWorker::spawn(Arc::new(PricingTable::standard()?));

        let first = worker.request(payload(&[1000])?);
        let second = worker.request(payload(&[2000, 3000])?);

        let (first, second) = tokio::join!(first, second);

        let counts = [first?, second?].map(|response| match response {
            WorkerResponse::Results { results, .. } => results.len(),
            WorkerResponse::Error { .. } => 0,
        });

        assert_eq!(counts, [1, 2]);

        worker.shutdown().await?;

        Ok(())
    }
}
