//! Concurrent executor.
//!
//! Runs one operation against every router of the fleet at once: one tokio
//! task per router, all of them awaited, none cancelled when another fails.
//! Whatever goes wrong inside a task (error or panic) becomes that router's
//! failed [`OperationResult`].

use async_trait::async_trait;
use bgpmesh_types::{AggregateResult, OperationKind, OperationResult, RouterId, RouterRecord};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::operations::OperationError;

/// Work performed against a single router.
///
/// Implementations must not share mutable state between routers.
#[async_trait]
pub trait FleetOperation: Send + Sync + 'static {
    /// Which operation this is.
    fn kind(&self) -> OperationKind;

    /// Run against one router.
    async fn execute(&self, router: &RouterRecord) -> Result<(), OperationError>;
}

/// Run `operation` against every router in `fleet` and aggregate.
///
/// Every router is attempted exactly once. The executor performs no retries
/// and has no timeout of its own.
pub async fn run(fleet: &[RouterRecord], operation: Arc<dyn FleetOperation>) -> AggregateResult {
    let kind = operation.kind();
    let started = Instant::now();
    tracing::info!(operation = %kind, routers = fleet.len(), "starting fleet operation");

    let tasks: Vec<(RouterId, JoinHandle<OperationResult>)> = fleet
        .iter()
        .cloned()
        .map(|router| {
            let id = router.id;
            let operation = Arc::clone(&operation);
            let span = tracing::info_span!("router", router_id = id, asn = router.asn, operation = %kind);
            let task = tokio::spawn(
                async move {
                    let task_started = Instant::now();
                    let outcome = operation.execute(&router).await;
                    let duration = task_started.elapsed();
                    match outcome {
                        Ok(()) => {
                            tracing::debug!(elapsed_ms = duration.as_millis() as u64, "router succeeded");
                            OperationResult::success(router.id, kind, duration)
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, elapsed_ms = duration.as_millis() as u64, "router failed");
                            OperationResult::failure(router.id, kind, duration, e.to_string())
                        }
                    }
                }
                .instrument(span),
            );
            (id, task)
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (id, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(router_id = id, operation = %kind, error = %e, "router task aborted");
                OperationResult::failure(id, kind, started.elapsed(), format!("task failed: {e}"))
            }
        };
        results.push(result);
    }

    let aggregate = AggregateResult::from_results(kind, results);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if aggregate.all_succeeded {
        tracing::info!(operation = %kind, succeeded = aggregate.succeeded_count(), elapsed_ms, "fleet operation succeeded");
    } else {
        tracing::error!(
            operation = %kind,
            succeeded = aggregate.succeeded_count(),
            failed = ?aggregate.failed_ids(),
            elapsed_ms,
            "fleet operation failed"
        );
    }
    aggregate
}
