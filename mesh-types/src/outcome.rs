//! Per-router and fleet-wide operation outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::router::RouterId;

/// Which fleet-wide operation produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Push the generated mesh configuration and restart the daemon.
    Configure,
    /// Upload and run the synthetic route batch.
    Inject,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Configure => write!(f, "configure"),
            OperationKind::Inject => write!(f, "inject"),
        }
    }
}

/// Outcome of one operation against one router.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// Router the operation targeted.
    pub router_id: RouterId,
    /// Operation that ran.
    pub operation_kind: OperationKind,
    /// Whether the operation succeeded.
    pub succeeded: bool,
    /// Wall time from task start to result.
    pub duration: Duration,
    /// Failure message.
    pub error: Option<String>,
}

impl OperationResult {
    /// A successful result.
    pub fn success(router_id: RouterId, operation_kind: OperationKind, duration: Duration) -> Self {
        Self {
            router_id,
            operation_kind,
            succeeded: true,
            duration,
            error: None,
        }
    }

    /// A failed result carrying the error message.
    pub fn failure(
        router_id: RouterId,
        operation_kind: OperationKind,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            router_id,
            operation_kind,
            succeeded: false,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Fleet-wide outcome of one executor invocation.
///
/// `all_succeeded` is true iff every entry in `per_router` succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    /// Operation that ran.
    pub operation_kind: OperationKind,
    /// True iff every router succeeded.
    pub all_succeeded: bool,
    /// One entry per attempted router.
    pub per_router: BTreeMap<RouterId, OperationResult>,
}

impl AggregateResult {
    /// Build an aggregate from per-router results.
    pub fn from_results(
        operation_kind: OperationKind,
        results: impl IntoIterator<Item = OperationResult>,
    ) -> Self {
        let per_router: BTreeMap<_, _> = results.into_iter().map(|r| (r.router_id, r)).collect();
        let all_succeeded = per_router.values().all(|r| r.succeeded);
        Self {
            operation_kind,
            all_succeeded,
            per_router,
        }
    }

    /// Ids of routers whose operation failed, ascending.
    pub fn failed_ids(&self) -> Vec<RouterId> {
        self.per_router
            .values()
            .filter(|r| !r.succeeded)
            .map(|r| r.router_id)
            .collect()
    }

    /// Number of routers that succeeded.
    pub fn succeeded_count(&self) -> usize {
        self.per_router.values().filter(|r| r.succeeded).count()
    }

    /// Overlay a retry against a subset of routers.
    ///
    /// Entries in `retry` replace this aggregate's entries for the same router.
    pub fn merge(mut self, retry: AggregateResult) -> Self {
        self.per_router.extend(retry.per_router);
        self.all_succeeded = self.per_router.values().all(|r| r.succeeded);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: RouterId) -> OperationResult {
        OperationResult::success(id, OperationKind::Configure, Duration::from_millis(5))
    }

    fn failed(id: RouterId) -> OperationResult {
        OperationResult::failure(id, OperationKind::Configure, Duration::from_millis(5), "boom")
    }

    #[test]
    fn all_succeeded_only_when_every_router_succeeds() {
        let agg = AggregateResult::from_results(OperationKind::Configure, vec![ok(1), ok(2)]);
        assert!(agg.all_succeeded);

        let agg = AggregateResult::from_results(OperationKind::Configure, vec![ok(1), failed(2)]);
        assert!(!agg.all_succeeded);
        assert_eq!(agg.failed_ids(), vec![2]);
        assert_eq!(agg.succeeded_count(), 1);
    }

    #[test]
    fn merge_replaces_retried_entries() {
        let first = AggregateResult::from_results(
            OperationKind::Configure,
            vec![ok(1), failed(2), failed(3)],
        );
        let retry = AggregateResult::from_results(OperationKind::Configure, vec![ok(2), failed(3)]);

        let merged = first.merge(retry);
        assert_eq!(merged.per_router.len(), 3);
        assert_eq!(merged.failed_ids(), vec![3]);
        assert!(!merged.all_succeeded);
    }

    #[test]
    fn kind_display() {
        assert_eq!(OperationKind::Configure.to_string(), "configure");
        assert_eq!(OperationKind::Inject.to_string(), "inject");
    }
}
