//! Readiness poller.
//!
//! Probes every not-yet-ready router once per round, sleeps for the poll
//! interval, and repeats until the whole fleet is ready or the deadline passes.
//! Probe failures only mean "not ready yet".

use async_trait::async_trait;
use bgpmesh_core::{ReadinessReport, ReadinessTracker};
use bgpmesh_types::RouterRecord;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::remote::{Credentials, Remote};

/// A bounded reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// True if `router` can accept work now. Must return within its own bound.
    async fn probe(&self, router: &RouterRecord) -> bool;
}

#[async_trait]
impl<F> Probe for F
where
    F: Fn(&RouterRecord) -> bool + Send + Sync,
{
    async fn probe(&self, router: &RouterRecord) -> bool {
        self(router)
    }
}

/// Ready means a remote session opens within the connect timeout.
pub struct ConnectProbe {
    remote: Arc<dyn Remote>,
    credentials: Credentials,
    timeout: Duration,
}

impl ConnectProbe {
    /// Probe through `remote` with a per-attempt `timeout`.
    pub fn new(remote: Arc<dyn Remote>, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            remote,
            credentials,
            timeout,
        }
    }
}

#[async_trait]
impl Probe for ConnectProbe {
    async fn probe(&self, router: &RouterRecord) -> bool {
        let address = router.public_address.to_string();
        match self
            .remote
            .connect(&address, &self.credentials, self.timeout)
            .await
        {
            Ok(session) => {
                if let Err(e) = session.close().await {
                    tracing::debug!(router_id = router.id, error = %e, "probe session close failed");
                }
                true
            }
            Err(e) => {
                tracing::debug!(router_id = router.id, error = %e, "router not ready");
                false
            }
        }
    }
}

/// Wait until every router's probe has succeeded or `timeout` elapses.
///
/// A round that starts before the deadline runs to completion. An empty
/// fleet is ready immediately.
pub async fn wait_until_ready(
    fleet: &[RouterRecord],
    probe: &dyn Probe,
    timeout: Duration,
    poll_interval: Duration,
) -> ReadinessReport {
    let mut tracker = ReadinessTracker::new(fleet.iter().map(|r| r.id));
    let start = Instant::now();
    let deadline = start + timeout;
    let mut round = 0u32;

    while !tracker.all_ready() && Instant::now() < deadline {
        round += 1;
        let pending_ids = tracker.pending();
        let pending: Vec<&RouterRecord> = fleet
            .iter()
            .filter(|r| pending_ids.contains(&r.id))
            .collect();

        let outcomes = join_all(
            pending
                .iter()
                .map(|router| async move { (router.id, probe.probe(router).await) }),
        )
        .await;

        for (id, ready) in outcomes {
            if ready && tracker.mark_ready(id) {
                tracing::info!(router_id = id, round, "router ready");
            }
        }

        if tracker.all_ready() {
            break;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tracing::debug!(
            round,
            ready = tracker.ready_count(),
            total = fleet.len(),
            "waiting for routers"
        );
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }

    let report = tracker.report();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    if report.all_ready {
        tracing::info!(total = report.total, rounds = round, elapsed_ms, "all routers ready");
    } else {
        tracing::error!(
            ready = report.ready_ids.len(),
            total = report.total,
            elapsed_ms,
            "timeout waiting for routers"
        );
    }
    report
}
