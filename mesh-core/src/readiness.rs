//! Readiness bookkeeping for the fleet - NO I/O, just state transitions.
//!
//! Each router starts `Unknown` and moves to `Ready` the first time its probe
//! succeeds. `Ready` is terminal: a ready router is never probed again and
//! never goes back to `Unknown`.

use bgpmesh_types::RouterId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadinessState {
    /// Not yet seen reachable.
    Unknown,
    /// Seen reachable at least once.
    Ready,
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Routers that became ready.
    pub ready_ids: BTreeSet<RouterId>,
    /// True iff every router became ready.
    pub all_ready: bool,
    /// Fleet size.
    pub total: usize,
}

/// Tracks readiness for a fixed set of routers.
#[derive(Debug, Clone, Default)]
pub struct ReadinessTracker {
    states: BTreeMap<RouterId, ReadinessState>,
}

impl ReadinessTracker {
    /// Start every router in `Unknown`.
    pub fn new(ids: impl IntoIterator<Item = RouterId>) -> Self {
        Self {
            states: ids.into_iter().map(|id| (id, ReadinessState::Unknown)).collect(),
        }
    }

    /// Routers still to probe, ascending.
    pub fn pending(&self) -> Vec<RouterId> {
        self.states
            .iter()
            .filter(|(_, s)| **s == ReadinessState::Unknown)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Record a successful probe.
    ///
    /// Returns true if this call moved the router to `Ready`. Unknown ids and
    /// already-ready routers are ignored.
    pub fn mark_ready(&mut self, id: RouterId) -> bool {
        match self.states.get_mut(&id) {
            Some(state) if *state == ReadinessState::Unknown => {
                *state = ReadinessState::Ready;
                true
            }
            _ => false,
        }
    }

    /// True once every router is ready (vacuously true for an empty fleet).
    pub fn all_ready(&self) -> bool {
        self.states.values().all(|s| *s == ReadinessState::Ready)
    }

    /// Number of ready routers.
    pub fn ready_count(&self) -> usize {
        self.states.values().filter(|s| **s == ReadinessState::Ready).count()
    }

    /// Snapshot as a report.
    pub fn report(&self) -> ReadinessReport {
        ReadinessReport {
            ready_ids: self
                .states
                .iter()
                .filter(|(_, s)| **s == ReadinessState::Ready)
                .map(|(id, _)| *id)
                .collect(),
            all_ready: self.all_ready(),
            total: self.states.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let tracker = ReadinessTracker::new([1, 2, 3]);
        assert_eq!(tracker.pending(), vec![1, 2, 3]);
        assert!(tracker.report().ready_ids.is_empty());
        assert!(!tracker.all_ready());
    }

    #[test]
    fn ready_is_terminal_and_idempotent() {
        let mut tracker = ReadinessTracker::new([1, 2]);
        assert!(tracker.mark_ready(2));
        assert!(!tracker.mark_ready(2));
        assert_eq!(tracker.pending(), vec![1]);
        assert_eq!(tracker.report().ready_ids, BTreeSet::from([2]));
        assert_eq!(tracker.ready_count(), 1);
    }

    #[test]
    fn unknown_id_is_ignored() {
        let mut tracker = ReadinessTracker::new([1]);
        assert!(!tracker.mark_ready(9));
        assert_eq!(tracker.pending(), vec![1]);
        assert_eq!(tracker.report().total, 1);
    }

    #[test]
    fn report_reflects_partial_and_full_readiness() {
        let mut tracker = ReadinessTracker::new([1, 2, 3]);
        tracker.mark_ready(3);
        let report = tracker.report();
        assert_eq!(report.ready_ids, BTreeSet::from([3]));
        assert!(!report.all_ready);
        assert_eq!(report.total, 3);

        tracker.mark_ready(1);
        tracker.mark_ready(2);
        assert!(tracker.report().all_ready);
    }

    #[test]
    fn empty_fleet_is_ready() {
        let tracker = ReadinessTracker::new(Vec::new());
        assert!(tracker.all_ready());
        assert!(tracker.pending().is_empty());
    }
}
