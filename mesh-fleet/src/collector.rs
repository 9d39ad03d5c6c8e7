//! Result collector.

use bgpmesh_types::{Report, TestMetric, TestStatus, TopologyInfo};
use chrono::{DateTime, Utc};

/// Accumulates metrics in the order they are recorded.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    metrics: Vec<TestMetric>,
}

impl ResultCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a metric.
    pub fn record(&mut self, metric: TestMetric) {
        self.metrics.push(metric);
    }

    /// Recorded metrics.
    pub fn metrics(&self) -> &[TestMetric] {
        &self.metrics
    }

    /// Names of failed metrics, in record order.
    pub fn failed_names(&self) -> Vec<String> {
        self.metrics
            .iter()
            .filter(|m| m.status == TestStatus::Fail)
            .map(|m| m.name.clone())
            .collect()
    }

    /// Snapshot everything recorded so far as a report.
    pub fn report(&self, router_count: usize, deployment_time: DateTime<Utc>) -> Report {
        Report {
            test_results: self.metrics.clone(),
            topology_info: TopologyInfo {
                router_count,
                deployment_time,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgpmesh_types::Measurements;
    use std::time::Duration;

    fn metric(name: &str, status: TestStatus) -> TestMetric {
        TestMetric {
            name: name.into(),
            status,
            duration: Duration::from_millis(250),
            measurements: Measurements::from([("avg_cpu".to_string(), 12.0)]),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    #[test]
    fn report_keeps_record_order() {
        let mut collector = ResultCollector::new();
        collector.record(metric("bgp_convergence", TestStatus::Pass));
        collector.record(metric("cpu_utilization", TestStatus::Fail));
        collector.record(metric("memory_usage", TestStatus::Pass));

        let report = collector.report(10, Utc::now());
        let names: Vec<_> = report.test_results.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["bgp_convergence", "cpu_utilization", "memory_usage"]);
        assert_eq!(report.topology_info.router_count, 10);
        assert!(!report.all_passed());
        assert_eq!(collector.failed_names(), vec!["cpu_utilization"]);
    }

    #[test]
    fn report_serializes_with_uploaded_field_names() {
        let mut collector = ResultCollector::new();
        collector.record(metric("cpu_utilization", TestStatus::Pass));
        let value = serde_json::to_value(collector.report(3, Utc::now())).unwrap();
        let first = &value["test_results"][0];
        assert_eq!(first["test_name"], "cpu_utilization");
        assert_eq!(first["status"], "PASS");
        assert_eq!(first["duration"], 0.25);
        assert_eq!(first["details"]["avg_cpu"], 12.0);
        assert!(first.get("detail").is_none());
        assert_eq!(value["topology_info"]["router_count"], 3);
    }

    #[test]
    fn empty_collector_reports_nothing_failed() {
        let collector = ResultCollector::new();
        assert!(collector.failed_names().is_empty());
        assert!(collector.report(0, Utc::now()).all_passed());
    }
}
