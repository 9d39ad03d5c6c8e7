//! Performance metrics and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Named numeric measurements, ordered by name.
pub type Measurements = BTreeMap<String, f64>;

/// Outcome of one performance scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    /// Every threshold held.
    Pass,
    /// A threshold was violated or the measurement could not be taken.
    Fail,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => write!(f, "PASS"),
            TestStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// One recorded performance result. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetric {
    /// Scenario name.
    #[serde(rename = "test_name")]
    pub name: String,
    /// PASS or FAIL.
    pub status: TestStatus,
    /// Scenario wall time, serialized as fractional seconds.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Measurement set the status was decided on.
    #[serde(rename = "details")]
    pub measurements: Measurements,
    /// When the scenario finished.
    pub timestamp: DateTime<Utc>,
    /// Why a scenario failed, when it failed for a reason other than a threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Fleet facts included with the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyInfo {
    /// Routers in the inventory.
    pub router_count: usize,
    /// When the fleet was provisioned.
    pub deployment_time: DateTime<Utc>,
}

/// Payload handed to the artifact sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Metrics in the order they were recorded.
    pub test_results: Vec<TestMetric>,
    /// Fleet facts.
    pub topology_info: TopologyInfo,
}

impl Report {
    /// True iff every metric passed.
    pub fn all_passed(&self) -> bool {
        self.test_results.iter().all(|m| m.status == TestStatus::Pass)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(status: TestStatus) -> TestMetric {
        TestMetric {
            name: "bgp_convergence".into(),
            status,
            duration: Duration::from_millis(1500),
            measurements: Measurements::from([("convergence_time".to_string(), 2.5)]),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            detail: None,
        }
    }

    #[test]
    fn metric_serializes_status_and_seconds() {
        let json = serde_json::to_value(metric(TestStatus::Pass)).unwrap();
        assert_eq!(json["status"], "PASS");
        assert_eq!(json["test_name"], "bgp_convergence");
        assert_eq!(json["duration"], 1.5);
        assert_eq!(json["details"]["convergence_time"], 2.5);
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn report_shape() {
        let report = Report {
            test_results: vec![metric(TestStatus::Pass), metric(TestStatus::Fail)],
            topology_info: TopologyInfo {
                router_count: 10,
                deployment_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            },
        };
        assert!(!report.all_passed());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["test_results"].as_array().unwrap().len(), 2);
        assert_eq!(json["topology_info"]["router_count"], 10);

        let back: Report = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
