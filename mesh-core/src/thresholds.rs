//! Pass/fail thresholds for the performance scenarios.

use bgpmesh_types::{Measurements, TestStatus};
use serde::Deserialize;
use std::fmt;

/// One performance scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Average route lookup duration.
    LookupLatency,
    /// Time for the mesh to reach a stable state.
    Convergence,
    /// Average CPU utilization under route load.
    CpuUnderLoad,
    /// Peak memory usage under route load.
    MemoryUnderLoad,
}

impl Scenario {
    /// Every scenario, in the order the harness runs them.
    pub const ALL: [Scenario; 4] = [
        Scenario::LookupLatency,
        Scenario::Convergence,
        Scenario::CpuUnderLoad,
        Scenario::MemoryUnderLoad,
    ];

    /// Name recorded in the report.
    pub fn name(self) -> &'static str {
        match self {
            Scenario::LookupLatency => "route_lookup_performance",
            Scenario::Convergence => "bgp_convergence",
            Scenario::CpuUnderLoad => "cpu_utilization",
            Scenario::MemoryUnderLoad => "memory_usage",
        }
    }

    /// Measurement the threshold is applied to.
    pub fn measurement_key(self) -> &'static str {
        match self {
            Scenario::LookupLatency => "avg_lookup_ms",
            Scenario::Convergence => "convergence_time",
            Scenario::CpuUnderLoad => "avg_cpu",
            Scenario::MemoryUnderLoad => "peak_memory_mb",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of applying a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// PASS or FAIL.
    pub status: TestStatus,
    /// Human-readable reason for a FAIL.
    pub detail: Option<String>,
}

impl Evaluation {
    fn pass() -> Self {
        Self {
            status: TestStatus::Pass,
            detail: None,
        }
    }

    fn fail(detail: String) -> Self {
        Self {
            status: TestStatus::Fail,
            detail: Some(detail),
        }
    }
}

/// Configured thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thresholds {
    /// Average lookup must be below this many milliseconds.
    #[serde(default = "default_lookup_ceiling_ms")]
    pub lookup_ceiling_ms: f64,
    /// Convergence must take at least this many seconds.
    #[serde(default = "default_convergence_min_secs")]
    pub convergence_min_secs: f64,
    /// Convergence must take at most this many seconds.
    #[serde(default = "default_convergence_max_secs")]
    pub convergence_max_secs: f64,
    /// Average CPU must be below this percentage.
    #[serde(default = "default_cpu_ceiling_percent")]
    pub cpu_ceiling_percent: f64,
    /// Peak memory must be below this many megabytes.
    #[serde(default = "default_memory_ceiling_mb")]
    pub memory_ceiling_mb: f64,
}

fn default_lookup_ceiling_ms() -> f64 {
    1.0
}

fn default_convergence_min_secs() -> f64 {
    0.5
}

fn default_convergence_max_secs() -> f64 {
    5.0
}

fn default_cpu_ceiling_percent() -> f64 {
    80.0
}

fn default_memory_ceiling_mb() -> f64 {
    200.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lookup_ceiling_ms: default_lookup_ceiling_ms(),
            convergence_min_secs: default_convergence_min_secs(),
            convergence_max_secs: default_convergence_max_secs(),
            cpu_ceiling_percent: default_cpu_ceiling_percent(),
            memory_ceiling_mb: default_memory_ceiling_mb(),
        }
    }
}

impl Thresholds {
    /// Decide PASS/FAIL for a scenario's measurement set.
    ///
    /// A missing or non-finite measurement is a FAIL.
    pub fn evaluate(&self, scenario: Scenario, measurements: &Measurements) -> Evaluation {
        let key = scenario.measurement_key();
        let value = match measurements.get(key) {
            Some(v) if v.is_finite() => *v,
            Some(v) => return Evaluation::fail(format!("{key} is not finite: {v}")),
            None => return Evaluation::fail(format!("missing measurement {key}")),
        };

        let (ok, bound) = match scenario {
            Scenario::LookupLatency => (
                value < self.lookup_ceiling_ms,
                format!("< {}", self.lookup_ceiling_ms),
            ),
            Scenario::Convergence => (
                (self.convergence_min_secs..=self.convergence_max_secs).contains(&value),
                format!("in [{}, {}]", self.convergence_min_secs, self.convergence_max_secs),
            ),
            Scenario::CpuUnderLoad => (
                value < self.cpu_ceiling_percent,
                format!("< {}", self.cpu_ceiling_percent),
            ),
            Scenario::MemoryUnderLoad => (
                value < self.memory_ceiling_mb,
                format!("< {}", self.memory_ceiling_mb),
            ),
        };

        if ok {
            Evaluation::pass()
        } else {
            Evaluation::fail(format!("{key}={value} not {bound}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(key: &str, value: f64) -> Measurements {
        Measurements::from([(key.to_string(), value)])
    }

    #[test]
    fn ceilings_are_strict() {
        let t = Thresholds::default();
        assert_eq!(t.evaluate(Scenario::CpuUnderLoad, &m("avg_cpu", 49.0)).status, TestStatus::Pass);
        assert_eq!(t.evaluate(Scenario::CpuUnderLoad, &m("avg_cpu", 80.0)).status, TestStatus::Fail);
        assert_eq!(
            t.evaluate(Scenario::MemoryUnderLoad, &m("peak_memory_mb", 156.8)).status,
            TestStatus::Pass
        );
        assert_eq!(
            t.evaluate(Scenario::LookupLatency, &m("avg_lookup_ms", 0.05)).status,
            TestStatus::Pass
        );
    }

    #[test]
    fn convergence_bounds_are_inclusive() {
        let t = Thresholds::default();
        for (value, expected) in [
            (0.4, TestStatus::Fail),
            (0.5, TestStatus::Pass),
            (2.5, TestStatus::Pass),
            (5.0, TestStatus::Pass),
            (5.1, TestStatus::Fail),
        ] {
            let eval = t.evaluate(Scenario::Convergence, &m("convergence_time", value));
            assert_eq!(eval.status, expected, "convergence_time={value}");
        }
    }

    #[test]
    fn missing_or_nan_measurement_fails() {
        let t = Thresholds::default();
        let eval = t.evaluate(Scenario::CpuUnderLoad, &Measurements::new());
        assert_eq!(eval.status, TestStatus::Fail);
        assert_eq!(eval.detail.as_deref(), Some("missing measurement avg_cpu"));

        let eval = t.evaluate(Scenario::CpuUnderLoad, &m("avg_cpu", f64::NAN));
        assert_eq!(eval.status, TestStatus::Fail);
    }

    #[test]
    fn failure_detail_names_the_bound() {
        let t = Thresholds::default();
        let eval = t.evaluate(Scenario::MemoryUnderLoad, &m("peak_memory_mb", 512.0));
        assert_eq!(eval.detail.as_deref(), Some("peak_memory_mb=512 not < 200"));
    }

    #[test]
    fn thresholds_from_toml_use_defaults() {
        let t: Thresholds = toml::from_str("cpu_ceiling_percent = 50.0").unwrap();
        assert_eq!(t.cpu_ceiling_percent, 50.0);
        assert_eq!(t.memory_ceiling_mb, 200.0);
    }

    #[test]
    fn scenario_names() {
        let names: Vec<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["route_lookup_performance", "bgp_convergence", "cpu_utilization", "memory_usage"]
        );
    }
}
