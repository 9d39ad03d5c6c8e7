//! Performance harness.
//!
//! Runs every scenario once and records one [`TestMetric`] per scenario.
//! Route lookup latency is measured locally against a [`RouteTable`] built
//! from the injected batch; convergence, CPU, and memory are read from the
//! routers by running a bundled measurement script.

use async_trait::async_trait;
use bgpmesh_core::{CommandTemplate, RouteTable, Scenario, TemplateError, Thresholds};
use bgpmesh_types::{Measurements, RouteSpec, RouterId, RouterRecord, TestMetric, TestStatus};
use chrono::Utc;
use futures_util::future::join_all;
use std::hint::black_box;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;

use crate::collector::ResultCollector;
use crate::operations::{run_checked, OperationError, RemoteTarget};
use crate::remote::{ExecOutput, Session};

/// Measurement script uploaded before each remote scenario.
pub const MEASURE_SCRIPT: &str = include_str!("../assets/measure.py");

/// A scenario's measurements could not be taken.
#[derive(Debug, Error)]
pub enum MeasurementError {
    /// Remote execution failed on one router.
    #[error("router {router_id}: {source}")]
    Router {
        /// Router that failed.
        router_id: RouterId,
        /// What went wrong.
        #[source]
        source: OperationError,
    },

    /// A router printed something other than a JSON object of numbers.
    #[error("router {router_id} printed invalid measurements: {reason}")]
    InvalidOutput {
        /// Router that printed it.
        router_id: RouterId,
        /// Parse failure.
        reason: String,
    },

    /// A router's measurements lack the scenario's key.
    #[error("router {router_id} did not report {key}")]
    MissingKey {
        /// Router that omitted it.
        router_id: RouterId,
        /// Expected key.
        key: &'static str,
    },

    /// Nothing to measure.
    #[error("fleet is empty")]
    EmptyFleet,

    /// This source does not measure the scenario.
    #[error("{0} is not measured remotely")]
    Unsupported(Scenario),
}

/// Produces a measurement set for a scenario.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Measure `scenario` across `fleet`.
    async fn measure(
        &self,
        scenario: Scenario,
        fleet: &[RouterRecord],
    ) -> Result<Measurements, MeasurementError>;
}

/// Commands for the remote scenarios; `{0}` is the uploaded script path.
#[derive(Debug, Clone)]
pub struct MeasurementCommands {
    /// Convergence.
    pub convergence: CommandTemplate,
    /// CPU under load.
    pub cpu: CommandTemplate,
    /// Memory under load.
    pub memory: CommandTemplate,
}

impl MeasurementCommands {
    /// Parse the three templates.
    pub fn parse(convergence: &str, cpu: &str, memory: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            convergence: CommandTemplate::parse(convergence)?,
            cpu: CommandTemplate::parse(cpu)?,
            memory: CommandTemplate::parse(memory)?,
        })
    }

    fn for_scenario(&self, scenario: Scenario) -> Option<&CommandTemplate> {
        match scenario {
            Scenario::LookupLatency => None,
            Scenario::Convergence => Some(&self.convergence),
            Scenario::CpuUnderLoad => Some(&self.cpu),
            Scenario::MemoryUnderLoad => Some(&self.memory),
        }
    }
}

/// Reads measurements from every router, one fresh session each.
pub struct RemoteMeasurements {
    target: RemoteTarget,
    script_path: String,
    commands: MeasurementCommands,
}

impl RemoteMeasurements {
    /// Measure through `target`, uploading the script to `script_path`.
    pub fn new(
        target: RemoteTarget,
        script_path: impl Into<String>,
        commands: MeasurementCommands,
    ) -> Self {
        Self {
            target,
            script_path: script_path.into(),
            commands,
        }
    }

    async fn run_script(
        &self,
        session: &dyn Session,
        command: &str,
    ) -> Result<ExecOutput, OperationError> {
        session
            .upload(&self.script_path, MEASURE_SCRIPT.as_bytes())
            .await?;
        run_checked(session, command).await
    }

    async fn measure_router(
        &self,
        router: &RouterRecord,
        command: &str,
    ) -> Result<Measurements, MeasurementError> {
        let router_id = router.id;
        let wrap = |source| MeasurementError::Router { router_id, source };

        let session = self
            .target
            .open(router)
            .await
            .map_err(|e| wrap(OperationError::from(e)))?;
        let outcome = self.run_script(session.as_ref(), command).await;
        let output = RemoteTarget::finish(session, outcome).await.map_err(wrap)?;

        serde_json::from_str(output.stdout.trim()).map_err(|e| MeasurementError::InvalidOutput {
            router_id,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MeasurementSource for RemoteMeasurements {
    async fn measure(
        &self,
        scenario: Scenario,
        fleet: &[RouterRecord],
    ) -> Result<Measurements, MeasurementError> {
        let template = self
            .commands
            .for_scenario(scenario)
            .ok_or(MeasurementError::Unsupported(scenario))?;
        if fleet.is_empty() {
            return Err(MeasurementError::EmptyFleet);
        }
        let command = template
            .render(&[self.script_path.as_str()])
            .map_err(|e| MeasurementError::Router {
                router_id: fleet[0].id,
                source: e.into(),
            })?;

        let per_router = join_all(fleet.iter().map(|r| self.measure_router(r, &command))).await;

        let key = scenario.measurement_key();
        let mut values = Vec::with_capacity(fleet.len());
        for (router, measured) in fleet.iter().zip(per_router) {
            let measured = measured?;
            let value = measured.get(key).copied().ok_or(MeasurementError::MissingKey {
                router_id: router.id,
                key,
            })?;
            values.push(value);
        }
        Ok(reduce(scenario, &values))
    }
}

/// Collapse per-router values: max for convergence and memory, mean for CPU.
fn reduce(scenario: Scenario, values: &[f64]) -> Measurements {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);

    let mut out = Measurements::new();
    match scenario {
        Scenario::CpuUnderLoad => {
            out.insert(scenario.measurement_key().into(), mean);
            out.insert("max_cpu".into(), max);
        }
        _ => {
            out.insert(scenario.measurement_key().into(), max);
            out.insert(format!("min_{}", scenario.measurement_key()), min);
        }
    }
    out.insert("router_count".into(), values.len() as f64);
    out
}

/// Times longest-prefix-match lookups over a route batch.
#[derive(Debug, Clone)]
pub struct LookupBenchmark {
    routes: Arc<Vec<RouteSpec>>,
    samples: usize,
}

impl LookupBenchmark {
    /// Benchmark `samples` lookups over `routes`.
    pub fn new(routes: Arc<Vec<RouteSpec>>, samples: usize) -> Self {
        Self { routes, samples }
    }

    /// Build the table, run the lookups, and report timings.
    ///
    /// Probe addresses fall inside the batch's own prefixes. With zero
    /// samples no average is reported.
    pub fn run(&self) -> Measurements {
        let table = RouteTable::from_routes(&self.routes);
        let probes = probe_addresses(&self.routes, self.samples);

        let started = std::time::Instant::now();
        let mut hits = 0usize;
        for addr in &probes {
            if black_box(table.lookup(black_box(*addr))).is_some() {
                hits += 1;
            }
        }
        let elapsed = started.elapsed();

        let mut out = Measurements::new();
        out.insert("total_lookups".into(), self.samples as f64);
        out.insert("hits".into(), hits as f64);
        out.insert("table_prefixes".into(), table.len() as f64);
        if self.samples > 0 {
            let avg = elapsed.as_secs_f64() / self.samples as f64;
            out.insert("avg_lookup_time".into(), avg);
            out.insert("avg_lookup_ms".into(), avg * 1000.0);
        }
        out
    }
}

/// Deterministic addresses: a stride through the batch, with varying host bits.
fn probe_addresses(routes: &[RouteSpec], samples: usize) -> Vec<Ipv4Addr> {
    (0..samples)
        .map(|i| {
            let salt = (i as u32).wrapping_mul(2_654_435_761);
            if routes.is_empty() {
                return Ipv4Addr::from(salt);
            }
            let route = &routes[i.wrapping_mul(7919) % routes.len()];
            let Ok(base) = route.prefix.parse::<Ipv4Addr>() else {
                return Ipv4Addr::UNSPECIFIED;
            };
            let host_mask = u32::MAX.checked_shr(u32::from(route.prefix_length)).unwrap_or(0);
            Ipv4Addr::from((u32::from(base) & !host_mask) | (salt & host_mask))
        })
        .collect()
}

/// Runs every scenario into a collector.
pub struct PerformanceHarness {
    benchmark: LookupBenchmark,
    source: Arc<dyn MeasurementSource>,
    thresholds: Thresholds,
}

impl PerformanceHarness {
    /// Create a harness.
    pub fn new(
        benchmark: LookupBenchmark,
        source: Arc<dyn MeasurementSource>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            benchmark,
            source,
            thresholds,
        }
    }

    /// Run all scenarios in order. A failed scenario never stops the rest.
    pub async fn run(&self, fleet: &[RouterRecord], collector: &mut ResultCollector) {
        for scenario in Scenario::ALL {
            let metric = self.run_scenario(scenario, fleet).await;
            match metric.status {
                TestStatus::Pass => tracing::info!(scenario = %scenario, "scenario passed"),
                TestStatus::Fail => tracing::warn!(
                    scenario = %scenario,
                    detail = metric.detail.as_deref().unwrap_or(""),
                    "scenario failed"
                ),
            }
            collector.record(metric);
        }
    }

    async fn run_scenario(&self, scenario: Scenario, fleet: &[RouterRecord]) -> TestMetric {
        let started = tokio::time::Instant::now();
        let measured = match scenario {
            Scenario::LookupLatency => Ok(self.benchmark.run()),
            _ => self.source.measure(scenario, fleet).await,
        };
        let (status, measurements, detail) = match measured {
            Ok(measurements) => {
                let evaluation = self.thresholds.evaluate(scenario, &measurements);
                (evaluation.status, measurements, evaluation.detail)
            }
            Err(e) => (TestStatus::Fail, Measurements::new(), Some(e.to_string())),
        };
        TestMetric {
            name: scenario.name().to_string(),
            status,
            duration: started.elapsed(),
            measurements,
            timestamp: Utc::now(),
            detail,
        }
    }
}
