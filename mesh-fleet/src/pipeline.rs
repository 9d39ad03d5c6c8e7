//! The end-to-end run.
//!
//! provision → discover → wait-for-ready → configure-mesh → inject-routes →
//! run-performance-tests → upload-report. A fatal stage stops every later
//! stage. Threshold failures are not fatal: all scenarios run, the report is
//! uploaded, and only then is the run reported as failed. Nothing here ever
//! tears the fleet down; that is [`Pipeline::teardown`], invoked explicitly.

use bgpmesh_core::{mesh, routes, CommandTemplate, Inventory, ReadinessReport, TemplateError};
use bgpmesh_types::{AggregateResult, DiscoveryError, Report, RouteSpec, RouterId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

use crate::collector::ResultCollector;
use crate::context::FleetContext;
use crate::executor::{self, FleetOperation};
use crate::operations::{ConfigureOperation, InjectOperation};
use crate::perf::{LookupBenchmark, MeasurementCommands, PerformanceHarness, RemoteMeasurements};
use crate::provision::ProvisionError;
use crate::readiness::{wait_until_ready, ConnectProbe};
use crate::sink::{encode_report, report_key, SinkError, REPORT_CONTENT_TYPE};

/// Pipeline stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Create the fleet.
    Provision,
    /// Read provisioning output into the inventory.
    Discover,
    /// Wait until every router is reachable.
    WaitForReady,
    /// Push the full-mesh configuration.
    ConfigureMesh,
    /// Inject the synthetic route batch.
    InjectRoutes,
    /// Run the performance scenarios.
    PerformanceTests,
    /// Hand the report to the sink.
    UploadReport,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Provision => "provision",
            Stage::Discover => "discover",
            Stage::WaitForReady => "wait-for-ready",
            Stage::ConfigureMesh => "configure-mesh",
            Stage::InjectRoutes => "inject-routes",
            Stage::PerformanceTests => "run-performance-tests",
            Stage::UploadReport => "upload-report",
        };
        f.write_str(name)
    }
}

/// Why a run failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The provisioning tool failed.
    #[error("provisioning failed: {0}")]
    Provision(ProvisionError),

    /// Provisioning output did not describe a fleet.
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The fleet was not fully reachable in time.
    #[error("only {ready} of {total} routers ready before the deadline")]
    ReadinessTimeout {
        /// Routers that became ready.
        ready: usize,
        /// Fleet size.
        total: usize,
    },

    /// Configuration failed on some routers.
    #[error("configuration failed on routers {failed:?}")]
    Configuration {
        /// Failed router ids, ascending.
        failed: Vec<RouterId>,
    },

    /// Route injection failed on some routers.
    #[error("route injection failed on routers {failed:?}")]
    Injection {
        /// Failed router ids, ascending.
        failed: Vec<RouterId>,
    },

    /// Some performance scenarios failed (the report was still uploaded).
    #[error("performance scenarios failed: {failed:?}")]
    MetricThreshold {
        /// Failed scenario names, in run order.
        failed: Vec<String>,
    },

    /// The report could not be stored.
    #[error("report upload failed: {0}")]
    Upload(#[from] SinkError),

    /// A configured command template is malformed.
    #[error("invalid command template: {0}")]
    Template(#[from] TemplateError),

    /// The route payload could not be encoded.
    #[error("failed to encode route payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<ProvisionError> for PipelineError {
    fn from(e: ProvisionError) -> Self {
        match e {
            ProvisionError::Discovery(d) => PipelineError::Discovery(d),
            other => PipelineError::Provision(other),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Fleet size.
    pub router_count: usize,
    /// Readiness outcome.
    pub readiness: ReadinessReport,
    /// Configure outcome.
    pub configure: AggregateResult,
    /// Inject outcome.
    pub inject: AggregateResult,
    /// Uploaded report.
    pub report: Report,
    /// Where the report went.
    pub report_location: String,
}

/// One run against one fleet.
pub struct Pipeline {
    ctx: FleetContext,
    inventory: Inventory,
    deployed_at: DateTime<Utc>,
    routes: Arc<Vec<RouteSpec>>,
    collector: ResultCollector,
}

impl Pipeline {
    /// Create a pipeline over `ctx`.
    pub fn new(ctx: FleetContext) -> Self {
        Self {
            ctx,
            inventory: Inventory::new(),
            deployed_at: Utc::now(),
            routes: Arc::new(Vec::new()),
            collector: ResultCollector::new(),
        }
    }

    /// Discovered routers.
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Metrics recorded so far.
    pub fn collector(&self) -> &ResultCollector {
        &self.collector
    }

    /// Run every stage in order.
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        self.provision().await?;
        let router_count = self.discover().await?;
        let readiness = self.wait_for_ready().await?;
        let configure = self.configure_mesh().await?;
        let inject = self.inject_routes().await?;
        self.run_performance_tests().await?;
        let (report, report_location) = self.upload_report().await?;

        let failed = self.collector.failed_names();
        if !failed.is_empty() {
            tracing::error!(failed = ?failed, "performance scenarios failed");
            return Err(PipelineError::MetricThreshold { failed });
        }
        tracing::info!(
            routers = router_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run completed"
        );
        Ok(RunSummary {
            router_count,
            readiness,
            configure,
            inject,
            report,
            report_location,
        })
    }

    /// Create the fleet and stamp the deployment time.
    pub async fn provision(&mut self) -> Result<(), PipelineError> {
        log_stage(Stage::Provision);
        self.ctx.provisioner.apply().await?;
        self.deployed_at = Utc::now();
        Ok(())
    }

    /// Replace the inventory from provisioning output. Returns the fleet size.
    pub async fn discover(&mut self) -> Result<usize, PipelineError> {
        log_stage(Stage::Discover);
        let outputs = self.ctx.provisioner.read_outputs().await?;
        let settings = self.ctx.config.inventory_settings();
        let routers = self.inventory.populate(&outputs, &settings)?;
        for router in routers {
            tracing::debug!(router_id = router.id, asn = router.asn, zone = %router.zone, "discovered {router}");
        }
        tracing::info!(routers = self.inventory.size(), "inventory populated");
        Ok(self.inventory.size())
    }

    /// Wait until every router accepts a session.
    pub async fn wait_for_ready(&self) -> Result<ReadinessReport, PipelineError> {
        log_stage(Stage::WaitForReady);
        let readiness = &self.ctx.config.readiness;
        let probe = ConnectProbe::new(
            Arc::clone(&self.ctx.remote),
            self.ctx.credentials().clone(),
            self.ctx.config.remote.connect_timeout(),
        );
        let report = wait_until_ready(
            self.inventory.routers(),
            &probe,
            readiness.timeout(),
            readiness.poll_interval(),
        )
        .await;
        if report.all_ready {
            Ok(report)
        } else {
            Err(PipelineError::ReadinessTimeout {
                ready: report.ready_ids.len(),
                total: report.total,
            })
        }
    }

    /// Generate and push every router's configuration.
    pub async fn configure_mesh(&self) -> Result<AggregateResult, PipelineError> {
        log_stage(Stage::ConfigureMesh);
        let routing = &self.ctx.config.routing;
        let operation = Arc::new(ConfigureOperation::new(
            self.ctx.target(),
            Arc::new(self.render_configs()),
            routing.config_path.clone(),
            CommandTemplate::parse(&routing.apply_command)?,
        ));
        let aggregate = self.execute_with_retries(operation).await;
        if aggregate.all_succeeded {
            Ok(aggregate)
        } else {
            Err(PipelineError::Configuration {
                failed: aggregate.failed_ids(),
            })
        }
    }

    /// Inject the synthetic route batch on every router.
    pub async fn inject_routes(&mut self) -> Result<AggregateResult, PipelineError> {
        log_stage(Stage::InjectRoutes);
        let cfg = &self.ctx.config.routes;
        let batch = routes::generate_routes(cfg.count, self.ctx.config.fleet.base_asn);
        let payload = routes::encode_payload(&batch)?;
        tracing::info!(routes = batch.len(), payload_bytes = payload.len(), "route batch built");

        let operation = Arc::new(InjectOperation::new(
            self.ctx.target(),
            Arc::new(payload),
            cfg.payload_path.clone(),
            cfg.script_path.clone(),
        )?);
        self.routes = Arc::new(batch);

        let aggregate = self.execute_with_retries(operation).await;
        if aggregate.all_succeeded {
            Ok(aggregate)
        } else {
            Err(PipelineError::Injection {
                failed: aggregate.failed_ids(),
            })
        }
    }

    /// Run every performance scenario into the collector.
    ///
    /// Scenario failures are recorded, never returned; only malformed
    /// measurement commands fail this stage.
    pub async fn run_performance_tests(&mut self) -> Result<(), PipelineError> {
        log_stage(Stage::PerformanceTests);
        let perf = &self.ctx.config.performance;
        let commands = MeasurementCommands::parse(
            &perf.convergence_command,
            &perf.cpu_command,
            &perf.memory_command,
        )?;
        let harness = PerformanceHarness::new(
            LookupBenchmark::new(Arc::clone(&self.routes), perf.lookup_samples),
            Arc::new(RemoteMeasurements::new(
                self.ctx.target(),
                perf.script_path.clone(),
                commands,
            )),
            self.ctx.config.thresholds.clone(),
        );
        harness.run(self.inventory.routers(), &mut self.collector).await;
        Ok(())
    }

    /// Encode the report and hand it to the sink.
    pub async fn upload_report(&self) -> Result<(Report, String), PipelineError> {
        log_stage(Stage::UploadReport);
        let report = self.collector.report(self.inventory.size(), self.deployed_at);
        let key = report_key(&self.ctx.config.report.key_prefix, Utc::now());
        let bytes = encode_report(&report)?;
        self.ctx.sink.put(&key, &bytes, REPORT_CONTENT_TYPE).await?;
        let location = self.ctx.sink.location(&key);
        tracing::info!(location = %location, metrics = report.test_results.len(), "report uploaded");
        Ok((report, location))
    }

    /// Per-router configuration text for the current inventory.
    pub fn render_configs(&self) -> BTreeMap<RouterId, String> {
        mesh::generate_all(self.inventory.routers())
    }

    /// Destroy the fleet.
    pub async fn teardown(&self) -> Result<(), PipelineError> {
        tracing::info!("destroying fleet");
        self.ctx.provisioner.destroy().await?;
        tracing::info!("fleet destroyed");
        Ok(())
    }

    /// Run `operation`, then re-run it on failed routers up to
    /// `routing.max_attempts` invocations in total.
    async fn execute_with_retries(&self, operation: Arc<dyn FleetOperation>) -> AggregateResult {
        let max_attempts = self.ctx.config.routing.max_attempts.max(1);
        let mut aggregate = executor::run(self.inventory.routers(), Arc::clone(&operation)).await;
        let mut attempt = 1;
        while !aggregate.all_succeeded && attempt < max_attempts {
            attempt += 1;
            let failed = aggregate.failed_ids();
            tracing::warn!(operation = %aggregate.operation_kind, attempt, routers = ?failed, "retrying failed routers");
            let retry = executor::run(&self.inventory.subset(&failed), Arc::clone(&operation)).await;
            aggregate = aggregate.merge(retry);
        }
        aggregate
    }
}

fn log_stage(stage: Stage) {
    tracing::info!(stage = %stage, "stage started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provision::MockProvisioner;
    use crate::remote::MockRemote;
    use crate::sink::MemorySink;
    use bgpmesh_core::ProvisionOutputs;

    struct Harness {
        provisioner: MockProvisioner,
        remote: MockRemote,
        sink: MemorySink,
        pipeline: Pipeline,
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.readiness.timeout_secs = 5;
        config.readiness.poll_interval_secs = 1;
        config.routes.count = 300;
        config.performance.lookup_samples = 200;
        config
    }

    fn harness(n: usize, config: Config) -> Harness {
        let provisioner = MockProvisioner::with_fleet(n);
        let remote = MockRemote::new();
        remote.respond(None, "convergence", r#"{"convergence_time": 2.5}"#);
        remote.respond(None, "cpu", r#"{"avg_cpu": 15.0}"#);
        remote.respond(None, "memory", r#"{"peak_memory_mb": 120.0}"#);
        let sink = MemorySink::new();
        let ctx = FleetContext::new(
            config,
            Arc::new(provisioner.clone()),
            Arc::new(remote.clone()),
            Arc::new(sink.clone()),
        );
        Harness {
            provisioner,
            remote,
            sink,
            pipeline: Pipeline::new(ctx),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_uploads_report() {
        let mut h = harness(3, test_config());
        let summary = h.pipeline.run().await.unwrap();

        assert_eq!(summary.router_count, 3);
        assert!(summary.readiness.all_ready);
        assert!(summary.configure.all_succeeded);
        assert!(summary.inject.all_succeeded);
        assert!(summary.report.all_passed());
        assert_eq!(summary.report.test_results.len(), 4);

        let artifact = h.sink.last().unwrap();
        assert!(artifact.key.starts_with("test_results/"));
        assert!(artifact.key.ends_with("_results.json"));
        assert_eq!(artifact.content_type, "application/json");
        let json: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(json["topology_info"]["router_count"], 3);
        assert_eq!(json["test_results"][1]["test_name"], "bgp_convergence");

        let commands = h.remote.commands_for("54.0.0.2");
        assert!(commands[0].contains("systemctl restart frr"));
        assert_eq!(commands[1], "python3 /tmp/inject_routes.py /tmp/routes.json 65002");
        assert_eq!(commands.len(), 5);

        assert_eq!(h.provisioner.apply_calls(), 1);
        assert_eq!(h.provisioner.destroy_calls(), 0);
        assert_eq!(h.remote.open_sessions(), 0);
        assert_eq!(h.remote.dropped_unclosed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_failure_halts_before_injection() {
        let mut h = harness(3, test_config());
        h.remote.fail_command(Some("54.0.0.2"), "systemctl", 1);

        let err = h.pipeline.run().await.unwrap_err();
        assert!(matches!(&err, PipelineError::Configuration { failed } if failed == &vec![2]));

        for address in ["54.0.0.1", "54.0.0.2", "54.0.0.3"] {
            assert!(h.remote.uploaded(address, "/tmp/routes.json").is_none());
            // Every router was still attempted.
            assert_eq!(h.remote.commands_for(address).len(), 1);
        }
        assert!(h.sink.artifacts().is_empty());
        assert_eq!(h.provisioner.destroy_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn injection_failure_is_fatal() {
        let mut h = harness(2, test_config());
        h.remote.fail_command(Some("54.0.0.1"), "inject_routes", 3);
        let err = h.pipeline.run().await.unwrap_err();
        assert!(matches!(&err, PipelineError::Injection { failed } if failed == &vec![1]));
        assert!(h.pipeline.collector().metrics().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_only_failed_routers() {
        let mut config = test_config();
        config.routing.max_attempts = 2;
        let mut h = harness(3, config);

        h.pipeline.provision().await.unwrap();
        h.pipeline.discover().await.unwrap();
        h.pipeline.wait_for_ready().await.unwrap();
        h.remote.fail_connects("54.0.0.2", 1);

        let agg = h.pipeline.configure_mesh().await.unwrap();
        assert!(agg.all_succeeded);
        // probe + failed attempt + retry
        assert_eq!(h.remote.connect_count("54.0.0.2"), 3);
        assert_eq!(h.remote.connect_count("54.0.0.1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_reports_transient_failure() {
        let mut h = harness(3, test_config());
        h.pipeline.provision().await.unwrap();
        h.pipeline.discover().await.unwrap();
        h.remote.fail_connects("54.0.0.3", 1);
        let err = h.pipeline.configure_mesh().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { failed } if failed == vec![3]));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_router_times_out_readiness() {
        let mut h = harness(3, test_config());
        h.remote.set_unreachable("54.0.0.3");
        let started = Instant::now();
        let err = h.pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::ReadinessTimeout { ready: 2, total: 3 }));
        assert!(started.elapsed() < std::time::Duration::from_secs(6));
        assert!(h.remote.uploads_for("54.0.0.1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_outputs_stop_before_contacting_routers() {
        let h = harness(0, test_config());
        h.provisioner.set_outputs(ProvisionOutputs {
            public_addresses: vec!["54.0.0.1".into(), "54.0.0.2".into()],
            private_addresses: vec!["10.0.1.11".into()],
            instance_ids: Vec::new(),
        });
        let mut pipeline = h.pipeline;
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Discovery(DiscoveryError::LengthMismatch { .. })));
        assert_eq!(h.remote.connect_count("54.0.0.1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_failure_still_uploads_report() {
        let mut h = harness(2, test_config());
        h.remote.respond(None, "cpu", r#"{"avg_cpu": 99.0}"#);

        let err = h.pipeline.run().await.unwrap_err();
        match err {
            PipelineError::MetricThreshold { failed } => assert_eq!(failed, vec!["cpu_utilization"]),
            other => panic!("unexpected error: {other}"),
        }
        let report: Report = serde_json::from_slice(&h.sink.last().unwrap().bytes).unwrap();
        assert_eq!(report.test_results.len(), 4);
        assert!(!report.all_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_fails_the_run() {
        let mut h = harness(2, test_config());
        h.sink.fail_with("bucket gone");

        let err = h.pipeline.run().await.unwrap_err();
        assert!(
            matches!(err, PipelineError::Upload(SinkError::Unavailable(ref m)) if m == "bucket gone"),
            "unexpected error: {err}"
        );
        assert!(h.sink.artifacts().is_empty());
        assert_eq!(h.pipeline.collector().metrics().len(), 4);
        assert!(h.pipeline.collector().failed_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_outranks_threshold_failure() {
        let mut h = harness(2, test_config());
        h.remote.respond(None, "cpu", r#"{"avg_cpu": 99.0}"#);
        h.sink.fail_with("bucket gone");

        let err = h.pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)), "unexpected error: {err}");
        assert_eq!(h.pipeline.collector().failed_names(), vec!["cpu_utilization"]);
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_failure_is_fatal() {
        let mut h = harness(3, test_config());
        h.provisioner.fail_apply("no credentials");
        let err = h.pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Provision(_)));
        assert_eq!(h.provisioner.read_calls(), 0);
    }

    #[tokio::test]
    async fn teardown_only_destroys() {
        let h = harness(3, test_config());
        h.pipeline.teardown().await.unwrap();
        assert_eq!(h.provisioner.destroy_calls(), 1);
        assert_eq!(h.provisioner.apply_calls(), 0);
    }

    #[tokio::test]
    async fn render_matches_generator() {
        let mut h = harness(4, test_config());
        h.pipeline.discover().await.unwrap();
        let configs = h.pipeline.render_configs();
        assert_eq!(configs.len(), 4);
        assert_eq!(mesh::neighbor_count(&configs[&1]), 3);
        assert_eq!(h.remote.connect_count("54.0.0.1"), 0);
    }
}
