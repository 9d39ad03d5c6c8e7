//! # bgpmesh-fleet
//!
//! Async fleet orchestration for bgp-mesh.
//!
//! Drives the pure pieces in `bgpmesh-core` against real collaborators:
//!
//! - **Remote execution**: [`Remote`]/[`Session`] traits, OpenSSH and mock implementations
//! - **Provisioning**: [`Provisioner`] trait, Terraform and mock implementations
//! - **Readiness**: [`wait_until_ready`] polls the fleet until reachable or deadline
//! - **Executor**: [`executor::run`] runs one operation on every router concurrently
//! - **Performance**: [`PerformanceHarness`] records one metric per scenario
//! - **Artifacts**: [`ArtifactSink`] with file, S3, and in-memory sinks
//!
//! ## Example
//!
//! ```ignore
//! use bgpmesh_fleet::{Config, FleetContext, Pipeline};
//!
//! let config = Config::load(None)?;
//! let ctx = FleetContext::from_config(config).await;
//! let summary = Pipeline::new(ctx).run().await?;
//! println!("report at {}", summary.report_location);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod context;
pub mod executor;
pub mod operations;
pub mod perf;
pub mod pipeline;
pub mod provision;
pub mod readiness;
pub mod remote;
pub mod sink;

pub use collector::ResultCollector;
pub use config::{Config, ConfigError, SinkKind, DEFAULT_CONFIG_FILE};
pub use context::FleetContext;
pub use executor::FleetOperation;
pub use operations::{ConfigureOperation, InjectOperation, OperationError, RemoteTarget};
pub use perf::{
    LookupBenchmark, MeasurementCommands, MeasurementError, MeasurementSource, PerformanceHarness,
    RemoteMeasurements,
};
pub use pipeline::{Pipeline, PipelineError, RunSummary, Stage};
pub use provision::{MockProvisioner, ProvisionError, Provisioner, TerraformProvisioner};
pub use readiness::{wait_until_ready, ConnectProbe, Probe};
pub use remote::{Credentials, ExecOutput, MockRemote, Remote, RemoteError, Session, SshRemote};
pub use sink::{ArtifactSink, FileSink, MemorySink, S3Sink, SinkError};
