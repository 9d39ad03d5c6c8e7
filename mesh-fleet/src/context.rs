//! Explicit run context.
//!
//! Built once by the binary and handed to the pipeline; holds every external
//! collaborator so nothing lives in a global.

use std::sync::Arc;

use crate::config::{Config, SinkKind};
use crate::operations::RemoteTarget;
use crate::provision::{Provisioner, TerraformProvisioner};
use crate::remote::{Credentials, Remote, SshRemote};
use crate::sink::{ArtifactSink, FileSink, S3Sink};

/// Configuration plus the collaborators it selects.
#[derive(Clone)]
pub struct FleetContext {
    /// Typed configuration.
    pub config: Config,
    /// Provisioning tool.
    pub provisioner: Arc<dyn Provisioner>,
    /// Remote session factory.
    pub remote: Arc<dyn Remote>,
    /// Report destination.
    pub sink: Arc<dyn ArtifactSink>,
    credentials: Credentials,
}

impl FleetContext {
    /// Assemble a context from explicit collaborators.
    pub fn new(
        config: Config,
        provisioner: Arc<dyn Provisioner>,
        remote: Arc<dyn Remote>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        let credentials = config.credentials();
        Self {
            config,
            provisioner,
            remote,
            sink,
            credentials,
        }
    }

    /// Build the production collaborators named by `config`.
    ///
    /// The S3 sink loads AWS credentials from the environment.
    pub async fn from_config(config: Config) -> Self {
        let provisioner = Arc::new(TerraformProvisioner::new(
            config.provision.binary.clone(),
            config.provision.working_dir.clone(),
        ));
        let remote = Arc::new(SshRemote::new(config.remote.command_timeout()));
        let sink: Arc<dyn ArtifactSink> = match config.report.sink {
            SinkKind::File => Arc::new(FileSink::new(config.report.directory.clone())),
            SinkKind::S3 => Arc::new(
                S3Sink::from_env(
                    config.report.bucket.clone(),
                    Some(config.provision.region.clone()),
                )
                .await,
            ),
        };
        Self::new(config, provisioner, remote, sink)
    }

    /// Login material for every router.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// How operations reach routers.
    pub fn target(&self) -> RemoteTarget {
        RemoteTarget {
            remote: Arc::clone(&self.remote),
            credentials: self.credentials.clone(),
            connect_timeout: self.config.remote.connect_timeout(),
        }
    }
}
