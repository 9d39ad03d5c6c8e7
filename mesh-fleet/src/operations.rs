//! Per-router operations: push the mesh configuration, inject routes.
//!
//! Each call opens its own session and closes it before returning, whether the
//! work succeeded, a command exited non-zero, or the transport failed.

use async_trait::async_trait;
use bgpmesh_core::{CommandTemplate, TemplateError};
use bgpmesh_types::{OperationKind, RouterId, RouterRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::executor::FleetOperation;
use crate::remote::{Credentials, ExecOutput, Remote, RemoteError, Session};

/// Injector script uploaded to every router. Contains no route data.
pub const INJECTOR_SCRIPT: &str = include_str!("../assets/inject_routes.py");

/// Positional injector invocation: script, payload, local ASN.
pub const INJECT_COMMAND: &str = "python3 {0} {1} {2}";

/// Error from one router's operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Session-level failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A remote command exited non-zero.
    #[error("`{command}` exited with {exit_code}: {stderr}")]
    CommandFailed {
        /// Rendered command.
        command: String,
        /// Exit code.
        exit_code: i32,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The command template did not fit its arguments.
    #[error("command template: {0}")]
    Template(#[from] TemplateError),

    /// No configuration was generated for this router.
    #[error("no configuration generated for router {0}")]
    MissingConfig(RouterId),
}

/// How to reach routers.
#[derive(Clone)]
pub struct RemoteTarget {
    /// Session factory.
    pub remote: Arc<dyn Remote>,
    /// Login material.
    pub credentials: Credentials,
    /// Bound on each connect.
    pub connect_timeout: Duration,
}

impl RemoteTarget {
    /// Open a fresh session to `router`'s public address.
    pub async fn open(&self, router: &RouterRecord) -> Result<Box<dyn Session>, RemoteError> {
        self.remote
            .connect(
                &router.public_address.to_string(),
                &self.credentials,
                self.connect_timeout,
            )
            .await
    }

    /// Close `session` and hand back `outcome`.
    ///
    /// The session is always closed. A close failure is logged and never
    /// replaces the outcome.
    pub async fn finish<T>(
        session: Box<dyn Session>,
        outcome: Result<T, OperationError>,
    ) -> Result<T, OperationError> {
        let closed = session.close().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(value), Err(e)) => {
                tracing::warn!(address = session.address(), error = %e, "session close failed");
                Ok(value)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                tracing::debug!(address = session.address(), error = %close, "session close failed after error");
                Err(e)
            }
        }
    }
}

/// Run `command`, treating a non-zero exit as an error.
pub async fn run_checked(session: &dyn Session, command: &str) -> Result<ExecOutput, OperationError> {
    let output = session.execute(command).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(OperationError::CommandFailed {
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Upload each router's generated configuration and apply it.
pub struct ConfigureOperation {
    target: RemoteTarget,
    configs: Arc<BTreeMap<RouterId, String>>,
    config_path: String,
    apply: CommandTemplate,
}

impl ConfigureOperation {
    /// `apply` is rendered with `config_path` as `{0}`.
    pub fn new(
        target: RemoteTarget,
        configs: Arc<BTreeMap<RouterId, String>>,
        config_path: impl Into<String>,
        apply: CommandTemplate,
    ) -> Self {
        Self {
            target,
            configs,
            config_path: config_path.into(),
            apply,
        }
    }

    async fn apply_config(&self, session: &dyn Session, config: &str) -> Result<(), OperationError> {
        session.upload(&self.config_path, config.as_bytes()).await?;
        let command = self.apply.render(&[self.config_path.as_str()])?;
        run_checked(session, &command).await?;
        Ok(())
    }
}

#[async_trait]
impl FleetOperation for ConfigureOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Configure
    }

    async fn execute(&self, router: &RouterRecord) -> Result<(), OperationError> {
        let config = self
            .configs
            .get(&router.id)
            .ok_or(OperationError::MissingConfig(router.id))?;
        let session = self.target.open(router).await?;
        let outcome = self.apply_config(session.as_ref(), config).await;
        RemoteTarget::finish(session, outcome).await
    }
}

/// Upload the injector and the shared route payload, then run the injector.
pub struct InjectOperation {
    target: RemoteTarget,
    payload: Arc<Vec<u8>>,
    payload_path: String,
    script_path: String,
    command: CommandTemplate,
}

impl InjectOperation {
    /// Inject `payload` (a JSON route batch) on every router.
    pub fn new(
        target: RemoteTarget,
        payload: Arc<Vec<u8>>,
        payload_path: impl Into<String>,
        script_path: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            target,
            payload,
            payload_path: payload_path.into(),
            script_path: script_path.into(),
            command: CommandTemplate::parse(INJECT_COMMAND)?,
        })
    }

    async fn inject(&self, session: &dyn Session, router: &RouterRecord) -> Result<(), OperationError> {
        session
            .upload(&self.script_path, INJECTOR_SCRIPT.as_bytes())
            .await?;
        session.upload(&self.payload_path, &self.payload).await?;
        let command = self.command.render(&[
            self.script_path.clone(),
            self.payload_path.clone(),
            router.asn.to_string(),
        ])?;
        let output = run_checked(session, &command).await?;
        tracing::debug!(router_id = router.id, output = %output.stdout.trim(), "routes injected");
        Ok(())
    }
}

#[async_trait]
impl FleetOperation for InjectOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Inject
    }

    async fn execute(&self, router: &RouterRecord) -> Result<(), OperationError> {
        let session = self.target.open(router).await?;
        let outcome = self.inject(session.as_ref(), router).await;
        RemoteTarget::finish(session, outcome).await
    }
}
