//! Infrastructure provisioning collaborator.
//!
//! The pipeline only needs three things from the provisioning tool: create the
//! fleet, destroy it, and report the per-router addresses it created.

mod mock;
mod terraform;

pub use mock::MockProvisioner;
pub use terraform::TerraformProvisioner;

use async_trait::async_trait;
use bgpmesh_core::ProvisionOutputs;
use bgpmesh_types::DiscoveryError;
use serde_json::Value;
use thiserror::Error;

/// Output holding the per-router public addresses.
pub const PUBLIC_IPS_OUTPUT: &str = "router_public_ips";
/// Output holding the per-router private addresses.
pub const PRIVATE_IPS_OUTPUT: &str = "router_private_ips";
/// Optional output holding provider instance handles.
pub const INSTANCE_IDS_OUTPUT: &str = "router_instance_ids";

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The provisioning tool could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Command line that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The provisioning tool exited non-zero.
    #[error("{command} exited with {exit_code}: {stderr}")]
    CommandFailed {
        /// Command line that ran.
        command: String,
        /// Exit code (-1 = killed by signal).
        exit_code: i32,
        /// Trailing standard error.
        stderr: String,
    },

    /// Outputs could not be read as a router inventory.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Creates and destroys the router fleet.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create (or converge) the fleet.
    async fn apply(&self) -> Result<(), ProvisionError>;

    /// Destroy the fleet.
    async fn destroy(&self) -> Result<(), ProvisionError>;

    /// Read the per-router address lists of the current fleet.
    async fn read_outputs(&self) -> Result<ProvisionOutputs, ProvisionError>;
}

/// Parse the JSON document printed by `terraform output -json`.
///
/// Each output is an object whose `value` holds the list. The address outputs
/// are required; the instance-id output may be absent, in which case no handles
/// are reported. Length agreement is checked when the inventory is populated.
pub fn parse_outputs(json: &[u8]) -> Result<ProvisionOutputs, DiscoveryError> {
    let doc: Value =
        serde_json::from_slice(json).map_err(|e| DiscoveryError::InvalidOutput(e.to_string()))?;
    let Value::Object(outputs) = doc else {
        return Err(DiscoveryError::InvalidOutput(
            "expected a JSON object of outputs".into(),
        ));
    };

    let list = |name: &str| -> Result<Option<Vec<String>>, DiscoveryError> {
        let Some(output) = outputs.get(name) else {
            return Ok(None);
        };
        let value = output
            .get("value")
            .ok_or_else(|| DiscoveryError::MissingOutput(format!("{name}.value")))?;
        let items = value
            .as_array()
            .ok_or_else(|| DiscoveryError::InvalidOutput(format!("{name}.value is not a list")))?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DiscoveryError::InvalidOutput(format!("{name}.value contains {item}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    };

    let required = |name: &str| -> Result<Vec<String>, DiscoveryError> {
        list(name)?.ok_or_else(|| DiscoveryError::MissingOutput(name.to_string()))
    };

    Ok(ProvisionOutputs {
        public_addresses: required(PUBLIC_IPS_OUTPUT)?,
        private_addresses: required(PRIVATE_IPS_OUTPUT)?,
        instance_ids: list(INSTANCE_IDS_OUTPUT)?.unwrap_or_default(),
    })
}
