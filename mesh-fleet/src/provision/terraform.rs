//! Terraform-backed provisioner.
//!
//! Runs the `terraform` CLI in the configured working directory.

use async_trait::async_trait;
use bgpmesh_core::ProvisionOutputs;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;

use super::{parse_outputs, ProvisionError, Provisioner};

/// Keep this much of stderr in error messages.
const STDERR_TAIL: usize = 2048;

/// Drives `terraform init/apply/destroy/output`.
#[derive(Debug, Clone)]
pub struct TerraformProvisioner {
    binary: String,
    working_dir: PathBuf,
}

impl TerraformProvisioner {
    /// Create a provisioner running `binary` inside `working_dir`.
    pub fn new(binary: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, ProvisionError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::info!(command = %command, dir = %self.working_dir.display(), "running provisioning tool");

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProvisionError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn apply(&self) -> Result<(), ProvisionError> {
        self.run(&["init", "-input=false"]).await?;
        self.run(&["apply", "-auto-approve", "-input=false"]).await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ProvisionError> {
        self.run(&["destroy", "-auto-approve", "-input=false"]).await?;
        Ok(())
    }

    async fn read_outputs(&self) -> Result<ProvisionOutputs, ProvisionError> {
        let output = self.run(&["output", "-json"]).await?;
        Ok(parse_outputs(&output.stdout)?)
    }
}

fn tail(text: &str, max: usize) -> String {
    let text = text.trim_end();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
