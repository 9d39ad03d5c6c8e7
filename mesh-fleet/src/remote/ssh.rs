//! OpenSSH-backed remote execution.
//!
//! Uses `tokio::process::Command` to shell out to `ssh`. Each session starts
//! its own control-master connection on a private socket; uploads and commands
//! are multiplexed over that socket and `close()` tells the master to exit.
//! SSH keys must be provisioned on the routers ahead of time.

use async_trait::async_trait;
use bgpmesh_core::shell_quote;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Credentials, ExecOutput, Remote, RemoteError, Session};

/// Opens sessions with the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshRemote {
    program: String,
    command_timeout: Duration,
}

impl SshRemote {
    /// Create a remote whose uploads and commands are bounded by `command_timeout`.
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            program: "ssh".into(),
            command_timeout,
        }
    }

    /// Use a different ssh executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Remote for SshRemote {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, RemoteError> {
        let control_dir = tempfile::Builder::new().prefix("bgp-mesh-ssh-").tempdir()?;
        let socket = control_dir.path().join("control");
        let destination = format!("{}@{}", credentials.user, address);

        let mut cmd = Command::new(&self.program);
        cmd.args(["-M", "-N", "-f"])
            .args(["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=no"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", timeout.as_secs().max(1)))
            .arg("-i")
            .arg(&credentials.key_path)
            .arg("-S")
            .arg(&socket)
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(timeout, cmd.status())
            .await
            .map_err(|_| RemoteError::Timeout {
                address: address.to_string(),
                operation: "connect",
                timeout,
            })??;

        if !status.success() {
            return Err(RemoteError::Connect {
                address: address.to_string(),
                reason: format!("ssh master exited with {status}"),
            });
        }

        tracing::debug!(address, "ssh session opened");
        Ok(Box::new(SshSession {
            address: address.to_string(),
            destination,
            program: self.program.clone(),
            socket,
            command_timeout: self.command_timeout,
            control_dir: Mutex::new(Some(control_dir)),
        }))
    }
}

struct SshSession {
    address: String,
    destination: String,
    program: String,
    socket: PathBuf,
    command_timeout: Duration,
    /// `None` once closed. Dropping the directory removes the socket.
    control_dir: Mutex<Option<TempDir>>,
}

impl SshSession {
    fn is_open(&self) -> bool {
        self.control_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// An `ssh` invocation that rides the control socket.
    fn client(&self) -> Result<Command, RemoteError> {
        if !self.is_open() {
            return Err(RemoteError::Closed(self.address.clone()));
        }
        let mut cmd = Command::new(&self.program);
        cmd.arg("-S")
            .arg(&self.socket)
            .args(["-o", "BatchMode=yes"])
            .arg(&self.destination)
            .arg("--")
            .kill_on_drop(true);
        Ok(cmd)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T, RemoteError> {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| RemoteError::Timeout {
                address: self.address.clone(),
                operation,
                timeout: self.command_timeout,
            })?
            .map_err(RemoteError::from)
    }
}

#[async_trait]
impl Session for SshSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError> {
        let mut cmd = self.client()?;
        cmd.arg(format!("cat > {}", shell_quote(path)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = self
            .bounded("upload", async {
                let mut child = cmd.spawn()?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(content).await?;
                    stdin.shutdown().await?;
                }
                child.wait_with_output().await
            })
            .await?;

        if !output.status.success() {
            return Err(RemoteError::Upload {
                address: self.address.clone(),
                path: path.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<ExecOutput, RemoteError> {
        let mut cmd = self.client()?;
        cmd.arg(command).stdin(Stdio::null());

        let output = self.bounded("execute", cmd.output()).await?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn close(&self) -> Result<(), RemoteError> {
        let taken = self
            .control_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(dir) = taken else {
            return Ok(());
        };

        let mut cmd = Command::new(&self.program);
        cmd.arg("-S")
            .arg(&self.socket)
            .args(["-O", "exit"])
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // A master that already died leaves nothing to stop; only spawn and
        // timeout failures are reported.
        let result = self.bounded("close", cmd.status()).await.map(|_| ());
        drop(dir);
        tracing::debug!(address = %self.address, "ssh session closed");
        result
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = std::process::Command::new(&self.program)
                .arg("-S")
                .arg(&self.socket)
                .args(["-O", "exit"])
                .arg(&self.destination)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            user: "ubuntu".into(),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let remote = SshRemote::new(Duration::from_secs(1)).with_program("bgp-mesh-no-such-ssh");
        let err = remote
            .connect("192.0.2.1", &credentials(), Duration::from_secs(1))
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, RemoteError::Spawn(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn failing_program_is_a_connect_error() {
        // `false` exits 1 for any arguments.
        let remote = SshRemote::new(Duration::from_secs(1)).with_program("false");
        let err = remote
            .connect("192.0.2.1", &credentials(), Duration::from_secs(5))
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, RemoteError::Connect { .. }), "got {err:?}");
    }

    #[tokio::test]
    #[ignore = "requires a reachable SSH host"]
    async fn round_trip_against_localhost() {
        let user = std::env::var("USER").unwrap_or_else(|_| "root".into());
        let key = std::env::var("BGP_MESH_TEST_KEY").unwrap_or_else(|_| "~/.ssh/id_ed25519".into());
        let creds = Credentials {
            user,
            key_path: PathBuf::from(key),
        };
        let remote = SshRemote::new(Duration::from_secs(10));
        let session = remote
            .connect("127.0.0.1", &creds, Duration::from_secs(10))
            .await
            .expect("connect");

        let path = format!("/tmp/bgp-mesh-upload-{}", std::process::id());
        session.upload(&path, b"hello mesh").await.expect("upload");
        let out = session.execute(&format!("cat {path} && rm -f {path}")).await.expect("exec");
        assert_eq!(out.stdout, "hello mesh");

        session.close().await.expect("close");
        assert!(matches!(session.execute("true").await, Err(RemoteError::Closed(_))));
    }
}
