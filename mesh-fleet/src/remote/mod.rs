//! Remote execution abstraction for bgp-mesh.
//!
//! Every remote operation opens its own short-lived [`Session`], uses it, and
//! closes it. There is no pooling and no reuse across operations.
//!
//! # Design
//!
//! - `Remote::connect()` opens a session to one router, bounded by a timeout
//! - `Session::upload()` writes a file on the router
//! - `Session::execute()` runs a shell command and reports its exit code
//! - `Session::close()` releases the connection
//!
//! # Example
//!
//! ```ignore
//! let remote = MockRemote::new();
//! let session = remote.connect("54.0.0.1", &credentials, Duration::from_secs(10)).await?;
//! session.upload("/tmp/frr.conf", config.as_bytes()).await?;
//! let out = session.execute("sudo systemctl restart frr").await?;
//! session.close().await?;
//! ```

mod mock;
mod ssh;

pub use mock::MockRemote;
pub use ssh::SshRemote;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Remote execution errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection could not be established.
    #[error("connect to {address} failed: {reason}")]
    Connect {
        /// Target address.
        address: String,
        /// What went wrong.
        reason: String,
    },

    /// An operation exceeded its time bound.
    #[error("{operation} on {address} timed out after {timeout:?}")]
    Timeout {
        /// Target address.
        address: String,
        /// Operation that timed out.
        operation: &'static str,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// Local process could not be spawned or driven.
    #[error("ssh spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    /// File upload failed.
    #[error("upload to {address}:{path} failed: {reason}")]
    Upload {
        /// Target address.
        address: String,
        /// Remote path.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The session was already closed.
    #[error("session to {0} is closed")]
    Closed(String),
}

/// Login material for remote sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login user.
    pub user: String,
    /// Private key file.
    pub key_path: PathBuf,
}

/// Result of executing a command on a router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (0 = success, -1 = killed by signal).
    pub exit_code: i32,
}

impl ExecOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opens sessions to routers.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Open a session to `address`, failing if it takes longer than `timeout`.
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, RemoteError>;
}

/// One open connection to a router.
///
/// Calls after [`Session::close`] fail with [`RemoteError::Closed`].
#[async_trait]
pub trait Session: Send + Sync {
    /// Address this session is connected to.
    fn address(&self) -> &str;

    /// Write `content` to `path` on the router, replacing any existing file.
    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError>;

    /// Run a shell command. A non-zero exit is reported in the output, not as an error.
    async fn execute(&self, command: &str) -> Result<ExecOutput, RemoteError>;

    /// Release the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_output_success() {
        let ok = ExecOutput::default();
        assert!(ok.success());
        let failed = ExecOutput {
            exit_code: 3,
            ..Default::default()
        };
        assert!(!failed.success());
    }

    #[test]
    fn timeout_display() {
        let err = RemoteError::Timeout {
            address: "54.0.0.1".into(),
            operation: "connect",
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "connect on 54.0.0.1 timed out after 10s");
    }
}
