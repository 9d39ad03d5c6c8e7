//! Mock remote for testing.
//!
//! Scripts per-address behavior (unreachable hosts, failing commands, canned
//! output) and records every connect, upload, and command for verification.

use super::{Credentials, ExecOutput, Remote, RemoteError, Session};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock remote for testing.
///
/// Clones share state, so a test can keep one handle while the pipeline owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    unreachable: HashSet<String>,
    connect_failures: HashMap<String, u32>,
    upload_failures: HashSet<String>,
    close_failures: HashSet<String>,
    rules: Vec<Rule>,
    latency: Duration,
    hosts: HashMap<String, HostRecord>,
    open_sessions: usize,
    max_open_sessions: usize,
    closed_sessions: usize,
    dropped_unclosed: usize,
}

#[derive(Debug)]
struct Rule {
    address: Option<String>,
    contains: String,
    output: ExecOutput,
}

#[derive(Debug, Default, Clone)]
struct HostRecord {
    connects: usize,
    uploads: Vec<(String, Vec<u8>)>,
    commands: Vec<String>,
}

impl MockRemote {
    /// Create a mock where every host is reachable and every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        lock(&self.inner)
    }

    /// Refuse every connection to `address`.
    pub fn set_unreachable(&self, address: &str) {
        self.lock().unreachable.insert(address.to_string());
    }

    /// Make `address` reachable again.
    pub fn set_reachable(&self, address: &str) {
        let mut inner = self.lock();
        inner.unreachable.remove(address);
        inner.connect_failures.remove(address);
    }

    /// Refuse the next `count` connections to `address`.
    pub fn fail_connects(&self, address: &str, count: u32) {
        self.lock()
            .connect_failures
            .insert(address.to_string(), count);
    }

    /// Fail every upload to `address`.
    pub fn fail_upload(&self, address: &str) {
        self.lock().upload_failures.insert(address.to_string());
    }

    /// Report an error from every `close()` on `address`. The session is still released.
    pub fn fail_close(&self, address: &str) {
        self.lock().close_failures.insert(address.to_string());
    }

    /// Commands on `address` (or on every host when `None`) containing
    /// `contains` print `stdout` and exit 0.
    pub fn respond(&self, address: Option<&str>, contains: &str, stdout: &str) {
        self.push_rule(
            address,
            contains,
            ExecOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            },
        );
    }

    /// Commands on `address` (or on every host when `None`) containing
    /// `contains` exit with `exit_code`.
    pub fn fail_command(&self, address: Option<&str>, contains: &str, exit_code: i32) {
        self.push_rule(
            address,
            contains,
            ExecOutput {
                stderr: format!("mock failure ({exit_code})"),
                exit_code,
                ..Default::default()
            },
        );
    }

    fn push_rule(&self, address: Option<&str>, contains: &str, output: ExecOutput) {
        self.lock().rules.push(Rule {
            address: address.map(str::to_string),
            contains: contains.to_string(),
            output,
        });
    }

    /// Delay applied to every connect and execute.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Number of connection attempts made to `address`.
    pub fn connect_count(&self, address: &str) -> usize {
        self.lock().hosts.get(address).map_or(0, |h| h.connects)
    }

    /// Uploads made to `address`, in order.
    pub fn uploads_for(&self, address: &str) -> Vec<(String, Vec<u8>)> {
        self.lock()
            .hosts
            .get(address)
            .map(|h| h.uploads.clone())
            .unwrap_or_default()
    }

    /// The last content uploaded to `path` on `address`.
    pub fn uploaded(&self, address: &str, path: &str) -> Option<Vec<u8>> {
        self.uploads_for(address)
            .into_iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, content)| content)
    }

    /// Commands executed on `address`, in order.
    pub fn commands_for(&self, address: &str) -> Vec<String> {
        self.lock()
            .hosts
            .get(address)
            .map(|h| h.commands.clone())
            .unwrap_or_default()
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Highest number of sessions open at the same time.
    pub fn max_open_sessions(&self) -> usize {
        self.lock().max_open_sessions
    }

    /// Sessions released through `close()`.
    pub fn closed_sessions(&self) -> usize {
        self.lock().closed_sessions
    }

    /// Sessions dropped without `close()`.
    pub fn dropped_unclosed(&self) -> usize {
        self.lock().dropped_unclosed
    }
}

fn lock(inner: &Mutex<MockRemoteInner>) -> MutexGuard<'_, MockRemoteInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Remote for MockRemote {
    async fn connect(
        &self,
        address: &str,
        _credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, RemoteError> {
        let latency = {
            let mut inner = self.lock();
            inner.hosts.entry(address.to_string()).or_default().connects += 1;
            inner.latency
        };

        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(RemoteError::Timeout {
                address: address.to_string(),
                operation: "connect",
                timeout,
            });
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.lock();
        if inner.unreachable.contains(address) {
            return Err(RemoteError::Connect {
                address: address.to_string(),
                reason: "host unreachable".into(),
            });
        }
        if let Some(remaining) = inner.connect_failures.get_mut(address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Connect {
                    address: address.to_string(),
                    reason: "connection refused".into(),
                });
            }
        }

        inner.open_sessions += 1;
        inner.max_open_sessions = inner.max_open_sessions.max(inner.open_sessions);
        Ok(Box::new(MockSession {
            address: address.to_string(),
            inner: Arc::clone(&self.inner),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockSession {
    address: String,
    inner: Arc<Mutex<MockRemoteInner>>,
    closed: AtomicBool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RemoteError::Closed(self.address.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Session for MockSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError> {
        self.ensure_open()?;
        let mut inner = lock(&self.inner);
        if inner.upload_failures.contains(&self.address) {
            return Err(RemoteError::Upload {
                address: self.address.clone(),
                path: path.to_string(),
                reason: "permission denied".into(),
            });
        }
        inner
            .hosts
            .entry(self.address.clone())
            .or_default()
            .uploads
            .push((path.to_string(), content.to_vec()));
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<ExecOutput, RemoteError> {
        self.ensure_open()?;
        let latency = lock(&self.inner).latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut inner = lock(&self.inner);
        inner
            .hosts
            .entry(self.address.clone())
            .or_default()
            .commands
            .push(command.to_string());

        // Later rules override earlier ones.
        let output = inner
            .rules
            .iter()
            .rev()
            .find(|rule| {
                rule.address.as_deref().map_or(true, |a| a == self.address)
                    && command.contains(&rule.contains)
            })
            .map(|rule| rule.output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    async fn close(&self) -> Result<(), RemoteError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let mut inner = lock(&self.inner);
            inner.open_sessions = inner.open_sessions.saturating_sub(1);
            inner.closed_sessions += 1;
            if inner.close_failures.contains(&self.address) {
                return Err(RemoteError::Connect {
                    address: self.address.clone(),
                    reason: "control socket vanished".into(),
                });
            }
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            let mut inner = lock(&self.inner);
            inner.open_sessions = inner.open_sessions.saturating_sub(1);
            inner.dropped_unclosed += 1;
        }
    }
}
