//! Mock provisioner for testing.

use super::{ProvisionError, Provisioner};
use async_trait::async_trait;
use bgpmesh_core::ProvisionOutputs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock provisioner returning canned outputs.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockProvisioner {
    inner: Arc<Mutex<MockProvisionerInner>>,
}

#[derive(Debug, Default)]
struct MockProvisionerInner {
    outputs: ProvisionOutputs,
    fail_apply: Option<String>,
    fail_destroy: Option<String>,
    apply_calls: usize,
    destroy_calls: usize,
    read_calls: usize,
}

impl MockProvisioner {
    /// Create a provisioner that reports an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provisioner reporting `n` routers at 54.0.0.{i}/10.0.1.{10+i}.
    pub fn with_fleet(n: usize) -> Self {
        let mock = Self::new();
        mock.set_outputs(ProvisionOutputs {
            public_addresses: (1..=n).map(|i| format!("54.0.0.{i}")).collect(),
            private_addresses: (1..=n).map(|i| format!("10.0.1.{}", 10 + i)).collect(),
            instance_ids: (1..=n).map(|i| format!("i-{i:04}")).collect(),
        });
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockProvisionerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the outputs returned by `read_outputs()`.
    pub fn set_outputs(&self, outputs: ProvisionOutputs) {
        self.lock().outputs = outputs;
    }

    /// Make every `apply()` fail.
    pub fn fail_apply(&self, message: &str) {
        self.lock().fail_apply = Some(message.to_string());
    }

    /// Make every `destroy()` fail.
    pub fn fail_destroy(&self, message: &str) {
        self.lock().fail_destroy = Some(message.to_string());
    }

    /// Number of `apply()` calls.
    pub fn apply_calls(&self) -> usize {
        self.lock().apply_calls
    }

    /// Number of `destroy()` calls.
    pub fn destroy_calls(&self) -> usize {
        self.lock().destroy_calls
    }

    /// Number of `read_outputs()` calls.
    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }
}

fn failed(command: &str, message: &str) -> ProvisionError {
    ProvisionError::CommandFailed {
        command: command.to_string(),
        exit_code: 1,
        stderr: message.to_string(),
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn apply(&self) -> Result<(), ProvisionError> {
        let mut inner = self.lock();
        inner.apply_calls += 1;
        match &inner.fail_apply {
            Some(message) => Err(failed("mock apply", message)),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> Result<(), ProvisionError> {
        let mut inner = self.lock();
        inner.destroy_calls += 1;
        match &inner.fail_destroy {
            Some(message) => Err(failed("mock destroy", message)),
            None => Ok(()),
        }
    }

    async fn read_outputs(&self) -> Result<ProvisionOutputs, ProvisionError> {
        let mut inner = self.lock();
        inner.read_calls += 1;
        Ok(inner.outputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_and_returns_outputs() {
        let mock = MockProvisioner::with_fleet(3);
        mock.apply().await.unwrap();
        let outputs = mock.read_outputs().await.unwrap();
        assert_eq!(outputs.public_addresses.len(), 3);
        assert_eq!(outputs.private_addresses[0], "10.0.1.11");
        assert_eq!(mock.apply_calls(), 1);
        assert_eq!(mock.read_calls(), 1);
        assert_eq!(mock.destroy_calls(), 0);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let mock = MockProvisioner::new();
        mock.fail_apply("quota exceeded");
        assert!(matches!(
            mock.apply().await,
            Err(ProvisionError::CommandFailed { .. })
        ));
        mock.fail_destroy("locked state");
        assert!(mock.destroy().await.is_err());
        assert_eq!(mock.destroy_calls(), 1);
    }
}
