//! Health monitor
//!
//! `reachable = network_up && credential_present && !failover_latched`,
//! recomputed on every read. A probe that errors counts as a failed check.

use crate::error::ProbeError;
use crate::latch::FailoverLatch;
use std::sync::Arc;
use tokio::sync::watch;

/// Reports whether the network path to the remote service is up
#[cfg_attr(test, mockall::automock)]
pub trait NetworkProbe: Send + Sync {
    /// Current reachability
    ///
    /// # Errors
    /// Returns a [`ProbeError`] when reachability cannot be determined.
    fn network_up(&self) -> Result<bool, ProbeError>;
}

/// Supplies the credential used for remote calls
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// The current credential, if one is configured
    ///
    /// # Errors
    /// Returns a [`ProbeError`] when the credential store cannot be read.
    fn credential(&self) -> Result<Option<String>, ProbeError>;
}

/// Reads the credential from an environment variable
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    /// Read from `var`
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self) -> Result<Option<String>, ProbeError> {
        match std::env::var(&self.var) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ProbeError::Failed(format!("{}: {e}", self.var))),
        }
    }
}

/// Snapshot of every input to the reachability signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSignal {
    /// Derived reachability
    pub reachable: bool,
    /// Network probe reported up
    pub network_up: bool,
    /// A non-blank credential is available
    pub credential_present: bool,
    /// Failover latch is set
    pub failover_latched: bool,
}

/// Derives the session's reachability signal
#[derive(Clone)]
pub struct HealthMonitor {
    network: Arc<dyn NetworkProbe>,
    credentials: Arc<dyn CredentialProvider>,
    latch: Arc<FailoverLatch>,
}

impl HealthMonitor {
    /// Create a monitor over the given probes and latch
    #[must_use]
    pub fn new(
        network: Arc<dyn NetworkProbe>,
        credentials: Arc<dyn CredentialProvider>,
        latch: Arc<FailoverLatch>,
    ) -> Self {
        Self {
            network,
            credentials,
            latch,
        }
    }

    /// Whether remote stages should be attempted
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.signal().reachable
    }

    /// Evaluate every input
    #[must_use]
    pub fn signal(&self) -> HealthSignal {
        let network_up = match self.network.network_up() {
            Ok(up) => up,
            Err(e) => {
                tracing::debug!(error = %e, "network probe failed");
                false
            }
        };
        let credential_present = self.credential().is_some();
        let failover_latched = self.latch.is_latched();

        HealthSignal {
            reachable: network_up && credential_present && !failover_latched,
            network_up,
            credential_present,
            failover_latched,
        }
    }

    /// The current non-blank credential, if any
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        match self.credentials.credential() {
            Ok(credential) => credential.filter(|c| !c.trim().is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "credential provider failed");
                None
            }
        }
    }

    /// The session latch
    #[inline]
    #[must_use]
    pub fn latch(&self) -> &Arc<FailoverLatch> {
        &self.latch
    }

    /// Observe latch trips and resets
    #[must_use]
    pub fn subscribe_failover(&self) -> watch::Receiver<bool> {
        self.latch.subscribe()
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("latch", &self.latch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(up: Result<bool, ProbeError>) -> Arc<dyn NetworkProbe> {
        let mut probe = MockNetworkProbe::new();
        probe.expect_network_up().returning(move || up.clone());
        Arc::new(probe)
    }

    fn credentials(value: Result<Option<String>, ProbeError>) -> Arc<dyn CredentialProvider> {
        let mut provider = MockCredentialProvider::new();
        provider.expect_credential().returning(move || value.clone());
        Arc::new(provider)
    }

    fn monitor(
        up: Result<bool, ProbeError>,
        key: Result<Option<String>, ProbeError>,
    ) -> HealthMonitor {
        HealthMonitor::new(network(up), credentials(key), Arc::new(FailoverLatch::new()))
    }

    #[test]
    fn reachable_when_all_checks_pass() {
        let m = monitor(Ok(true), Ok(Some("key".into())));
        assert!(m.is_reachable());
    }

    #[test]
    fn unreachable_without_network() {
        assert!(!monitor(Ok(false), Ok(Some("key".into()))).is_reachable());
    }

    #[test]
    fn unreachable_without_credential() {
        assert!(!monitor(Ok(true), Ok(None)).is_reachable());
        assert!(!monitor(Ok(true), Ok(Some("   ".into()))).is_reachable());
    }

    #[test]
    fn failing_probes_count_as_unreachable() {
        let failed = || ProbeError::Failed("boom".into());
        assert!(!monitor(Err(failed()), Ok(Some("key".into()))).is_reachable());
        assert!(!monitor(Ok(true), Err(failed())).is_reachable());
    }

    #[test]
    fn latch_overrides_healthy_probes_until_reset() {
        let m = monitor(Ok(true), Ok(Some("key".into())));
        m.latch().trip();
        let signal = m.signal();
        assert!(!signal.reachable);
        assert!(signal.network_up && signal.credential_present && signal.failover_latched);

        m.latch().reset();
        assert!(m.is_reachable());
    }

    #[test]
    fn reset_restores_network_and_credential_view() {
        let m = monitor(Ok(false), Ok(Some("key".into())));
        m.latch().trip();
        m.latch().reset();
        assert!(!m.is_reachable(), "reset must not override the network probe");
    }

    #[test]
    fn env_credential_provider_reads_variable() {
        let provider = EnvCredentialProvider::new("GALLEY_TEST_CREDENTIAL_THAT_IS_NOT_SET");
        assert_eq!(provider.credential(), Ok(None));
    }
}
