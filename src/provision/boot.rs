//! Boot-time provisioning orchestration.
//!
//! [`ProvisioningContext`] owns the platform collaborators for the lifetime
//! of one boot: it is built from fresh handles at startup and torn down by
//! the restart that ends every provisioning path. All credential state
//! flows through it explicitly; there are no module-level globals.

use std::fmt;

use log::{debug, info, warn};

use crate::platform::{CredentialStore, Radio, RadioError, Sleeper, StoreError, SystemControl};

use super::reconcile::needs_provisioning;
use super::session::{run_provisioning, PairingPolicy, ProvisioningOutcome, SessionError};
use super::supervisor::{supervise_connect, ConnectOutcome, RetryPolicy};

/// How one boot run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Connected with stored credentials; the device is operational.
    Online,
    /// A restart was requested through [`SystemControl`]. On hardware the
    /// restart does not return and this value is never observed.
    RestartRequested,
}

/// Errors that abort the boot sequence.
#[derive(Debug)]
pub enum BootError {
    Store(StoreError),
    Radio(RadioError),
    Session(SessionError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "boot store error: {}", e),
            Self::Radio(e) => write!(f, "boot radio error: {}", e),
            Self::Session(e) => write!(f, "boot provisioning error: {}", e),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Radio(e) => Some(e),
            Self::Session(e) => Some(e),
        }
    }
}

impl From<StoreError> for BootError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RadioError> for BootError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<SessionError> for BootError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

/// Owns the platform collaborators and runs the boot decision.
pub struct ProvisioningContext<R, S, T, C> {
    radio: R,
    store: S,
    sleeper: T,
    system: C,
    pairing: PairingPolicy,
    retry: RetryPolicy,
}

impl<R, S, T, C> ProvisioningContext<R, S, T, C>
where
    R: Radio,
    S: CredentialStore,
    T: Sleeper,
    C: SystemControl,
{
    /// Build a context with default pairing and retry policies.
    pub fn new(radio: R, store: S, sleeper: T, system: C) -> Self {
        Self::with_policies(
            radio,
            store,
            sleeper,
            system,
            PairingPolicy::default(),
            RetryPolicy::default(),
        )
    }

    /// Build a context with explicit policies.
    pub fn with_policies(
        radio: R,
        store: S,
        sleeper: T,
        system: C,
        pairing: PairingPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            radio,
            store,
            sleeper,
            system,
            pairing,
            retry,
        }
    }

    /// Run the boot sequence.
    ///
    /// Reconciles the stored record against the radio's live configuration,
    /// provisions when the store was never written, then supervises the
    /// join. Join-budget exhaustion falls back to provisioning exactly
    /// once; every provisioning path ends in a restart.
    pub fn run(&mut self) -> Result<BootOutcome, BootError> {
        self.radio.enter_station_mode()?;
        let stored = self.store.load()?;
        let live = self.radio.active_config()?;

        if needs_provisioning(&live, &stored) {
            info!("live radio config does not match stored credentials");
            if stored.is_unset() {
                info!("no stored credentials, starting provisioning");
                return self.provision_and_restart();
            }
            // The store has been written before: trust it over whatever the
            // radio holds and let the supervisor try it.
            debug!("stored credentials exist, attempting join with them");
        } else {
            debug!("stored credentials match live radio config");
        }

        match supervise_connect(
            &mut self.radio,
            &stored,
            &mut self.sleeper,
            &self.retry,
            |_| {},
        )? {
            ConnectOutcome::Connected => {
                info!("online with stored credentials for '{}'", stored.ssid);
                Ok(BootOutcome::Online)
            }
            ConnectOutcome::RetriesExhausted => {
                warn!(
                    "could not join '{}', falling back to provisioning",
                    stored.ssid
                );
                self.provision_and_restart()
            }
        }
    }

    fn provision_and_restart(&mut self) -> Result<BootOutcome, BootError> {
        let outcome = run_provisioning(
            &mut self.radio,
            &mut self.store,
            &mut self.sleeper,
            &self.pairing,
            |_| {},
        )?;
        match outcome {
            ProvisioningOutcome::Captured(credentials) => {
                info!("provisioned '{}', restarting", credentials.ssid);
            }
            ProvisioningOutcome::TimedOut => {
                warn!("provisioning timed out, restarting for a fresh attempt");
            }
        }
        self.system.restart();
        Ok(BootOutcome::RestartRequested)
    }

    /// Tear the context apart after a successful boot, handing the radio
    /// and store back to the caller.
    pub fn into_parts(self) -> (R, S) {
        (self.radio, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::credentials::Credentials;
    use crate::provision::host::{InstantSleeper, MemoryCredentialStore, RecordingSystem, ScriptedRadio};

    fn small_retry() -> RetryPolicy {
        RetryPolicy {
            max_polls: 4,
            ..RetryPolicy::default()
        }
    }

    fn context(
        radio: ScriptedRadio,
        store: MemoryCredentialStore,
    ) -> ProvisioningContext<ScriptedRadio, MemoryCredentialStore, InstantSleeper, RecordingSystem>
    {
        ProvisioningContext::with_policies(
            radio,
            store,
            InstantSleeper::default(),
            RecordingSystem::default(),
            PairingPolicy::default(),
            small_retry(),
        )
    }

    #[test]
    fn test_matching_credentials_go_straight_to_supervisor() {
        let creds = Credentials::snapshot("HomeNet", "secret1");
        let radio = ScriptedRadio::new(creds.clone()).connects_after(1);
        let store = MemoryCredentialStore::with_credentials(creds.clone());
        let mut context = context(radio, store);

        let outcome = context.run().unwrap();

        assert_eq!(outcome, BootOutcome::Online);
        let (radio, _) = context.into_parts();
        assert_eq!(radio.pairing_begun, 0);
        assert_eq!(radio.connect_requests, vec![creds]);
    }

    #[test]
    fn test_first_boot_provisions_and_restarts() {
        let captured = Credentials::snapshot("HomeNet", "secret1");
        let radio = ScriptedRadio::new(Credentials::snapshot("FactoryAP", ""))
            .pairs_after(2, captured.clone())
            .connects_after(0);
        let store = MemoryCredentialStore::new();
        let mut context = context(radio, store);

        let outcome = context.run().unwrap();

        assert_eq!(outcome, BootOutcome::RestartRequested);
        assert_eq!(context.system.restarts, 1);
        let (radio, store) = context.into_parts();
        assert_eq!(radio.pairing_begun, 1);
        // No join attempt with the unset record.
        assert!(radio.connect_requests.is_empty());
        assert_eq!(store.stored(), &captured);
    }

    #[test]
    fn test_mismatch_with_existing_store_skips_provisioning() {
        let stored = Credentials::snapshot("HomeNet", "secret1");
        let radio =
            ScriptedRadio::new(Credentials::snapshot("HomeNet", "old-secret")).connects_after(2);
        let store = MemoryCredentialStore::with_credentials(stored.clone());
        let mut context = context(radio, store);

        let outcome = context.run().unwrap();

        assert_eq!(outcome, BootOutcome::Online);
        let (radio, _) = context.into_parts();
        assert_eq!(radio.pairing_begun, 0);
        assert_eq!(radio.connect_requests, vec![stored]);
    }

    #[test]
    fn test_retry_exhaustion_falls_back_to_provisioning_once() {
        let stored = Credentials::snapshot("HomeNet", "secret1");
        let captured = Credentials::snapshot("NewNet", "secret2");
        // Never connects; pairing succeeds immediately, then the link comes
        // up during the session's link wait.
        let radio = ScriptedRadio::new(stored.clone())
            .pairs_after(0, captured.clone())
            .link_up_after_pairing();
        let store = MemoryCredentialStore::with_credentials(stored);
        let mut context = context(radio, store);

        let outcome = context.run().unwrap();

        assert_eq!(outcome, BootOutcome::RestartRequested);
        assert_eq!(context.system.restarts, 1);
        let (radio, store) = context.into_parts();
        assert_eq!(radio.pairing_begun, 1);
        assert_eq!(store.stored(), &captured);
    }

    #[test]
    fn test_provisioning_timeout_still_restarts() {
        let radio = ScriptedRadio::new(Credentials::snapshot("", ""));
        let store = MemoryCredentialStore::new();
        let mut context = ProvisioningContext::with_policies(
            radio,
            store,
            InstantSleeper::default(),
            RecordingSystem::default(),
            PairingPolicy {
                max_polls: Some(3),
                ..PairingPolicy::default()
            },
            small_retry(),
        );

        let outcome = context.run().unwrap();

        assert_eq!(outcome, BootOutcome::RestartRequested);
        assert_eq!(context.system.restarts, 1);
        let (_, store) = context.into_parts();
        assert!(store.stored().is_unset());
    }
}
