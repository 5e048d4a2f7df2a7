//! Interactive provisioning session.
//!
//! Drives the out-of-band pairing exchange that captures new network
//! credentials. The session owns the calling thread: it polls the pairing
//! channel cooperatively at a fixed cadence, notifying an external
//! indicator at each poll so the device never appears hung. Once the
//! exchange completes it waits for the link, reads the negotiated
//! credentials back from the radio's active configuration and commits them
//! to the durable store. The caller is expected to restart the device
//! afterwards; the radio stack does not guarantee its configuration is
//! hot-swappable within the same process image.

use std::fmt;
use std::time::Duration;

use log::{info, warn};

use crate::platform::{CredentialStore, LinkStatus, Radio, RadioError, Sleeper, StoreError};

use super::credentials::{Credentials, CredentialsError};

/// Emit a liveness log line every this many pairing polls.
const LIVENESS_LINE_EVERY: u32 = 40;

/// Pairing loop cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingPolicy {
    /// Delay between pairing-completion polls.
    pub poll_interval: Duration,
    /// Delay between link polls once pairing has completed.
    pub link_wait_interval: Duration,
    /// Optional pairing poll budget. `None` polls indefinitely; a bound
    /// yields [`ProvisioningOutcome::TimedOut`] when exhausted.
    pub max_polls: Option<u32>,
}

impl Default for PairingPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(600),
            link_wait_interval: Duration::from_millis(500),
            max_polls: None,
        }
    }
}

/// Result of one provisioning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// New credentials were captured and committed to the store.
    Captured(Credentials),
    /// The pairing poll budget ran out before the exchange completed.
    TimedOut,
}

/// Progress notifications for an external indicator (LED, display).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Still waiting for the pairing exchange; fired once per poll.
    PairingWait { polls: u32 },
    /// The pairing exchange completed; waiting for the link to come up.
    LinkWait,
    /// Captured credentials were committed to the store.
    CredentialsCommitted,
}

/// Errors that abort a provisioning session.
#[derive(Debug)]
pub enum SessionError {
    Radio(RadioError),
    Store(StoreError),
    /// Pairing reported success but the radio's active configuration holds
    /// no SSID.
    EmptyActiveConfig,
    /// Captured credentials failed bounds checks.
    Invalid(CredentialsError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "provisioning radio error: {}", e),
            Self::Store(e) => write!(f, "provisioning store error: {}", e),
            Self::EmptyActiveConfig => {
                write!(f, "pairing completed but active config holds no SSID")
            }
            Self::Invalid(e) => write!(f, "captured credentials rejected: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Radio(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Invalid(e) => Some(e),
            Self::EmptyActiveConfig => None,
        }
    }
}

impl From<RadioError> for SessionError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<CredentialsError> for SessionError {
    fn from(e: CredentialsError) -> Self {
        Self::Invalid(e)
    }
}

/// Run one provisioning session to completion.
///
/// Blocking and cooperative: every poll iteration is a suspension point
/// where the sleeper yields to platform housekeeping. `on_event` is the
/// external progress indicator and is called on every poll.
///
/// The captured credentials are read from the radio's active connection
/// configuration rather than the pairing payload, so an encoding mismatch
/// in the pairing transport cannot commit credentials the radio did not
/// actually join with.
pub fn run_provisioning<R, S, T, F>(
    radio: &mut R,
    store: &mut S,
    sleeper: &mut T,
    policy: &PairingPolicy,
    mut on_event: F,
) -> Result<ProvisioningOutcome, SessionError>
where
    R: Radio,
    S: CredentialStore,
    T: Sleeper,
    F: FnMut(SessionEvent),
{
    radio.enter_station_mode()?;
    info!("entering pairing mode");
    radio.begin_pairing()?;

    let mut polls: u32 = 0;
    while !radio.pairing_done()? {
        if let Some(max) = policy.max_polls {
            if polls >= max {
                warn!("pairing budget exhausted after {} polls", polls);
                return Ok(ProvisioningOutcome::TimedOut);
            }
        }
        polls += 1;
        on_event(SessionEvent::PairingWait { polls });
        if polls % LIVENESS_LINE_EVERY == 0 {
            info!("still waiting for pairing ({} polls)", polls);
        }
        sleeper.sleep(policy.poll_interval);
    }

    info!("pairing exchange complete, waiting for link");
    while radio.link_status() != LinkStatus::Connected {
        on_event(SessionEvent::LinkWait);
        sleeper.sleep(policy.link_wait_interval);
    }

    let captured = radio.active_config()?;
    if captured.ssid.is_empty() {
        return Err(SessionError::EmptyActiveConfig);
    }
    captured.validate()?;

    store.save(&captured)?;
    info!("credentials for '{}' committed", captured.ssid);
    on_event(SessionEvent::CredentialsCommitted);
    Ok(ProvisioningOutcome::Captured(captured))
}
