//! Host-side doubles for the platform seams.
//!
//! Deterministic in-memory stand-ins for the radio, the credential store,
//! the delay source and the restart primitive, so the boot decision logic
//! runs on the workstation: in unit tests and in the `host-sim` binary.
//! Compiled only without the `esp32` feature.

use std::time::Duration;

use crate::platform::{
    CredentialStore, LinkStatus, Radio, RadioError, Sleeper, StoreError, SystemControl,
};
use crate::provision::credentials::Credentials;

/// In-memory credential store.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    credentials: Credentials,
}

impl MemoryCredentialStore {
    /// An empty store: loads report the unset marker pair.
    pub fn new() -> Self {
        Self {
            credentials: Credentials::unset(),
        }
    }

    /// A store pre-seeded with a record.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// The current record (unset marker pair if never written).
    pub fn stored(&self) -> &Credentials {
        &self.credentials
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&mut self) -> Result<Credentials, StoreError> {
        Ok(self.credentials.clone())
    }

    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        self.credentials = credentials.clone();
        Ok(())
    }
}

/// Radio double driven by poll-count scripts.
///
/// Behavior is configured with the builder methods; every interaction is
/// counted so tests can assert on poll budgets and request counts.
#[derive(Debug)]
pub struct ScriptedRadio {
    live: Credentials,
    paired: Option<Credentials>,
    pairing_done_after: Option<u32>,
    connect_after: Option<u32>,
    link_after_pairing: bool,
    always_failed: bool,
    pairing_complete: bool,
    /// Times station mode was entered.
    pub station_mode_entered: u32,
    /// Times a pairing exchange was started.
    pub pairing_begun: u32,
    /// Pairing-completion polls observed.
    pub pairing_polls: u32,
    /// Link-state samples observed.
    pub status_polls: u32,
    /// Every join request issued, in order.
    pub connect_requests: Vec<Credentials>,
}

impl ScriptedRadio {
    /// A radio holding `live` in its saved configuration that never pairs
    /// and never connects until scripted otherwise.
    pub fn new(live: Credentials) -> Self {
        Self {
            live,
            paired: None,
            pairing_done_after: None,
            connect_after: None,
            link_after_pairing: false,
            always_failed: false,
            pairing_complete: false,
            station_mode_entered: 0,
            pairing_begun: 0,
            pairing_polls: 0,
            status_polls: 0,
            connect_requests: Vec::new(),
        }
    }

    /// Pairing completes after `polls` negative polls; once complete the
    /// active configuration reads back as `captured`.
    pub fn pairs_after(mut self, polls: u32, captured: Credentials) -> Self {
        self.pairing_done_after = Some(polls);
        self.paired = Some(captured);
        self
    }

    /// The link comes up after `polls` link-state samples.
    pub fn connects_after(mut self, polls: u32) -> Self {
        self.connect_after = Some(polls);
        self
    }

    /// The link comes up as soon as a pairing exchange has completed,
    /// regardless of sample counts.
    pub fn link_up_after_pairing(mut self) -> Self {
        self.link_after_pairing = true;
        self
    }

    /// Every link-state sample reports `Failed`.
    pub fn always_failing(mut self) -> Self {
        self.always_failed = true;
        self
    }
}

impl Radio for ScriptedRadio {
    fn enter_station_mode(&mut self) -> Result<(), RadioError> {
        self.station_mode_entered += 1;
        Ok(())
    }

    fn active_config(&mut self) -> Result<Credentials, RadioError> {
        if self.pairing_complete {
            if let Some(paired) = &self.paired {
                return Ok(paired.clone());
            }
        }
        Ok(self.live.clone())
    }

    fn begin_pairing(&mut self) -> Result<(), RadioError> {
        self.pairing_begun += 1;
        Ok(())
    }

    fn pairing_done(&mut self) -> Result<bool, RadioError> {
        self.pairing_polls += 1;
        let done = matches!(self.pairing_done_after, Some(n) if self.pairing_polls > n);
        if done {
            self.pairing_complete = true;
        }
        Ok(done)
    }

    fn request_connect(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        self.connect_requests.push(credentials.clone());
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        self.status_polls += 1;
        if self.always_failed {
            return LinkStatus::Failed;
        }
        if self.link_after_pairing && self.pairing_complete {
            return LinkStatus::Connected;
        }
        match self.connect_after {
            Some(n) if self.status_polls > n => LinkStatus::Connected,
            _ => LinkStatus::Pending,
        }
    }
}

/// Delay source that records requests instead of sleeping.
#[derive(Debug, Default)]
pub struct InstantSleeper {
    /// Number of sleeps requested.
    pub sleeps: u32,
    /// Sum of requested delays.
    pub total_requested: Duration,
}

impl Sleeper for InstantSleeper {
    fn sleep(&mut self, interval: Duration) {
        self.sleeps += 1;
        self.total_requested += interval;
    }
}

/// Restart primitive that records invocations instead of resetting.
#[derive(Debug, Default)]
pub struct RecordingSystem {
    /// Number of restarts requested.
    pub restarts: u32,
}

impl SystemControl for RecordingSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}
