//! Platform trait seams.
//!
//! The external collaborators of the provisioning flow (radio driver,
//! durable credential store, delay source, restart primitive) are modeled
//! as traits so the decision logic runs unchanged against the ESP-IDF
//! bindings on device and against deterministic fakes on the host.
//!
//! # Implementations
//!
//! - `esp32` feature: `EspRadio`, `NvsCredentialStore`, `EspSystemControl`
//! - host: the doubles in `crate::provision::host`

use std::fmt;
use std::time::Duration;

use crate::provision::Credentials;

/// Result of sampling the radio link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Associated and the network interface is up.
    Connected,
    /// Join request still in flight.
    Pending,
    /// The driver reported a failure for the current attempt.
    Failed,
}

/// Radio subsystem driver.
///
/// Join requests are fire-and-forget: [`Radio::request_connect`] issues the
/// request and completion is observed by polling [`Radio::link_status`].
pub trait Radio {
    /// Switch the radio into station mode.
    ///
    /// Must happen before the saved radio configuration can be read.
    fn enter_station_mode(&mut self) -> Result<(), RadioError>;

    /// Read the credentials the radio currently holds in its own
    /// non-volatile configuration.
    fn active_config(&mut self) -> Result<Credentials, RadioError>;

    /// Start the broadcast-based pairing exchange.
    fn begin_pairing(&mut self) -> Result<(), RadioError>;

    /// Whether the pairing exchange has completed.
    fn pairing_done(&mut self) -> Result<bool, RadioError>;

    /// Issue a join request for the given network.
    fn request_connect(&mut self, credentials: &Credentials) -> Result<(), RadioError>;

    /// Sample the current link state.
    fn link_status(&mut self) -> LinkStatus;
}

/// Durable SSID/passphrase persistence.
///
/// Implementations treat each call as one scoped acquisition of the
/// underlying storage namespace: open, read or write, close — released on
/// error paths too.
pub trait CredentialStore {
    /// Read the stored record; the unset marker pair if never written.
    fn load(&mut self) -> Result<Credentials, StoreError>;

    /// Overwrite the stored record.
    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError>;
}

/// Fixed-delay suspension point used by the polling loops.
///
/// On device this sleeps the control thread, yielding to the radio stack
/// and watchdog housekeeping; tests inject a counting fake so no real time
/// passes.
pub trait Sleeper {
    fn sleep(&mut self, interval: Duration);
}

/// Delay source backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSleeper;

impl Sleeper for StdSleeper {
    fn sleep(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// The coarse cancellation primitive: a full device restart.
pub trait SystemControl {
    /// Restart the device. On hardware this does not return.
    fn restart(&mut self);
}

/// Restart via `esp_restart`.
#[cfg(feature = "esp32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EspSystemControl;

#[cfg(feature = "esp32")]
impl SystemControl for EspSystemControl {
    fn restart(&mut self) {
        log::warn!("restarting device");
        unsafe { esp_idf_sys::esp_restart() }
    }
}

/// Errors from the radio subsystem.
#[derive(Debug)]
pub enum RadioError {
    /// Driver bring-up failed.
    Init(String),
    /// Switching the radio mode failed.
    Mode(String),
    /// The saved radio configuration could not be read.
    ConfigRead(String),
    /// The pairing broadcast could not be started.
    PairingStart(String),
    /// The join request was not accepted by the driver.
    ConnectRequest(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(detail) => write!(f, "radio init failed: {}", detail),
            Self::Mode(detail) => write!(f, "radio mode change failed: {}", detail),
            Self::ConfigRead(detail) => write!(f, "radio config read failed: {}", detail),
            Self::PairingStart(detail) => write!(f, "pairing start failed: {}", detail),
            Self::ConnectRequest(detail) => write!(f, "join request failed: {}", detail),
        }
    }
}

impl std::error::Error for RadioError {}

/// Errors from the durable credential store.
#[derive(Debug)]
pub enum StoreError {
    /// The storage namespace could not be opened.
    Open(String),
    /// A field could not be read.
    Read(String),
    /// A field could not be written.
    Write(String),
    /// The record read back after a write did not match what was written.
    Verification,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(detail) => write!(f, "credential store open failed: {}", detail),
            Self::Read(detail) => write!(f, "credential store read failed: {}", detail),
            Self::Write(detail) => write!(f, "credential store write failed: {}", detail),
            Self::Verification => write!(f, "credential store verification failed after write"),
        }
    }
}

impl std::error::Error for StoreError {}
