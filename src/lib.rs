//! Network credential provisioning and firmware updates for ESP32 devices.
//!
//! On every boot the device decides whether its persisted credentials are
//! trustworthy by reconciling them against the radio's live configuration;
//! when they are not, an interactive pairing session captures new ones,
//! commits them durably and restarts. An established link is supervised
//! with a bounded retry budget that falls back to provisioning, and a
//! firmware update session reacts to the lifecycle events of an external
//! update transport.
//!
//! The decision logic is platform-independent and tested on the host
//! (`cargo test`); the ESP-IDF bindings compile only with the `esp32`
//! feature.

pub mod ota;
pub mod platform;
pub mod provision;

// Re-export commonly used items
pub use ota::{
    PartitionLayout, UpdateEvent, UpdateFault, UpdateRejection, UpdateSession, UpdateState,
    UpdateTarget,
};
pub use platform::{
    CredentialStore, LinkStatus, Radio, RadioError, Sleeper, StdSleeper, StoreError, SystemControl,
};
pub use provision::{
    needs_provisioning, BootError, BootOutcome, ConnectOutcome, Credentials, CredentialsError,
    PairingPolicy, ProvisioningContext, ProvisioningOutcome, RetryPolicy, SessionError,
    SessionEvent,
};

#[cfg(feature = "esp32")]
pub use ota::UpdateService;
#[cfg(feature = "esp32")]
pub use platform::EspSystemControl;
#[cfg(feature = "esp32")]
pub use provision::{EspRadio, NvsCredentialStore};
