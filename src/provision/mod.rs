//! Credential provisioning.
//!
//! Everything between power-on and an established link: the durable
//! credential record, reconciliation against the radio's live
//! configuration, the interactive pairing session, the bounded join
//! supervisor, and the boot orchestration that ties them together.
//!
//! # Components
//!
//! - `credentials` - the stored/live credential record (host-testable)
//! - `reconcile` - drift detection between store and radio
//! - `session` - interactive pairing exchange
//! - `supervisor` - bounded join polling
//! - `boot` - [`ProvisioningContext`] orchestration
//! - `store` / `radio` - ESP-IDF bindings (`esp32` feature)
//! - `host` - deterministic doubles (host builds)

mod boot;
mod credentials;
mod reconcile;
mod session;
mod supervisor;

#[cfg(any(test, not(feature = "esp32")))]
pub mod host;

#[cfg(feature = "esp32")]
mod radio;
#[cfg(feature = "esp32")]
mod store;

pub use boot::{BootError, BootOutcome, ProvisioningContext};
pub use credentials::{
    Credentials, CredentialsError, MAX_PASSPHRASE_LEN, MAX_SSID_LEN, UNSET_MARKER,
};
pub use reconcile::needs_provisioning;
pub use session::{
    run_provisioning, PairingPolicy, ProvisioningOutcome, SessionError, SessionEvent,
};
pub use supervisor::{supervise_connect, ConnectOutcome, RetryPolicy};

#[cfg(feature = "esp32")]
pub use radio::EspRadio;
#[cfg(feature = "esp32")]
pub use store::NvsCredentialStore;
