//! Reconciliation of live radio configuration against the durable store.

use super::credentials::Credentials;

/// Decide whether the device must be re-provisioned.
///
/// Trusts the stored record only when the radio's live configuration
/// matches it field for field. An exact equality check: no partial matches,
/// no tolerance for a stale passphrase under the right SSID. A store that
/// was never written holds the unset marker pair, which no live access
/// point can match, so the first boot always provisions instead of silently
/// joining whatever a prior owner or image left in the radio's flash.
pub fn needs_provisioning(live: &Credentials, stored: &Credentials) -> bool {
    !(live.ssid == stored.ssid && live.passphrase == stored.passphrase)
}
