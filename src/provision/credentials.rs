//! Credential record shared by the store and the radio.
//!
//! A [`Credentials`] pair is either fully populated or holds the `"none"`
//! marker in both fields; it is never half-written. The marker is what the
//! durable store reports before the first successful provisioning run.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum passphrase length for WPA2.
pub const MAX_PASSPHRASE_LEN: usize = 64;

/// Value persisted for a field that has never been provisioned.
///
/// A live access point SSID is read back from the radio driver and never
/// equals this marker, so an unprovisioned store can never reconcile
/// against real radio state.
pub const UNSET_MARKER: &str = "none";

/// An SSID/passphrase pair.
///
/// Used both for the durably stored record and for read-only snapshots of
/// what the radio currently holds. The passphrase is wiped from memory when
/// the value is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Network SSID (1-32 bytes).
    pub ssid: String,
    /// Network passphrase (empty for open networks, up to 64 bytes).
    pub passphrase: String,
}

impl Credentials {
    /// Create a validated credential pair.
    pub fn new(
        ssid: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let credentials = Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// The never-provisioned record: both fields hold [`UNSET_MARKER`].
    pub fn unset() -> Self {
        Self {
            ssid: UNSET_MARKER.to_string(),
            passphrase: UNSET_MARKER.to_string(),
        }
    }

    /// Wrap values read back from the radio or the store without validating.
    ///
    /// Live radio snapshots may legitimately be empty (factory-fresh flash)
    /// or hold the unset marker (store never written); bounds checks only
    /// apply to credentials about to be committed.
    pub fn snapshot(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Whether this record is the never-provisioned marker pair.
    pub fn is_unset(&self) -> bool {
        self.ssid == UNSET_MARKER && self.passphrase == UNSET_MARKER
    }

    /// Whether this record describes an open network (no passphrase).
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// Bounds checks applied before a record is committed to the store.
    ///
    /// No minimum passphrase length: captured credentials come from a link
    /// that already joined, so only truncation is guarded against.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.ssid.is_empty() {
            return Err(CredentialsError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(CredentialsError::SsidTooLong {
                len: self.ssid.len(),
            });
        }
        if self.passphrase.len() > MAX_PASSPHRASE_LEN {
            return Err(CredentialsError::PassphraseTooLong {
                len: self.passphrase.len(),
            });
        }
        Ok(())
    }
}

/// Errors from credential validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds [`MAX_SSID_LEN`].
    SsidTooLong { len: usize },
    /// Passphrase exceeds [`MAX_PASSPHRASE_LEN`].
    PassphraseTooLong { len: usize },
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len } => {
                write!(f, "SSID too long: {} bytes (max {})", len, MAX_SSID_LEN)
            }
            Self::PassphraseTooLong { len } => {
                write!(
                    f,
                    "passphrase too long: {} bytes (max {})",
                    len, MAX_PASSPHRASE_LEN
                )
            }
        }
    }
}

impl std::error::Error for CredentialsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_credentials() {
        let credentials = Credentials::new("HomeNet", "secret1").unwrap();
        assert_eq!(credentials.ssid, "HomeNet");
        assert_eq!(credentials.passphrase, "secret1");
        assert!(!credentials.is_unset());
    }

    #[test]
    fn test_unset_marker_in_both_fields() {
        let unset = Credentials::unset();
        assert_eq!(unset.ssid, UNSET_MARKER);
        assert_eq!(unset.passphrase, UNSET_MARKER);
        assert!(unset.is_unset());
    }

    #[test]
    fn test_partial_marker_is_not_unset() {
        // Never-partially-populated is the store's job; a record with only
        // one marker field must not read as unset.
        let record = Credentials::snapshot(UNSET_MARKER, "secret1");
        assert!(!record.is_unset());
    }

    #[test]
    fn test_open_network() {
        let credentials = Credentials::new("CoffeeShop", "").unwrap();
        assert!(credentials.is_open());
    }

    #[test]
    fn test_empty_ssid_rejected() {
        assert_eq!(
            Credentials::new("", "secret1"),
            Err(CredentialsError::SsidEmpty)
        );
    }

    #[test]
    fn test_ssid_bounds() {
        assert!(Credentials::new("a".repeat(32), "secret1").is_ok());
        assert!(matches!(
            Credentials::new("a".repeat(33), "secret1"),
            Err(CredentialsError::SsidTooLong { len: 33 })
        ));
    }

    #[test]
    fn test_passphrase_bounds() {
        assert!(Credentials::new("HomeNet", "a".repeat(64)).is_ok());
        assert!(matches!(
            Credentials::new("HomeNet", "a".repeat(65)),
            Err(CredentialsError::PassphraseTooLong { len: 65 })
        ));
    }

    #[test]
    fn test_snapshot_skips_validation() {
        // Factory-fresh radio flash reads back as empty strings.
        let live = Credentials::snapshot("", "");
        assert!(live.ssid.is_empty());
        assert!(!live.is_unset());
    }
}
