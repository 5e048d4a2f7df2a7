//! NVS persistence for network credentials.
//!
//! The stored record lives in NVS namespace `"wifi"` under the keys
//! `ssid` and `password`; reads of never-written keys report the unset
//! marker. Each load/save is one scoped acquisition of the namespace: the
//! `EspNvs` handle is opened at the top of the call and released when it
//! drops, on error paths included.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::{error, info};

use crate::platform::{CredentialStore, StoreError};

use super::credentials::{Credentials, MAX_PASSPHRASE_LEN, MAX_SSID_LEN, UNSET_MARKER};

/// NVS namespace for the credential record. The platform caps namespace
/// names at 15 characters.
const NVS_NAMESPACE: &str = "wifi";

/// NVS key for the stored SSID.
const KEY_SSID: &str = "ssid";

/// NVS key for the stored passphrase.
const KEY_PASSPHRASE: &str = "password";

/// Credential store backed by the default NVS partition.
pub struct NvsCredentialStore {
    partition: EspDefaultNvsPartition,
}

impl NvsCredentialStore {
    /// Create a store on the given partition handle.
    ///
    /// The partition is taken once at startup and shared; the namespace is
    /// opened per operation.
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }

    fn open(&self) -> Result<EspNvs<NvsDefault>, StoreError> {
        EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)
            .map_err(|e| StoreError::Open(format!("{:?}", e)))
    }
}

fn read_key(nvs: &EspNvs<NvsDefault>, key: &str, buf: &mut [u8]) -> Result<String, StoreError> {
    match nvs.get_str(key, buf) {
        Ok(Some(value)) => Ok(value.to_string()),
        Ok(None) => Ok(UNSET_MARKER.to_string()),
        Err(e) => Err(StoreError::Read(format!("{}: {:?}", key, e))),
    }
}

impl CredentialStore for NvsCredentialStore {
    fn load(&mut self) -> Result<Credentials, StoreError> {
        let nvs = self.open()?;
        let mut ssid_buf = [0u8; MAX_SSID_LEN + 1];
        let mut pass_buf = [0u8; MAX_PASSPHRASE_LEN + 1];
        let ssid = read_key(&nvs, KEY_SSID, &mut ssid_buf)?;
        let passphrase = read_key(&nvs, KEY_PASSPHRASE, &mut pass_buf)?;
        Ok(Credentials::snapshot(ssid, passphrase))
    }

    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        let mut nvs = self.open()?;
        nvs.set_str(KEY_SSID, &credentials.ssid)
            .map_err(|e| StoreError::Write(format!("{}: {:?}", KEY_SSID, e)))?;
        nvs.set_str(KEY_PASSPHRASE, &credentials.passphrase)
            .map_err(|e| StoreError::Write(format!("{}: {:?}", KEY_PASSPHRASE, e)))?;

        // Read back and compare: flash write failures do not always
        // surface as an error code.
        let mut ssid_buf = [0u8; MAX_SSID_LEN + 1];
        let mut pass_buf = [0u8; MAX_PASSPHRASE_LEN + 1];
        let ssid = read_key(&nvs, KEY_SSID, &mut ssid_buf)?;
        let passphrase = read_key(&nvs, KEY_PASSPHRASE, &mut pass_buf)?;
        if ssid != credentials.ssid || passphrase != credentials.passphrase {
            error!("credential record mismatch after write, flash may be failing");
            return Err(StoreError::Verification);
        }

        info!("credentials for '{}' saved and verified", credentials.ssid);
        Ok(())
    }
}
