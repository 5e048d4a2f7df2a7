//! Update transport adapter.
//!
//! Bridges an externally-driven update transport onto the
//! [`UpdateSession`] state machine. The transport owns the transfer and
//! the flash writes; this adapter only reacts to its lifecycle callbacks,
//! answers contention, and keeps the observable session state honest. A
//! rejected callback is reported back to the transport (for start) or
//! logged (for the rest) and never takes the device down.

use esp_idf_sys::{
    esp_ota_get_next_update_partition, esp_partition_find_first,
    esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_DATA_SPIFFS,
    esp_partition_type_t_ESP_PARTITION_TYPE_DATA,
};
use log::{info, warn};

use super::session::{
    PartitionLayout, UpdateEvent, UpdateFault, UpdateRejection, UpdateSession, UpdateState,
    UpdateTarget,
};

/// Probe the partition table for the image kinds it can accept.
pub fn detect_partition_layout() -> PartitionLayout {
    let firmware = unsafe { !esp_ota_get_next_update_partition(core::ptr::null()).is_null() };
    let filesystem = unsafe {
        !esp_partition_find_first(
            esp_partition_type_t_ESP_PARTITION_TYPE_DATA,
            esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_DATA_SPIFFS,
            core::ptr::null(),
        )
        .is_null()
    };
    PartitionLayout {
        firmware,
        filesystem,
    }
}

/// Session holder wired to an external update transport.
pub struct UpdateService {
    session: UpdateSession,
}

impl UpdateService {
    /// Build a service for the running partition table.
    pub fn new() -> Self {
        let layout = detect_partition_layout();
        info!(
            "update targets: firmware={} filesystem={}",
            layout.firmware, layout.filesystem
        );
        Self {
            session: UpdateSession::new(layout),
        }
    }

    /// Current session, for state inspection.
    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    /// Transport announced a transfer. A `Busy` rejection must be answered
    /// to the transport so it can back off instead of clobbering the
    /// in-progress session.
    pub fn on_start(
        &mut self,
        target: UpdateTarget,
        bytes_expected: u64,
    ) -> Result<(), UpdateRejection> {
        self.session
            .handle_event(UpdateEvent::Start {
                target,
                bytes_expected,
            })
            .map(|_| ())
    }

    /// Transport reported transfer progress.
    pub fn on_progress(&mut self, current: u64, total: u64) {
        if let Err(rejection) = self
            .session
            .handle_event(UpdateEvent::Progress { current, total })
        {
            warn!("progress event dropped: {}", rejection);
        }
    }

    /// Transport reported a failure.
    pub fn on_error(&mut self, fault: UpdateFault) {
        if let Err(rejection) = self.session.handle_event(UpdateEvent::Error(fault)) {
            warn!("error event dropped: {}", rejection);
        }
    }

    /// Transport reported the end of the transfer.
    pub fn on_end(&mut self) {
        match self.session.handle_event(UpdateEvent::End) {
            Ok(UpdateState::Completed) => {
                info!("update applied, restart to boot the new image");
            }
            Ok(state) => {
                warn!("transfer ended in {:?}", state);
            }
            Err(rejection) => {
                warn!("end event dropped: {}", rejection);
            }
        }
    }
}

impl Default for UpdateService {
    fn default() -> Self {
        Self::new()
    }
}
