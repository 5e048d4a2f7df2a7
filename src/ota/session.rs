//! Firmware update session state machine.
//!
//! One update transfer is modeled as an explicit state machine driven
//! through a single [`UpdateSession::handle_event`] entry point by the
//! lifecycle events an external transport fires: start, progress, error,
//! end. The session never initiates transfers and never touches the image
//! bytes itself; it tracks the transfer's legality and exposes its state
//! to the rest of the device.
//!
//! ```text
//! Idle ──start──▶ Receiving ──first byte──▶ Applying ──end──▶ Completed
//!                     │                        │
//!                     └────────error───────────┴──▶ Failed(reason)
//! ```
//!
//! Completed and Failed are terminal until the next accepted start.

use std::fmt;

use log::{debug, error, info, warn};

/// What kind of image a transfer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Application image for the next boot slot.
    Firmware,
    /// Filesystem image for the data partition.
    Filesystem,
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firmware => write!(f, "firmware"),
            Self::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Which image kinds the running partition table can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLayout {
    /// A spare application slot exists.
    pub firmware: bool,
    /// A writable filesystem partition exists.
    pub filesystem: bool,
}

impl PartitionLayout {
    /// Application slots only, no filesystem partition.
    pub const fn firmware_only() -> Self {
        Self {
            firmware: true,
            filesystem: false,
        }
    }

    /// Application slots plus a filesystem partition.
    pub const fn with_filesystem() -> Self {
        Self {
            firmware: true,
            filesystem: true,
        }
    }

    /// Whether the layout can accept an image of the given kind.
    pub fn accepts(&self, target: UpdateTarget) -> bool {
        match target {
            UpdateTarget::Firmware => self.firmware,
            UpdateTarget::Filesystem => self.filesystem,
        }
    }
}

impl Default for PartitionLayout {
    fn default() -> Self {
        Self::firmware_only()
    }
}

/// Distinct, user-reportable reasons an update fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFault {
    AuthFailed,
    BeginFailed,
    ConnectFailed,
    ReceiveFailed,
    EndFailed,
}

impl fmt::Display for UpdateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthFailed => write!(f, "auth failed"),
            Self::BeginFailed => write!(f, "begin failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::ReceiveFailed => write!(f, "receive failed"),
            Self::EndFailed => write!(f, "end failed"),
        }
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// No update underway.
    Idle,
    /// A transfer was accepted; no image byte written yet.
    Receiving,
    /// Image bytes are being written.
    Applying,
    /// The image was transferred completely.
    Completed,
    /// The update failed; a new start must be issued explicitly.
    Failed(UpdateFault),
}

impl UpdateState {
    /// Receiving or Applying.
    pub fn in_progress(&self) -> bool {
        matches!(self, Self::Receiving | Self::Applying)
    }

    /// Completed or Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Lifecycle events fired by the external update transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A transfer was requested.
    Start {
        target: UpdateTarget,
        bytes_expected: u64,
    },
    /// Transfer progress report.
    Progress { current: u64, total: u64 },
    /// The transport reported a failure.
    Error(UpdateFault),
    /// The transport reports the transfer finished.
    End,
}

/// Why an event was not applied. The session state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRejection {
    /// A start arrived while a transfer is already underway.
    Busy,
    /// The event needs an active (or, for start, a startable) session.
    NotActive,
    /// A start declared an unusable image size.
    InvalidSize,
}

impl fmt::Display for UpdateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "update already in progress"),
            Self::NotActive => write!(f, "no active update session"),
            Self::InvalidSize => write!(f, "declared image size is unusable"),
        }
    }
}

impl std::error::Error for UpdateRejection {}

/// One firmware update transfer.
///
/// Created once per device boot with the running [`PartitionLayout`]; a
/// terminal state is left in place for inspection until the next accepted
/// start resets the bookkeeping.
#[derive(Debug)]
pub struct UpdateSession {
    layout: PartitionLayout,
    state: UpdateState,
    target: UpdateTarget,
    bytes_expected: u64,
    bytes_transferred: u64,
    last_percent: Option<u8>,
}

impl UpdateSession {
    pub fn new(layout: PartitionLayout) -> Self {
        Self {
            layout,
            state: UpdateState::Idle,
            target: UpdateTarget::Firmware,
            bytes_expected: 0,
            bytes_transferred: 0,
            last_percent: None,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn bytes_expected(&self) -> u64 {
        self.bytes_expected
    }

    /// Apply one lifecycle event.
    ///
    /// Returns the state after the event, or the reason the event was
    /// rejected; a rejected event never changes state or counters.
    pub fn handle_event(&mut self, event: UpdateEvent) -> Result<UpdateState, UpdateRejection> {
        match event {
            UpdateEvent::Start {
                target,
                bytes_expected,
            } => self.on_start(target, bytes_expected),
            UpdateEvent::Progress { current, total } => self.on_progress(current, total),
            UpdateEvent::Error(fault) => self.on_error(fault),
            UpdateEvent::End => self.on_end(),
        }
    }

    fn on_start(
        &mut self,
        target: UpdateTarget,
        bytes_expected: u64,
    ) -> Result<UpdateState, UpdateRejection> {
        if self.state.in_progress() {
            warn!(
                "update start rejected, session busy in {:?}",
                self.state
            );
            return Err(UpdateRejection::Busy);
        }
        if bytes_expected == 0 {
            warn!("update start rejected, zero-byte image declared");
            return Err(UpdateRejection::InvalidSize);
        }
        self.state = UpdateState::Receiving;
        self.target = target;
        self.bytes_expected = bytes_expected;
        self.bytes_transferred = 0;
        self.last_percent = None;
        info!("update started: {} image, {} bytes", target, bytes_expected);
        Ok(self.state)
    }

    fn on_progress(&mut self, current: u64, total: u64) -> Result<UpdateState, UpdateRejection> {
        if !self.state.in_progress() {
            return Err(UpdateRejection::NotActive);
        }
        if total != self.bytes_expected {
            warn!(
                "transport reports {} expected bytes, session recorded {}",
                total, self.bytes_expected
            );
        }
        let current = current.min(self.bytes_expected);
        if current < self.bytes_transferred {
            debug!(
                "ignoring regressing progress report ({} < {})",
                current, self.bytes_transferred
            );
            return Ok(self.state);
        }
        if self.state == UpdateState::Receiving && current > 0 {
            // The first byte is about to land: the image kind must be
            // writable on this partition table.
            if !self.layout.accepts(self.target) {
                error!(
                    "{} image not supported by the running partition layout",
                    self.target
                );
                self.state = UpdateState::Failed(UpdateFault::BeginFailed);
                return Ok(self.state);
            }
            debug!("writing {} image", self.target);
            self.state = UpdateState::Applying;
        }
        self.bytes_transferred = current;
        let percent = ((self.bytes_transferred.saturating_mul(100)) / self.bytes_expected) as u8;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            info!(
                "update progress: {}% ({}/{} bytes)",
                percent, self.bytes_transferred, self.bytes_expected
            );
        }
        Ok(self.state)
    }

    fn on_error(&mut self, fault: UpdateFault) -> Result<UpdateState, UpdateRejection> {
        if self.state.is_terminal() {
            return Err(UpdateRejection::NotActive);
        }
        error!("update failed: {}", fault);
        self.state = UpdateState::Failed(fault);
        Ok(self.state)
    }

    fn on_end(&mut self) -> Result<UpdateState, UpdateRejection> {
        match self.state {
            UpdateState::Applying if self.bytes_transferred == self.bytes_expected => {
                info!("update complete ({} bytes)", self.bytes_transferred);
                self.state = UpdateState::Completed;
                Ok(self.state)
            }
            UpdateState::Applying | UpdateState::Receiving => {
                error!(
                    "update ended {} bytes short of {}",
                    self.bytes_expected - self.bytes_transferred,
                    self.bytes_expected
                );
                self.state = UpdateState::Failed(UpdateFault::ReceiveFailed);
                Ok(self.state)
            }
            UpdateState::Idle | UpdateState::Completed | UpdateState::Failed(_) => {
                Err(UpdateRejection::NotActive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn start(bytes_expected: u64) -> UpdateEvent {
        UpdateEvent::Start {
            target: UpdateTarget::Firmware,
            bytes_expected,
        }
    }

    fn progress(current: u64, total: u64) -> UpdateEvent {
        UpdateEvent::Progress { current, total }
    }

    #[test]
    fn test_complete_transfer_walkthrough() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        assert_eq!(session.handle_event(start(100)), Ok(UpdateState::Receiving));
        assert_eq!(
            session.handle_event(progress(50, 100)),
            Ok(UpdateState::Applying)
        );
        assert_eq!(
            session.handle_event(progress(100, 100)),
            Ok(UpdateState::Applying)
        );
        assert_eq!(session.handle_event(UpdateEvent::End), Ok(UpdateState::Completed));
        assert_eq!(session.bytes_transferred(), 100);
    }

    #[test]
    fn test_start_while_busy_is_rejected_and_harmless() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();
        session.handle_event(progress(30, 100)).unwrap();

        let rejected = session.handle_event(UpdateEvent::Start {
            target: UpdateTarget::Filesystem,
            bytes_expected: 999,
        });

        assert_eq!(rejected, Err(UpdateRejection::Busy));
        assert_eq!(session.state(), UpdateState::Applying);
        assert_eq!(session.bytes_transferred(), 30);
        assert_eq!(session.bytes_expected(), 100);
    }

    #[test]
    fn test_error_is_terminal_until_new_start() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();
        assert_eq!(
            session.handle_event(UpdateEvent::Error(UpdateFault::AuthFailed)),
            Ok(UpdateState::Failed(UpdateFault::AuthFailed))
        );

        // Subsequent progress is rejected with no state change.
        assert_eq!(
            session.handle_event(progress(10, 100)),
            Err(UpdateRejection::NotActive)
        );
        assert_eq!(session.state(), UpdateState::Failed(UpdateFault::AuthFailed));
        assert_eq!(session.bytes_transferred(), 0);

        // A new start is accepted and resets the bookkeeping.
        assert_eq!(session.handle_event(start(64)), Ok(UpdateState::Receiving));
        assert_eq!(session.bytes_expected(), 64);
    }

    #[test]
    fn test_error_accepted_before_start() {
        // Transport handshake failures arrive before any transfer begins.
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        assert_eq!(
            session.handle_event(UpdateEvent::Error(UpdateFault::ConnectFailed)),
            Ok(UpdateState::Failed(UpdateFault::ConnectFailed))
        );
    }

    #[test]
    fn test_end_short_of_expected_is_a_protocol_violation() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();
        session.handle_event(progress(60, 100)).unwrap();

        assert_eq!(
            session.handle_event(UpdateEvent::End),
            Ok(UpdateState::Failed(UpdateFault::ReceiveFailed))
        );
    }

    #[test]
    fn test_end_without_any_bytes_is_a_protocol_violation() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();

        assert_eq!(
            session.handle_event(UpdateEvent::End),
            Ok(UpdateState::Failed(UpdateFault::ReceiveFailed))
        );
    }

    #[test]
    fn test_end_from_idle_is_rejected() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        assert_eq!(
            session.handle_event(UpdateEvent::End),
            Err(UpdateRejection::NotActive)
        );
        assert_eq!(session.state(), UpdateState::Idle);
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();
        session.handle_event(progress(70, 100)).unwrap();
        session.handle_event(progress(40, 100)).unwrap();

        assert_eq!(session.bytes_transferred(), 70);

        session.handle_event(progress(100, 100)).unwrap();
        assert_eq!(
            session.handle_event(UpdateEvent::End),
            Ok(UpdateState::Completed)
        );
    }

    #[test]
    fn test_progress_clamped_to_expected() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(100)).unwrap();
        session.handle_event(progress(250, 100)).unwrap();

        assert_eq!(session.bytes_transferred(), 100);
    }

    #[test]
    fn test_unsupported_target_fails_before_any_byte_counts() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session
            .handle_event(UpdateEvent::Start {
                target: UpdateTarget::Filesystem,
                bytes_expected: 100,
            })
            .unwrap();

        assert_eq!(
            session.handle_event(progress(10, 100)),
            Ok(UpdateState::Failed(UpdateFault::BeginFailed))
        );
        assert_eq!(session.bytes_transferred(), 0);
    }

    #[test]
    fn test_filesystem_target_accepted_with_matching_layout() {
        let mut session = UpdateSession::new(PartitionLayout::with_filesystem());
        session
            .handle_event(UpdateEvent::Start {
                target: UpdateTarget::Filesystem,
                bytes_expected: 100,
            })
            .unwrap();

        assert_eq!(
            session.handle_event(progress(10, 100)),
            Ok(UpdateState::Applying)
        );
    }

    #[test]
    fn test_zero_size_start_rejected() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        assert_eq!(
            session.handle_event(start(0)),
            Err(UpdateRejection::InvalidSize)
        );
        assert_eq!(session.state(), UpdateState::Idle);
    }

    #[test]
    fn test_restart_after_completion() {
        let mut session = UpdateSession::new(PartitionLayout::firmware_only());
        session.handle_event(start(10)).unwrap();
        session.handle_event(progress(10, 10)).unwrap();
        session.handle_event(UpdateEvent::End).unwrap();

        assert_eq!(session.handle_event(start(20)), Ok(UpdateState::Receiving));
        assert_eq!(session.bytes_transferred(), 0);
    }

    proptest! {
        #[test]
        fn prop_bytes_transferred_is_monotonic(reports in proptest::collection::vec(0u64..=2000, 1..40)) {
            let mut session = UpdateSession::new(PartitionLayout::firmware_only());
            session.handle_event(UpdateEvent::Start {
                target: UpdateTarget::Firmware,
                bytes_expected: 1000,
            }).unwrap();

            let mut previous = 0u64;
            for report in reports {
                let _ = session.handle_event(UpdateEvent::Progress { current: report, total: 1000 });
                prop_assert!(session.bytes_transferred() >= previous);
                prop_assert!(session.bytes_transferred() <= 1000);
                previous = session.bytes_transferred();
            }
        }
    }
}
