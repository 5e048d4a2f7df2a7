//! Firmware update session.
//!
//! The update lifecycle as an explicit state machine ([`UpdateSession`],
//! host-testable) plus the transport adapter that wires it to the
//! externally-driven update service on device (`esp32` feature).

mod session;

#[cfg(feature = "esp32")]
mod service;

pub use session::{
    PartitionLayout, UpdateEvent, UpdateFault, UpdateRejection, UpdateSession, UpdateState,
    UpdateTarget,
};

#[cfg(feature = "esp32")]
pub use service::{detect_partition_layout, UpdateService};
