//! Host simulation of the boot provisioning and update flows.
//!
//! Runs the real decision logic against the deterministic host doubles so
//! the whole sequence can be watched from a workstation:
//!
//! ```sh
//! RUST_LOG=debug cargo run --bin host-sim
//! ```

#[cfg(not(feature = "esp32"))]
fn main() {
    use esp32_provision::provision::host::{
        InstantSleeper, MemoryCredentialStore, RecordingSystem, ScriptedRadio,
    };
    use esp32_provision::{
        BootOutcome, Credentials, PartitionLayout, ProvisioningContext, UpdateEvent, UpdateFault,
        UpdateSession, UpdateTarget,
    };
    use log::info;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // First boot: empty store, factory leftovers in the radio flash. The
    // scripted pairing captures home credentials and the device "restarts".
    info!("--- first boot: provisioning ---");
    let radio = ScriptedRadio::new(Credentials::snapshot("FactoryAP", ""))
        .pairs_after(3, Credentials::snapshot("HomeNet", "secret1"))
        .connects_after(0);
    let mut context = ProvisioningContext::new(
        radio,
        MemoryCredentialStore::new(),
        InstantSleeper::default(),
        RecordingSystem::default(),
    );
    let outcome = context.run().expect("first boot failed");
    assert_eq!(outcome, BootOutcome::RestartRequested);
    let (_, store) = context.into_parts();
    info!("store now holds '{}'", store.stored().ssid);

    // Second boot: store and radio agree, the supervisor joins directly.
    info!("--- second boot: reconciled ---");
    let credentials = store.stored().clone();
    let radio = ScriptedRadio::new(credentials.clone()).connects_after(2);
    let mut context = ProvisioningContext::new(
        radio,
        MemoryCredentialStore::with_credentials(credentials),
        InstantSleeper::default(),
        RecordingSystem::default(),
    );
    let outcome = context.run().expect("second boot failed");
    assert_eq!(outcome, BootOutcome::Online);

    // With the device online, walk an update transfer through its
    // lifecycle events.
    info!("--- update session ---");
    let mut session = UpdateSession::new(PartitionLayout::firmware_only());
    let steps = [
        UpdateEvent::Start {
            target: UpdateTarget::Firmware,
            bytes_expected: 1024,
        },
        UpdateEvent::Progress {
            current: 512,
            total: 1024,
        },
        UpdateEvent::Progress {
            current: 1024,
            total: 1024,
        },
        UpdateEvent::End,
    ];
    for event in steps {
        let state = session.handle_event(event).expect("event rejected");
        info!("{:?} -> {:?}", event, state);
    }

    // And one that the transport kills mid-flight.
    let mut session = UpdateSession::new(PartitionLayout::firmware_only());
    session
        .handle_event(UpdateEvent::Start {
            target: UpdateTarget::Firmware,
            bytes_expected: 1024,
        })
        .expect("start rejected");
    let state = session
        .handle_event(UpdateEvent::Error(UpdateFault::ReceiveFailed))
        .expect("error rejected");
    info!("aborted transfer -> {:?}", state);

    info!("simulation complete");
}

#[cfg(feature = "esp32")]
fn main() {
    println!("host-sim is a host-only binary; build without the 'esp32' feature.");
}
