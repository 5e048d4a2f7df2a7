//! Firmware entry point: boot provisioning, then update servicing.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Err(err) = run() {
        log::error!("boot failed: {}", err);
    }

    // Nothing left to drive; keep the control thread parked for the
    // platform housekeeping tasks.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(feature = "esp32")]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;

    use esp32_provision::{
        BootOutcome, EspRadio, EspSystemControl, NvsCredentialStore, ProvisioningContext,
        StdSleeper, UpdateService,
    };
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{debug, info};

    /// Name the device announces to the update transport.
    const DEVICE_HOSTNAME: &str = "esp32-provision";

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = EspDefaultNvsPartition::take()?;

    let radio = EspRadio::new(peripherals.modem, sysloop, partition.clone())?;
    let store = NvsCredentialStore::new(partition);
    let mut context = ProvisioningContext::new(radio, store, StdSleeper, EspSystemControl);

    match context.run()? {
        BootOutcome::RestartRequested => {
            // The restart fired inside the context; not reached on hardware.
            Ok(())
        }
        BootOutcome::Online => {
            let (radio, _store) = context.into_parts();
            radio.log_link_details();

            let updates = UpdateService::new();
            info!("'{}' online, waiting for update events", DEVICE_HOSTNAME);

            // The update transport drives `updates` from its callbacks;
            // this thread only keeps the session state observable.
            loop {
                std::thread::sleep(Duration::from_secs(2));
                debug!("update session: {:?}", updates.session().state());
            }
        }
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo test' for host testing, or 'cargo run --bin host-sim'");
    println!("to exercise the provisioning flow against the host doubles.");
}
