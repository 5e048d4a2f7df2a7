//! ESP-IDF radio binding.
//!
//! Wraps the ESP-IDF WiFi driver behind the [`Radio`] trait. Pairing uses
//! the SmartConfig broadcast exchange: an `SC_EVENT` handler applies the
//! received credentials to the driver and issues the join, and completion
//! is observed once the peer's acknowledgement went out. The live
//! configuration is read straight from the driver's own non-volatile
//! config, which is also where a completed pairing leaves the negotiated
//! credentials.

use std::sync::atomic::{AtomicBool, Ordering};

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::{
    esp, esp_event_base_t, esp_event_handler_register, esp_event_handler_unregister,
    esp_smartconfig_set_type, esp_smartconfig_start, esp_smartconfig_stop, esp_wifi_connect,
    esp_wifi_disconnect, esp_wifi_get_config, esp_wifi_set_config, esp_wifi_set_mode,
    smartconfig_event_got_ssid_pswd_t, smartconfig_event_t_SC_EVENT_GOT_SSID_PSWD,
    smartconfig_event_t_SC_EVENT_SEND_ACK_DONE, smartconfig_start_config_t,
    smartconfig_type_t_SC_TYPE_ESPTOUCH, wifi_config_t, wifi_interface_t_WIFI_IF_STA,
    wifi_mode_t_WIFI_MODE_STA, ESP_EVENT_ANY_ID, SC_EVENT,
};
use log::{info, warn};

use crate::platform::{LinkStatus, Radio, RadioError};

use super::credentials::Credentials;

/// Set by the SmartConfig event handler once the acknowledgement to the
/// pairing peer went out.
static PAIRING_COMPLETE: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn sc_event_handler(
    _arg: *mut core::ffi::c_void,
    _base: esp_event_base_t,
    id: i32,
    data: *mut core::ffi::c_void,
) {
    if id == smartconfig_event_t_SC_EVENT_GOT_SSID_PSWD as i32 {
        // Apply the received credentials to the driver and join; the
        // negotiated values are read back from the driver config once the
        // link is up.
        let event = &*(data as *const smartconfig_event_got_ssid_pswd_t);
        let mut config: wifi_config_t = core::mem::zeroed();
        config
            .sta
            .ssid
            .copy_from_slice(&event.ssid[..config.sta.ssid.len()]);
        config
            .sta
            .password
            .copy_from_slice(&event.password[..config.sta.password.len()]);
        esp_wifi_disconnect();
        if esp_wifi_set_config(wifi_interface_t_WIFI_IF_STA, &mut config) == 0 {
            esp_wifi_connect();
        }
    } else if id == smartconfig_event_t_SC_EVENT_SEND_ACK_DONE as i32 {
        PAIRING_COMPLETE.store(true, Ordering::SeqCst);
    }
}

/// Decode a nul-terminated fixed-size driver field.
fn text_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// ESP-IDF WiFi driver behind the [`Radio`] seam.
pub struct EspRadio {
    wifi: EspWifi<'static>,
    pairing_active: bool,
}

impl EspRadio {
    /// Bring up the WiFi driver on the modem peripheral.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, RadioError> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))
            .map_err(|e| RadioError::Init(format!("{:?}", e)))?;
        Ok(Self {
            wifi,
            pairing_active: false,
        })
    }

    /// Log the station interface details once the link is up: address,
    /// gateway, DNS, hardware address.
    pub fn log_link_details(&self) {
        let netif = self.wifi.sta_netif();
        match netif.get_ip_info() {
            Ok(ip_info) => {
                info!(
                    "ip {} / {} gateway {}",
                    ip_info.ip, ip_info.subnet.mask, ip_info.subnet.gateway
                );
                if let Some(dns) = ip_info.dns {
                    info!("dns {}", dns);
                }
            }
            Err(e) => warn!("could not read interface info: {:?}", e),
        }
        match netif.get_mac() {
            Ok(mac) => info!(
                "mac {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
            Err(e) => warn!("could not read interface mac: {:?}", e),
        }
    }
}

impl Radio for EspRadio {
    fn enter_station_mode(&mut self) -> Result<(), RadioError> {
        // Mode is set through the raw call so the driver's saved station
        // configuration is left untouched until it has been read.
        esp!(unsafe { esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_STA) })
            .map_err(|e| RadioError::Mode(format!("{:?}", e)))?;
        self.wifi
            .start()
            .map_err(|e| RadioError::Mode(format!("{:?}", e)))?;
        Ok(())
    }

    fn active_config(&mut self) -> Result<Credentials, RadioError> {
        let mut config: wifi_config_t = unsafe { core::mem::zeroed() };
        esp!(unsafe { esp_wifi_get_config(wifi_interface_t_WIFI_IF_STA, &mut config) })
            .map_err(|e| RadioError::ConfigRead(format!("{:?}", e)))?;
        let sta = unsafe { config.sta };
        Ok(Credentials::snapshot(
            text_field(&sta.ssid),
            text_field(&sta.password),
        ))
    }

    fn begin_pairing(&mut self) -> Result<(), RadioError> {
        PAIRING_COMPLETE.store(false, Ordering::SeqCst);
        unsafe {
            esp!(esp_event_handler_register(
                SC_EVENT,
                ESP_EVENT_ANY_ID,
                Some(sc_event_handler),
                core::ptr::null_mut(),
            ))
            .map_err(|e| RadioError::PairingStart(format!("event handler: {:?}", e)))?;
            esp!(esp_smartconfig_set_type(smartconfig_type_t_SC_TYPE_ESPTOUCH))
                .map_err(|e| RadioError::PairingStart(format!("type: {:?}", e)))?;
            let config = smartconfig_start_config_t::default();
            esp!(esp_smartconfig_start(&config))
                .map_err(|e| RadioError::PairingStart(format!("start: {:?}", e)))?;
        }
        self.pairing_active = true;
        Ok(())
    }

    fn pairing_done(&mut self) -> Result<bool, RadioError> {
        let done = PAIRING_COMPLETE.load(Ordering::SeqCst);
        if done && self.pairing_active {
            unsafe {
                let _ = esp_smartconfig_stop();
                let _ = esp_event_handler_unregister(
                    SC_EVENT,
                    ESP_EVENT_ANY_ID,
                    Some(sc_event_handler),
                );
            }
            self.pairing_active = false;
        }
        Ok(done)
    }

    fn request_connect(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| RadioError::ConnectRequest("ssid does not fit".to_string()))?,
            password: credentials
                .passphrase
                .as_str()
                .try_into()
                .map_err(|_| RadioError::ConnectRequest("passphrase does not fit".to_string()))?,
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| RadioError::ConnectRequest(format!("{:?}", e)))?;
        // Fire-and-forget join request; completion is observed via
        // link_status polling.
        self.wifi
            .connect()
            .map_err(|e| RadioError::ConnectRequest(format!("{:?}", e)))?;
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        match self.wifi.is_connected() {
            Ok(true) => {
                // Associated; report up only once the interface has an
                // address so callers can use the network right away.
                match self.wifi.sta_netif().get_ip_info() {
                    Ok(ip_info) if !ip_info.ip.is_unspecified() => LinkStatus::Connected,
                    Ok(_) => LinkStatus::Pending,
                    Err(_) => LinkStatus::Pending,
                }
            }
            Ok(false) => LinkStatus::Pending,
            Err(e) => {
                warn!("link status query failed: {:?}", e);
                LinkStatus::Failed
            }
        }
    }
}
