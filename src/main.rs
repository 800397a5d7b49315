//! ESP32 firmware that keeps itself up to date from a manifest server.
//!
//! Build for the chip with `cargo build --target xtensa-esp32s3-espidf`; on
//! any other target this binary only explains that.

mod logging;
mod version;

#[cfg(target_os = "espidf")]
mod config;
#[cfg(target_os = "espidf")]
mod network;
#[cfg(target_os = "espidf")]
mod ota;
#[cfg(target_os = "espidf")]
mod system;

#[cfg(target_os = "espidf")]
mod app_desc {
    // Generate ESP-IDF app descriptor
    #![allow(unexpected_cfgs)]
    esp_idf_sys::esp_app_desc!();
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::time::Duration;

    use esp_idf_hal::prelude::Peripherals;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use log::{error, info, warn};
    use ota_core::UpdateSession;

    use crate::network::WifiManager;
    use crate::ota::{EspDevice, EspHttpTransport, EspOtaStorage};

    // How often the loop wakes; the session decides whether that is a check
    const POLL_INTERVAL: Duration = Duration::from_secs(60);
    const WIFI_CONNECT_ATTEMPTS: u32 = 5;

    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();

    logging::init_logger()?;

    info!("ESP32 OTA updater {}", version::full_version());
    info!("Free heap: {} bytes", unsafe {
        esp_idf_sys::esp_get_free_heap_size()
    });
    info!("Boot reason: {}", system::reset::get_reset_reason());
    if system::reset::after_software_reset() {
        info!("Software reset, possibly finishing an update");
    }

    // An image that made it this far is good enough to keep
    if let Err(e) = ota::mark_running_slot_valid() {
        warn!("Could not confirm running firmware: {:?}", e);
    }

    let current = version::current()
        .map_err(|e| anyhow::anyhow!("Compiled firmware version '{}' is invalid: {}", version::FIRMWARE_VERSION, e))?;

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let config = config::load_or_default(&nvs)?;
    if !logging::set_max_level_from_str(&config.updater.log_level) {
        warn!("Unknown log level '{}', keeping debug", config.updater.log_level);
    }

    let mut wifi = WifiManager::new(
        peripherals.modem,
        sys_loop,
        nvs,
        config.wifi_ssid.clone(),
        config.wifi_password.clone(),
    )?;
    if let Err(e) = wifi.connect_with_retries(WIFI_CONNECT_ATTEMPTS) {
        error!("WiFi connection failed: {:?}", e);
    }

    if !config.updater.enabled {
        info!("Update checks disabled in configuration");
    } else if let Err(e) = config.updater.validate() {
        error!("Update checks disabled, invalid configuration: {}", e);
    } else {
        let mut session = UpdateSession::from_config(
            &config.updater,
            current,
            EspHttpTransport::default(),
            EspOtaStorage::new(),
            EspDevice::new(wifi),
        );
        session.log_versions();

        loop {
            let outcome = session.check_and_update(false);
            if outcome.is_failure() {
                warn!("Update cycle: {}", outcome);
            } else {
                log::debug!("Update cycle: {}", outcome);
            }

            if outcome == ota_core::UpdateOutcome::NetworkUnavailable {
                if let Err(e) = session.device_mut().wifi_mut().connect() {
                    warn!("WiFi reconnect failed: {:?}", e);
                }
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    loop {
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    logging::init_logger().ok();
    log::warn!(
        "esp32-ota-updater {} only runs on the chip; build it with --target xtensa-esp32s3-espidf",
        version::full_version()
    );
    match version::current() {
        Ok(current) => log::info!("Compiled firmware version: {} ({} scheme)", current, current.scheme()),
        Err(e) => log::error!("Compiled firmware version is invalid: {}", e),
    }
}
