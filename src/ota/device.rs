use std::time::Duration;

use ota_core::Device;

use crate::network::WifiManager;

/// Connectivity, uptime and reset for the running chip
pub struct EspDevice {
    wifi: WifiManager,
}

impl EspDevice {
    pub fn new(wifi: WifiManager) -> Self {
        Self { wifi }
    }

    pub fn wifi_mut(&mut self) -> &mut WifiManager {
        &mut self.wifi
    }
}

impl Device for EspDevice {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    fn now_ms(&self) -> u64 {
        let micros = unsafe { esp_idf_sys::esp_timer_get_time() };
        u64::try_from(micros).unwrap_or(0) / 1000
    }

    fn restart(&mut self) -> ! {
        log::logger().flush();
        // Let the UART drain before the reset cuts it off
        std::thread::sleep(Duration::from_millis(500));
        esp_idf_hal::reset::restart()
    }
}
