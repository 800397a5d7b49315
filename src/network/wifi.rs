use anyhow::{bail, Result};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

pub struct WifiManager {
    wifi: BlockingWifi<EspWifi<'static>>,
    pub ssid: String,
}

impl WifiManager {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        ssid: String,
        password: String,
    ) -> Result<Self> {
        log::info!("Initializing WiFi manager for SSID: '{}'", ssid);

        if ssid.is_empty() {
            log::error!("WiFi SSID is empty! Check wifi_config.h");
            bail!("WiFi SSID cannot be empty");
        }

        let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;

        let cfg = Configuration::Client(ClientConfiguration {
            ssid: ssid.as_str().try_into()
                .map_err(|e| {
                    log::error!("Failed to convert SSID '{}': {:?}", ssid, e);
                    anyhow::anyhow!("Invalid SSID format: {}", ssid)
                })?,
            password: password.as_str().try_into()
                .map_err(|e| {
                    log::error!("Failed to convert password: {:?}", e);
                    anyhow::anyhow!("Invalid password format")
                })?,
            auth_method: if password.is_empty() {
                log::warn!("WiFi password is empty, using open network");
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        esp_wifi.set_configuration(&cfg)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

        log::info!("WiFi manager initialized successfully");
        Ok(Self { wifi, ssid })
    }

    pub fn connect(&mut self) -> Result<()> {
        if !self.wifi.is_started()? {
            log::info!("Starting WiFi...");
            self.wifi.start()?;
        }

        log::info!("Connecting to {}...", self.ssid);
        self.wifi.connect()?;

        log::info!("Waiting for DHCP...");
        self.wifi.wait_netif_up()?;

        log::info!("WiFi connected! IP: {}", self.get_ip().unwrap_or_default());

        // Power save can drop the link in the middle of a firmware download
        unsafe {
            use esp_idf_sys::*;
            let result = esp_wifi_set_ps(wifi_ps_type_t_WIFI_PS_NONE);
            if result != ESP_OK {
                log::warn!("Failed to set WiFi power save mode: {:?}", result);
            }
        }

        Ok(())
    }

    /// Connect, retrying a few times with a growing delay.
    pub fn connect_with_retries(&mut self, max_attempts: u32) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_attempts => {
                    log::warn!("WiFi connect failed (attempt {}/{}): {:?}", attempt, max_attempts, e);
                    let _ = self.wifi.disconnect();
                    std::thread::sleep(std::time::Duration::from_secs(2 * attempt as u64));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    pub fn get_ip(&self) -> Option<String> {
        self.wifi.wifi().sta_netif().get_ip_info().ok()
            .map(|ip_info| format!("{}", ip_info.ip))
    }
}
