use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use ota_core::UpdaterConfig;
use serde::{Deserialize, Serialize};

const CONFIG_NAMESPACE: &str = "ota";
const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // WiFi settings
    pub wifi_ssid: String,
    pub wifi_password: String,

    // Update checker
    pub updater: UpdaterConfig,
}

impl Default for Config {
    fn default() -> Self {
        // Get WiFi credentials and manifest URL from environment variables set by build.rs
        // These come from wifi_config.h which should NOT be committed to git
        let wifi_ssid = env!("WIFI_SSID");
        let wifi_password = env!("WIFI_PASSWORD");

        log::info!("Config default: SSID='{}', Password={}",
            wifi_ssid,
            if wifi_password.is_empty() { "<empty>" } else { "<set>" }
        );

        Self {
            wifi_ssid: wifi_ssid.to_string(),
            wifi_password: wifi_password.to_string(),
            updater: UpdaterConfig {
                manifest_url: env!("OTA_MANIFEST_URL").to_string(),
                ..Default::default()
            },
        }
    }
}

impl Config {
    pub fn save(&self, nvs_partition: &EspDefaultNvsPartition) -> Result<()> {
        save_to_nvs(nvs_partition, self)?;
        log::info!("Configuration saved to NVS");
        Ok(())
    }
}

pub fn load_or_default(nvs_partition: &EspDefaultNvsPartition) -> Result<Config> {
    let config = match load_from_nvs(nvs_partition) {
        Ok(mut config) => {
            log::info!("Loaded configuration from NVS");

            // Fill anything NVS is missing from the compiled-in defaults
            let defaults = Config::default();
            let mut patched = false;
            if config.wifi_ssid.is_empty() || config.wifi_password.is_empty() {
                log::warn!("NVS WiFi credentials empty, using compiled defaults: SSID='{}'", defaults.wifi_ssid);
                config.wifi_ssid = defaults.wifi_ssid;
                config.wifi_password = defaults.wifi_password;
                patched = true;
            }
            if config.updater.manifest_url.is_empty() {
                config.updater.manifest_url = defaults.updater.manifest_url;
                patched = true;
            }

            if patched {
                if let Err(e) = config.save(nvs_partition) {
                    log::warn!("Failed to save updated config: {:?}", e);
                }
            }
            config
        }
        Err(e) => {
            log::warn!("Failed to load config from NVS: {:?}, using defaults", e);
            let config = Config::default();

            // Try to save default config to NVS for next time
            if let Err(save_err) = config.save(nvs_partition) {
                log::warn!("Failed to save default config to NVS: {:?}", save_err);
            }
            config
        }
    };

    Ok(config)
}

fn load_from_nvs(nvs_partition: &EspDefaultNvsPartition) -> Result<Config> {
    let nvs = EspNvs::new(nvs_partition.clone(), CONFIG_NAMESPACE, true)?;

    let mut buf = vec![0u8; 2048]; // Max config size
    let data = nvs.get_blob(CONFIG_KEY, &mut buf)?
        .ok_or_else(|| anyhow::anyhow!("Config not found in NVS"))?;

    let config: Config = serde_json::from_slice(data)?;

    Ok(config)
}

fn save_to_nvs(nvs_partition: &EspDefaultNvsPartition, config: &Config) -> Result<()> {
    let mut nvs = EspNvs::new(nvs_partition.clone(), CONFIG_NAMESPACE, false)?;

    let json = serde_json::to_vec(config)?;
    nvs.set_blob(CONFIG_KEY, &json)?;

    Ok(())
}
