use std::env;
use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Necessary for ESP-IDF; host builds of the workspace skip it
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();

        // Add crash log helper for better panic diagnostics
        println!("cargo:rustc-link-arg=-Wl,--undefined=esp_backtrace_print_app_description");
    }

    // Read WiFi configuration if it exists
    let wifi_config_path = "wifi_config.h";
    println!("cargo:rerun-if-changed={}", wifi_config_path);
    if Path::new(wifi_config_path).exists() {
        let contents = fs::read_to_string(wifi_config_path)?;

        for (define, var) in [
            ("#define WIFI_SSID", "WIFI_SSID"),
            ("#define WIFI_PASSWORD", "WIFI_PASSWORD"),
            ("#define OTA_MANIFEST_URL", "OTA_MANIFEST_URL"),
        ] {
            let value = contents
                .lines()
                .find(|l| l.contains(define))
                .and_then(|l| l.split('"').nth(1))
                .unwrap_or("");
            println!("cargo:rustc-env={}={}", var, value);
        }
    } else {
        // Use empty defaults if no config file
        println!("cargo:rustc-env=WIFI_SSID=");
        println!("cargo:rustc-env=WIFI_PASSWORD=");
        println!("cargo:rustc-env=OTA_MANIFEST_URL=");
        println!("cargo:warning=wifi_config.h not found! Copy wifi_config.h.example to wifi_config.h and add your credentials.");
    }

    // Version the update server compares against: "7" or "1.2.3a"
    println!("cargo:rerun-if-env-changed=OTA_FIRMWARE_VERSION");
    let firmware_version = env::var("OTA_FIRMWARE_VERSION").unwrap_or_else(|_| "1".to_string());
    println!("cargo:rustc-env=OTA_FIRMWARE_VERSION={}", firmware_version);

    Ok(())
}
