// ESP-IDF implementations of the update collaborators

pub mod device;
pub mod http;
pub mod storage;

pub use device::EspDevice;
pub use http::EspHttpTransport;
pub use storage::EspOtaStorage;

use anyhow::Result;
use esp_idf_svc::ota::EspOta;

/// Confirm the running image so the bootloader does not roll it back.
///
/// Only matters right after an update, when the slot is still pending
/// verification; on a confirmed slot ESP-IDF treats it as a no-op.
pub fn mark_running_slot_valid() -> Result<()> {
    let mut ota = EspOta::new()?;
    let slot = ota.get_running_slot()?;
    log::info!(
        "Running from partition '{}' (state {:?}, image version {})",
        slot.label,
        slot.state,
        slot.firmware
            .as_ref()
            .map(|fw| fw.version.as_str())
            .unwrap_or("unknown")
    );

    ota.mark_running_slot_valid()?;
    log::info!("Running firmware confirmed");
    Ok(())
}
