// OTA slot access through the ESP-IDF OTA API

use core::ffi::c_void;
use core::marker::PhantomData;

use esp_idf_sys::{
    esp, esp_ota_abort, esp_ota_begin, esp_ota_end, esp_ota_get_next_update_partition,
    esp_ota_handle_t, esp_ota_set_boot_partition, esp_ota_write, esp_partition_t,
};
use ota_core::{Checksum, Md5Verifier, StorageError, UpdateStorage, UpdateWriter};

/// The inactive OTA partition. The MD5 registered through
/// `set_expected_checksum` applies to the next write session only.
#[derive(Default)]
pub struct EspOtaStorage {
    expected: Option<Checksum>,
}

impl EspOtaStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct EspOtaWriter<'a> {
    partition: *const esp_partition_t,
    handle: esp_ota_handle_t,
    expected: Option<Checksum>,
    verifier: Md5Verifier,
    closed: bool,
    _slot: PhantomData<&'a mut EspOtaStorage>,
}

impl UpdateStorage for EspOtaStorage {
    type Writer<'a> = EspOtaWriter<'a>;

    fn set_expected_checksum(&mut self, checksum: &Checksum) -> Result<(), StorageError> {
        self.expected = Some(checksum.clone());
        Ok(())
    }

    fn begin(&mut self, size: u64) -> Result<EspOtaWriter<'_>, StorageError> {
        let expected = self.expected.take();

        let partition = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        if partition.is_null() {
            return Err(StorageError::Driver("no OTA update partition".to_string()));
        }

        let available = unsafe { (*partition).size } as u64;
        if size > available {
            return Err(StorageError::InsufficientSpace {
                needed: size,
                available,
            });
        }

        let mut handle: esp_ota_handle_t = 0;
        esp!(unsafe { esp_ota_begin(partition, size as usize, &mut handle) })
            .map_err(|e| StorageError::Driver(e.to_string()))?;

        log::info!("OTA session opened for {} bytes ({} available)", size, available);
        Ok(EspOtaWriter {
            partition,
            handle,
            expected,
            verifier: Md5Verifier::new(),
            closed: false,
            _slot: PhantomData,
        })
    }
}

impl UpdateWriter for EspOtaWriter<'_> {
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        esp!(unsafe { esp_ota_write(self.handle, chunk.as_ptr() as *const c_void, chunk.len()) })
            .map_err(|e| StorageError::Write(e.to_string()))?;
        self.verifier.update(chunk);
        Ok(())
    }

    fn finalize(mut self) -> Result<(), StorageError> {
        if let Some(expected) = self.expected.take() {
            let verifier = core::mem::take(&mut self.verifier);
            if let Err(e) = verifier.verify(&expected) {
                // Drop aborts the session
                return Err(StorageError::Finalize(e.to_string()));
            }
        }

        // esp_ota_end releases the handle whether or not it succeeds
        self.closed = true;
        esp!(unsafe { esp_ota_end(self.handle) })
            .map_err(|e| StorageError::Finalize(e.to_string()))?;

        esp!(unsafe { esp_ota_set_boot_partition(self.partition) })
            .map_err(|e| StorageError::Driver(e.to_string()))?;

        Ok(())
    }
}

impl Drop for EspOtaWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("Aborting unfinished OTA session");
            unsafe {
                esp_ota_abort(self.handle);
            }
        }
    }
}
