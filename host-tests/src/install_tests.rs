//! Firmware installer state machine

use ota_core::{
    Checksum, FirmwareInstaller, InstallError, InstallState, StorageError, UpdateOutcome,
    UrlPolicy,
};

use crate::mocks::{ends_in_restart, firmware_image, md5_of, MockDevice, MockHttp, MockStorage, Route};

const FW_URL: &str = "http://x/fw.bin";

fn serving(route: Route) -> MockHttp {
    MockHttp::new().route(FW_URL, route)
}

fn stage(
    http: &mut MockHttp,
    storage: &mut MockStorage,
    checksum: Option<&Checksum>,
) -> (Result<u64, InstallError>, InstallState) {
    let device = MockDevice::online();
    let mut installer = FirmwareInstaller::new(http, storage, UrlPolicy::AllowPlain);
    assert_eq!(installer.state(), InstallState::Idle);
    let result = installer.stage(&device, FW_URL, checksum);
    (result, installer.state())
}

#[test]
fn stages_image_without_checksum() {
    let image = firmware_image(10_000);
    let mut http = serving(Route::ok(image.clone()));
    let mut storage = MockStorage::default();

    let (result, state) = stage(&mut http, &mut storage, None);

    assert_eq!(result, Ok(10_000));
    assert_eq!(state, InstallState::Finalizing);
    assert_eq!(storage.image, Some(image));
    assert_eq!(storage.aborted, 0);
}

#[test]
fn stages_image_with_matching_checksum() {
    let image = firmware_image(9_000);
    let checksum = md5_of(&image);
    let mut http = serving(Route::ok(image));
    let mut storage = MockStorage::default();

    let (result, _) = stage(&mut http, &mut storage, Some(&checksum));

    assert_eq!(result, Ok(9_000));
    assert_eq!(storage.expected, Some(checksum));
    assert!(storage.committed());
}

#[test]
fn wrong_checksum_fails_at_finalize() {
    let mut http = serving(Route::ok(firmware_image(9_000)));
    let mut storage = MockStorage::default();
    let wrong = md5_of(b"not the image");

    let (result, state) = stage(&mut http, &mut storage, Some(&wrong));

    assert!(matches!(result, Err(InstallError::FinalizeFailed(StorageError::Finalize(_)))));
    assert_eq!(state, InstallState::Failed);
    assert!(!storage.committed());
    assert_eq!(storage.aborted, 1);
}

#[test]
fn rejected_checksum_registration_stops_before_begin() {
    let mut http = serving(Route::ok(firmware_image(512)));
    let mut storage = MockStorage {
        reject_checksum: true,
        ..MockStorage::default()
    };
    let checksum = md5_of(b"anything");

    let (result, state) = stage(&mut http, &mut storage, Some(&checksum));

    assert!(matches!(result, Err(InstallError::ChecksumRejected(_))));
    assert_eq!(state, InstallState::Failed);
    assert_eq!(storage.sessions_opened, 0);
    assert_eq!(
        UpdateOutcome::from(&result.unwrap_err()),
        UpdateOutcome::ChecksumRejected
    );
}

#[test]
fn image_larger_than_slot_is_insufficient_space() {
    let mut http = serving(Route::ok(firmware_image(4_096)));
    let mut storage = MockStorage::new(4_095);

    let (result, _) = stage(&mut http, &mut storage, None);

    assert_eq!(
        result,
        Err(InstallError::StorageInsufficient(StorageError::InsufficientSpace {
            needed: 4_096,
            available: 4_095,
        }))
    );
    assert_eq!(storage.sessions_opened, 0);
}

#[test]
fn image_filling_slot_exactly_fits() {
    let mut http = serving(Route::ok(firmware_image(4_096)));
    let mut storage = MockStorage::new(4_096);
    let (result, _) = stage(&mut http, &mut storage, None);
    assert_eq!(result, Ok(4_096));
}

#[test]
fn zero_or_unknown_length_is_payload_empty() {
    for declared in [Some(0), None] {
        let mut http = serving(Route::ok(firmware_image(128)).declared_len(declared));
        let mut storage = MockStorage::default();

        let (result, state) = stage(&mut http, &mut storage, None);

        assert_eq!(result, Err(InstallError::PayloadEmpty), "declared {:?}", declared);
        assert_eq!(state, InstallState::Failed);
        assert_eq!(storage.sessions_opened, 0);
    }
}

#[test]
fn body_shorter_than_declared_is_short_write() {
    let mut http = serving(Route::ok(firmware_image(6_000)).declared_len(Some(8_000)));
    let mut storage = MockStorage::default();

    let (result, state) = stage(&mut http, &mut storage, None);

    assert_eq!(
        result,
        Err(InstallError::ShortWrite {
            written: 6_000,
            expected: 8_000,
        })
    );
    assert_eq!(state, InstallState::Failed);
    assert_eq!(storage.aborted, 1);
    assert!(!storage.committed());
}

#[test]
fn stream_error_midway_is_short_write() {
    let mut http = serving(Route::ok(firmware_image(10_000)).fail_after(5_000));
    let mut storage = MockStorage::default();

    let (result, _) = stage(&mut http, &mut storage, None);

    assert_eq!(
        result,
        Err(InstallError::ShortWrite {
            written: 5_000,
            expected: 10_000,
        })
    );
    assert_eq!(storage.aborted, 1);
}

#[test]
fn flash_write_failure_is_short_write() {
    let mut http = serving(Route::ok(firmware_image(10_000)));
    let mut storage = MockStorage {
        fail_write_at: Some(4_096 * 2),
        ..MockStorage::default()
    };

    let (result, _) = stage(&mut http, &mut storage, None);

    assert_eq!(
        result,
        Err(InstallError::ShortWrite {
            written: 4_096 * 2,
            expected: 10_000,
        })
    );
    assert!(!storage.committed());
}

#[test]
fn body_longer_than_declared_is_capped() {
    let image = firmware_image(3_000);
    let mut http = serving(Route::ok(firmware_image(5_000)).declared_len(Some(3_000)));
    let mut storage = MockStorage::default();

    let (result, _) = stage(&mut http, &mut storage, None);

    assert_eq!(result, Ok(3_000));
    assert_eq!(storage.image, Some(image));
}

#[test]
fn driver_error_on_finalize_is_reported() {
    let mut http = serving(Route::ok(firmware_image(1_000)));
    let mut storage = MockStorage {
        driver_error_on_finalize: Some("ESP_ERR_OTA_VALIDATE_FAILED".to_string()),
        ..MockStorage::default()
    };

    let (result, _) = stage(&mut http, &mut storage, None);

    assert_eq!(
        result,
        Err(InstallError::FinalizeFailed(StorageError::Driver(
            "ESP_ERR_OTA_VALIDATE_FAILED".to_string()
        )))
    );
}

#[test]
fn non_200_status_is_reported() {
    let mut http = serving(Route::status(403));
    let mut storage = MockStorage::default();
    let (result, state) = stage(&mut http, &mut storage, None);
    assert_eq!(result, Err(InstallError::Status(403)));
    assert_eq!(state, InstallState::Failed);
}

#[test]
fn disconnected_device_fails_before_request() {
    let mut http = serving(Route::ok(firmware_image(64)));
    let mut storage = MockStorage::default();
    let device = MockDevice::offline();

    let mut installer = FirmwareInstaller::new(&mut http, &mut storage, UrlPolicy::AllowPlain);
    let result = installer.stage(&device, FW_URL, None);

    assert_eq!(result, Err(InstallError::NotConnected));
    assert_eq!(installer.state(), InstallState::Failed);
    assert!(http.requests.is_empty());
}

#[test]
fn empty_url_fails_before_request() {
    let mut http = MockHttp::new();
    let mut storage = MockStorage::default();
    let device = MockDevice::online();

    let mut installer = FirmwareInstaller::new(&mut http, &mut storage, UrlPolicy::AllowPlain);
    assert_eq!(installer.stage(&device, "", None), Err(InstallError::MissingUrl));
    assert!(http.requests.is_empty());
}

#[test]
fn secure_policy_rejects_plain_url() {
    let mut http = serving(Route::ok(firmware_image(64)));
    let mut storage = MockStorage::default();
    let device = MockDevice::online();

    let mut installer = FirmwareInstaller::new(&mut http, &mut storage, UrlPolicy::RequireHttps);
    assert_eq!(
        installer.stage(&device, FW_URL, None),
        Err(InstallError::InsecureUrl(FW_URL.to_string()))
    );
    assert!(http.requests.is_empty());
}

#[test]
fn install_restarts_after_commit() {
    let image = firmware_image(2_000);
    let mut http = serving(Route::ok(image.clone()));
    let mut storage = MockStorage::default();
    let mut device = MockDevice::online();
    let mut state = InstallState::Idle;

    let restarted = ends_in_restart(|| {
        let mut installer = FirmwareInstaller::new(&mut http, &mut storage, UrlPolicy::AllowPlain);
        // Publish the state before `install` diverges
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            installer.install(&mut device, FW_URL, None)
        }));
        state = installer.state();
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    });

    assert!(restarted);
    assert_eq!(state, InstallState::Rebooting);
    assert_eq!(device.restarts, 1);
    assert_eq!(storage.image, Some(image));
}

#[test]
fn failed_install_does_not_restart() {
    let mut http = serving(Route::status(500));
    let mut storage = MockStorage::default();
    let mut device = MockDevice::online();

    let mut installer = FirmwareInstaller::new(&mut http, &mut storage, UrlPolicy::AllowPlain);
    let result = installer.install(&mut device, FW_URL, None);

    assert_eq!(result.err(), Some(InstallError::Status(500)));
    assert_eq!(device.restarts, 0);
}
