//! End-to-end check / update cycles against scripted collaborators

use ota_core::{parse_semver, UpdateOutcome, UpdateSession, VersionSpec};

use crate::mocks::{ends_in_restart, firmware_image, md5_of, MockDevice, MockHttp, MockStorage, Route};

const CFG_URL: &str = "http://x/cfg.txt";
const FW_URL: &str = "http://x/fw.bin";

fn session(
    current: VersionSpec,
    http: MockHttp,
) -> UpdateSession<MockHttp, MockStorage, MockDevice> {
    UpdateSession::new(CFG_URL, current, http, MockStorage::default(), MockDevice::online())
}

#[test]
fn newer_counter_triggers_install_without_checksum() {
    let image = firmware_image(10_000);
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n5\n\n\n"))
        .route(FW_URL, Route::ok(image.clone()));
    let mut session = session(VersionSpec::Counter(3), http);

    assert_eq!(session.check(false), UpdateOutcome::UpdateAvailable);
    let pending = session.pending_manifest().unwrap();
    assert_eq!(pending.binary_url, FW_URL);
    assert_eq!(pending.checksum, None);

    assert!(ends_in_restart(|| session.check_and_update(true)));
    assert_eq!(session.http().requests, vec![CFG_URL, CFG_URL, FW_URL]);
    assert_eq!(session.storage().expected, None);
    assert_eq!(session.storage().image.as_deref(), Some(image.as_slice()));
    assert_eq!(session.device().restarts, 1);
}

#[test]
fn older_counter_is_up_to_date() {
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n2\n\n\n"))
        .route(FW_URL, Route::ok(firmware_image(64)));
    let mut session = session(VersionSpec::Counter(5), http);

    assert_eq!(session.check_and_update(false), UpdateOutcome::UpToDate);
    assert!(!session.http().requested(FW_URL));
    assert_eq!(session.storage().sessions_opened, 0);
    assert!(session.pending_manifest().is_none());
}

#[test]
fn equal_counter_is_up_to_date() {
    let http = MockHttp::new().route(CFG_URL, Route::ok("http://x/fw.bin\n5\n\n\n"));
    let mut session = session(VersionSpec::Counter(5), http);
    assert_eq!(session.check(false), UpdateOutcome::UpToDate);
}

#[test]
fn short_checksum_rejected_before_download() {
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n5\ndeadbeef\n\n"))
        .route(FW_URL, Route::ok(firmware_image(64)));
    let mut session = session(VersionSpec::Counter(3), http);

    assert_eq!(session.check_and_update(false), UpdateOutcome::ChecksumRejected);
    assert!(!session.http().requested(FW_URL));
    assert_eq!(session.storage().sessions_opened, 0);
}

#[test]
fn matching_checksum_is_registered_and_verified() {
    let image = firmware_image(5_000);
    let body = format!("http://x/fw.bin\n7\n{}\nv7 nightly\n", md5_of(&image));
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok(body))
        .route(FW_URL, Route::ok(image.clone()));
    let mut session = session(VersionSpec::Counter(6), http);

    assert!(ends_in_restart(|| session.check_and_update(false)));
    assert_eq!(session.storage().expected, Some(md5_of(&image)));
    assert!(session.storage().committed());
}

#[test]
fn mismatching_checksum_fails_finalize() {
    let image = firmware_image(5_000);
    let body = format!("http://x/fw.bin\n7\n{}\n\n", md5_of(b"something else"));
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok(body))
        .route(FW_URL, Route::ok(image));
    let mut session = session(VersionSpec::Counter(6), http);

    let mut outcome = UpdateOutcome::UpdateApplied;
    assert!(!ends_in_restart(|| outcome = session.check_and_update(false)));
    assert_eq!(outcome, UpdateOutcome::FinalizeFailed);
    assert!(!session.storage().committed());
    assert_eq!(session.device().restarts, 0);
}

#[test]
fn semver_session_installs_newer_patch() {
    let image = firmware_image(2_048);
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n1.2.4a\n\n1.2.4 alpha\n"))
        .route(FW_URL, Route::ok(image));
    let current = VersionSpec::SemVer(parse_semver("1.2.3b").unwrap());
    let mut session = session(current, http);

    assert_eq!(session.check(false), UpdateOutcome::UpdateAvailable);
    assert_eq!(
        session.pending_manifest().map(|m| m.display_version.as_str()),
        Some("1.2.4 alpha")
    );
}

#[test]
fn semver_session_rejects_counter_manifest() {
    let http = MockHttp::new().route(CFG_URL, Route::ok("http://x/fw.bin\n5\n\n\n"));
    let current = VersionSpec::SemVer(parse_semver("1.0.0a").unwrap());
    let mut session = session(current, http);

    assert_eq!(session.check(false), UpdateOutcome::ManifestMalformed);
}

#[test]
fn manifest_without_binary_url_is_malformed() {
    let http = MockHttp::new().route(CFG_URL, Route::ok("\n5\n\n\n"));
    let mut session = session(VersionSpec::Counter(1), http);
    assert_eq!(session.check(false), UpdateOutcome::ManifestMalformed);
}

#[test]
fn server_error_is_transport_failure() {
    let http = MockHttp::new().route(CFG_URL, Route::status(500));
    let mut session = session(VersionSpec::Counter(1), http);
    assert_eq!(session.check(false), UpdateOutcome::TransportFailure);
}

#[test]
fn unreachable_server_is_transport_failure() {
    let mut session = session(VersionSpec::Counter(1), MockHttp::new());
    assert_eq!(session.check(false), UpdateOutcome::TransportFailure);
    assert!(session.last_check_ms().is_some());
}

#[test]
fn download_failure_surfaces_as_outcome() {
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n5\n\n\n"))
        .route(FW_URL, Route::status(404));
    let mut session = session(VersionSpec::Counter(3), http);

    assert_eq!(session.check_and_update(false), UpdateOutcome::TransportFailure);
    assert!(session.pending_manifest().is_none());
}

#[test]
fn insufficient_space_surfaces_as_outcome() {
    let http = MockHttp::new()
        .route(CFG_URL, Route::ok("http://x/fw.bin\n5\n\n\n"))
        .route(FW_URL, Route::ok(firmware_image(4_096)));
    let mut session = UpdateSession::new(
        CFG_URL,
        VersionSpec::Counter(3),
        http,
        MockStorage::new(1_024),
        MockDevice::online(),
    );

    assert_eq!(session.check_and_update(false), UpdateOutcome::StorageInsufficient);
    assert_eq!(session.storage().sessions_opened, 0);
}
