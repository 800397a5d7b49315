//! Throttled check / update entry points
//!
//! One session lives for the whole process and owns the last-check
//! timestamp. Both entry points take `&mut self`, so overlapping checks are
//! impossible without the caller serializing them.

use std::time::Duration;

use log::{debug, error, info};

use crate::config::UpdaterConfig;
use crate::decision::{decide, Decision};
use crate::fetch::{ManifestFetcher, DEFAULT_REDIRECT_BUDGET};
use crate::install::FirmwareInstaller;
use crate::manifest::Manifest;
use crate::outcome::UpdateOutcome;
use crate::platform::{Device, HttpTransport, UpdateStorage};
use crate::policy::UrlPolicy;
use crate::version::VersionSpec;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub struct UpdateSession<H, S, D> {
    manifest_url: String,
    current: VersionSpec,
    fetcher: ManifestFetcher,
    check_interval_ms: u64,
    redirect_budget: u8,
    last_check_ms: Option<u64>,
    pending: Option<Manifest>,
    http: H,
    storage: S,
    device: D,
}

impl<H: HttpTransport, S: UpdateStorage, D: Device> UpdateSession<H, S, D> {
    /// The SSL policy and the version scheme are fixed here for the lifetime
    /// of the session.
    pub fn new(
        manifest_url: impl Into<String>,
        current: VersionSpec,
        http: H,
        storage: S,
        device: D,
    ) -> Self {
        let manifest_url = manifest_url.into();
        let fetcher = ManifestFetcher::new(UrlPolicy::for_root(&manifest_url), current.scheme());

        Self {
            manifest_url,
            current,
            fetcher,
            check_interval_ms: duration_ms(DEFAULT_CHECK_INTERVAL),
            redirect_budget: DEFAULT_REDIRECT_BUDGET,
            last_check_ms: None,
            pending: None,
            http,
            storage,
            device,
        }
    }

    pub fn from_config(
        config: &UpdaterConfig,
        current: VersionSpec,
        http: H,
        storage: S,
        device: D,
    ) -> Self {
        Self::new(config.manifest_url.clone(), current, http, storage, device)
            .with_check_interval(config.check_interval())
            .with_redirect_budget(config.redirect_budget)
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_redirect_budget(mut self, budget: u8) -> Self {
        self.redirect_budget = budget;
        self
    }

    pub fn current_version(&self) -> &VersionSpec {
        &self.current
    }

    pub fn policy(&self) -> UrlPolicy {
        self.fetcher.policy()
    }

    /// Time of the last check that reached the network, `None` if never.
    pub fn last_check_ms(&self) -> Option<u64> {
        self.last_check_ms
    }

    /// Manifest of the update found by the last `check`, if any.
    pub fn pending_manifest(&self) -> Option<&Manifest> {
        self.pending.as_ref()
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn log_versions(&self) {
        info!(
            "Running firmware {} ({} scheme), manifest {} ({:?}), checking every {}s",
            self.current,
            self.current.scheme(),
            self.manifest_url,
            self.policy(),
            self.check_interval_ms / 1000
        );
    }

    /// Look for newer firmware without installing it.
    ///
    /// Unless `force` is set, a check within the interval of the previous one
    /// is skipped without touching the network.
    pub fn check(&mut self, force: bool) -> UpdateOutcome {
        let now = self.device.now_ms();

        if !force {
            if let Some(last) = self.last_check_ms {
                let elapsed = now.saturating_sub(last);
                if elapsed < self.check_interval_ms {
                    debug!(
                        "Last update check {}ms ago, next in {}ms",
                        elapsed,
                        self.check_interval_ms - elapsed
                    );
                    return UpdateOutcome::ThrottledSkip;
                }
            }
        }

        if !self.device.is_connected() {
            error!("Wifi not connected");
            return UpdateOutcome::NetworkUnavailable;
        }

        info!("Checking for updates");
        self.last_check_ms = Some(now);
        self.pending = None;

        let manifest = match self
            .fetcher
            .fetch(&mut self.http, &self.manifest_url, self.redirect_budget)
        {
            Ok(manifest) => manifest,
            Err(e) => {
                error!("Update check failed: {}", e);
                return UpdateOutcome::from(&e);
            }
        };

        let decision = decide(&self.current, &manifest);
        debug!("Current version:    {}", self.current);
        debug!(
            "Update available:   {}",
            if decision == Decision::UpdateAvailable { "YES" } else { "NO" }
        );

        if decision == Decision::UpdateAvailable {
            self.pending = Some(manifest);
        }
        decision.into()
    }

    /// Check, and install when newer firmware is published. On success the
    /// device restarts and this never returns.
    pub fn check_and_update(&mut self, force: bool) -> UpdateOutcome {
        let outcome = self.check(force);
        if outcome != UpdateOutcome::UpdateAvailable {
            return outcome;
        }
        let Some(manifest) = self.pending.take() else {
            return outcome;
        };

        info!(
            "Update found ({} -> {} {}). Performing update",
            self.current, manifest.version, manifest.display_version
        );

        let policy = self.fetcher.policy();
        let mut installer = FirmwareInstaller::new(&mut self.http, &mut self.storage, policy);
        match installer.install(
            &mut self.device,
            &manifest.binary_url,
            manifest.checksum.as_ref(),
        ) {
            Ok(never) => match never {},
            Err(e) => {
                error!("Update failed: {}", e);
                UpdateOutcome::from(&e)
            }
        }
    }
}
