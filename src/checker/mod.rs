//! Geofence check orchestration.
//!
//! Check flow:  target? → coordinates eligible? → zero-radius bypass →
//! device position (with deadline) → distance vs radius → outcome.
//!
//! No branch returns an error to the caller; every path ends in a
//! [`CheckOutcome`] and leaves the session out of `Checking`. A check
//! future dropped mid-flight returns the session to `Idle`.

pub mod observer;
pub mod outcome;
pub mod session;

pub use observer::{CheckObserver, LogNotifier, Notifier, NoopObserver};
pub use outcome::{CheckError, CheckOutcome, CheckStatus, LocationCheckResult};
pub use session::{Advisory, CheckEvent, CheckPhase, PositionInfo, Session};

use crate::config::Settings;
use crate::geo::round_meters;
use crate::position::{fix_channel, PositionSource, WaitError};
use crate::site::{filter_sites, try_parse_coordinates, DirectoryError, SelectionStore, SiteDirectory, SiteLocation};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing and alert policy.
#[derive(Debug, Clone)]
pub struct CheckerOptions {
    pub position_timeout: Duration,
    pub select_check_delay: Duration,
    pub advisory_ttl: Duration,
    pub show_alerts: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for CheckerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            position_timeout: settings.position_timeout(),
            select_check_delay: settings.select_check_delay(),
            advisory_ttl: settings.advisory_ttl(),
            show_alerts: settings.show_alerts,
        }
    }
}

/// Leaves `Checking` if the check future is dropped before it settles.
struct InFlight<'a> {
    checker: &'a mut GeofenceChecker,
    attempt: u64,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(attempt = self.attempt, "Check dropped before completion");
            self.checker.session = std::mem::take(&mut self.checker.session).cancel();
        }
    }
}

/// The geofence checker and its session.
pub struct GeofenceChecker {
    directory: Arc<dyn SiteDirectory>,
    source: Arc<dyn PositionSource>,
    store: SelectionStore,
    observer: Arc<dyn CheckObserver>,
    notifier: Arc<dyn Notifier>,
    options: CheckerOptions,
    sites: Vec<SiteLocation>,
    session: Session,
}

impl GeofenceChecker {
    pub fn new(directory: Arc<dyn SiteDirectory>, source: Arc<dyn PositionSource>, store: SelectionStore) -> Self {
        Self {
            directory,
            source,
            store,
            observer: Arc::new(NoopObserver),
            notifier: Arc::new(LogNotifier),
            options: CheckerOptions::default(),
            sites: Vec::new(),
            session: Session::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CheckObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_options(mut self, options: CheckerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_checking(&self) -> bool {
        self.session.checking
    }

    pub fn target(&self) -> Option<&SiteLocation> {
        self.session.target.as_ref()
    }

    // ─── Lifecycle ──────────────────────────────────────────────

    /// Restore the persisted selection, if any.
    pub fn mount(&mut self) -> Option<&SiteLocation> {
        if let Some(site) = self.store.current_office_location() {
            debug!(project = %site.project_no, "Restored persisted site");
            self.session = std::mem::take(&mut self.session).select(site);
        }
        self.session.target.as_ref()
    }

    /// Fetch candidate sites from the directory.
    pub fn load_sites(&mut self) -> Result<&[SiteLocation], DirectoryError> {
        self.sites = self.directory.fetch_sites()?;
        info!(count = self.sites.len(), "Loaded site directory");
        Ok(&self.sites)
    }

    pub fn sites(&self) -> &[SiteLocation] {
        &self.sites
    }

    pub fn search_sites(&self, query: &str) -> Vec<&SiteLocation> {
        filter_sites(&self.sites, query)
    }

    /// Make `site` the target and persist it. Returns how long to wait
    /// before checking it.
    pub fn select_site(&mut self, site: SiteLocation) -> Duration {
        self.observer.on_radius_update(site.checkin_radius.meters());
        self.adopt(site)
    }

    /// Select, wait the configured delay, then check. The radius is
    /// reported once, by the check.
    pub async fn select_and_check(&mut self, site: SiteLocation) -> CheckOutcome {
        let delay = self.adopt(site);
        tokio::time::sleep(delay).await;
        self.check_location_distance(None).await
    }

    fn adopt(&mut self, site: SiteLocation) -> Duration {
        if let Err(e) = self.store.save_current_office_location(&site) {
            warn!(error = %e, project = %site.project_no, "Failed to persist selected site");
        }
        info!(project = %site.project_no, radius = site.checkin_radius.meters(), "Site selected");
        self.session = std::mem::take(&mut self.session).select(site);
        self.options.select_check_delay
    }

    /// Check the current target again.
    pub async fn retry(&mut self) -> CheckOutcome {
        self.check_location_distance(None).await
    }

    /// Drop the target and result and go back to site selection.
    pub fn change_location(&mut self) {
        debug!("Returning to site selection");
        self.session = std::mem::take(&mut self.session).reset();
    }

    pub fn dismiss_advisory(&mut self) {
        self.session = std::mem::take(&mut self.session).dismiss_advisory();
    }

    pub fn active_advisory(&self, now: DateTime<Utc>) -> Option<&Advisory> {
        self.session.active_advisory(now)
    }

    // ─── The check ──────────────────────────────────────────────

    /// Run one check against `target`, or the current target when `None`.
    pub async fn check_location_distance(&mut self, target: Option<SiteLocation>) -> CheckOutcome {
        if let Some(site) = target {
            self.session.target = Some(site);
        }
        self.session = std::mem::take(&mut self.session).begin();
        let attempt = self.session.attempt;

        let mut in_flight = InFlight {
            checker: &mut *self,
            attempt,
            finished: false,
        };
        let outcome = in_flight.checker.run_check(attempt).await;
        in_flight.finished = true;
        drop(in_flight);

        let advisory = match &outcome {
            CheckOutcome::Denied(result) => Some(self.advisory_for(result)),
            _ => None,
        };
        self.session = std::mem::take(&mut self.session).settle(&outcome, advisory);
        self.notify(&outcome);
        outcome
    }

    async fn run_check(&mut self, attempt: u64) -> CheckOutcome {
        let Some(site) = self.session.target.clone() else {
            info!(attempt, "Check requested without a target site");
            return CheckOutcome::Rejected {
                error: CheckError::NoTarget,
                result: None,
            };
        };

        if !site.has_valid_coordinates() {
            return self.reject_invalid(site);
        }

        if site.checkin_radius.is_bypass() {
            return self.bypass(site);
        }

        let Some(target) = site.target_coordinates() else {
            return self.reject_invalid(site);
        };

        let radius = site.checkin_radius.meters();
        self.observer.on_radius_update(radius);
        debug!(attempt, project = %site.project_no, radius, "Requesting device position");

        let (sink, pending) = fix_channel(attempt);
        if let Err(e) = self.source.request_position(sink) {
            warn!(attempt, error = %e, "Position request failed to start");
            return CheckOutcome::Error(CheckError::position_source(e.to_string()));
        }

        let fix = match pending.wait(self.options.position_timeout).await {
            Ok(fix) => fix,
            Err(WaitError::TimedOut(after)) => {
                warn!(attempt, timeout_ms = after.as_millis() as u64, "Position request timed out");
                return CheckOutcome::Error(CheckError::Timeout(after));
            }
            Err(WaitError::Source(message)) => {
                warn!(attempt, error = %message, "Position source reported an error");
                return CheckOutcome::Error(CheckError::position_source(message));
            }
            Err(WaitError::Abandoned) => {
                warn!(attempt, "Position source abandoned the request");
                return CheckOutcome::Error(CheckError::position_source(""));
            }
        };

        let position = PositionInfo::from(&fix);
        self.session = std::mem::take(&mut self.session).with_position(position.clone());
        self.observer.on_location_update(&position);

        let Some(current) = try_parse_coordinates(&fix.coordinates) else {
            warn!(attempt, raw = %fix.coordinates, "Unreadable device coordinates");
            return CheckOutcome::Error(CheckError::position_source(format!(
                "Position source returned unreadable coordinates '{}'",
                fix.coordinates
            )));
        };

        let distance = round_meters(current.distance_to(&target));
        let can_access = distance as f64 <= radius;
        info!(
            attempt,
            project = %site.project_no,
            distance_m = distance,
            radius_m = radius,
            granted = can_access,
            "Geofence check complete"
        );

        let result = LocationCheckResult {
            distance_meters: Some(distance),
            can_access,
            location_name: fix.name.unwrap_or_default(),
            coordinates: fix.coordinates,
            address: fix.address.unwrap_or_default(),
            selected_site: site,
            status: if can_access { CheckStatus::Success } else { CheckStatus::Failed },
            radius_meters: radius,
            checked_at: Utc::now(),
        };

        self.observer.on_location_check(&result);
        if can_access {
            self.observer.on_access_granted(&result);
            CheckOutcome::Granted(result)
        } else {
            self.observer.on_access_denied(&result);
            CheckOutcome::Denied(result)
        }
    }

    /// Coordinates missing or unusable: deny without asking for a position.
    fn reject_invalid(&self, site: SiteLocation) -> CheckOutcome {
        warn!(project = %site.project_no, "Site has no usable coordinates");
        let error = CheckError::InvalidCoordinates {
            project_no: site.project_no.clone(),
        };
        let result = LocationCheckResult {
            distance_meters: None,
            can_access: false,
            location_name: String::new(),
            coordinates: String::new(),
            address: String::new(),
            radius_meters: site.checkin_radius.meters(),
            selected_site: site,
            status: CheckStatus::Failed,
            checked_at: Utc::now(),
        };
        self.observer.on_location_check(&result);
        self.observer.on_access_denied(&result);
        CheckOutcome::Rejected {
            error,
            result: Some(result),
        }
    }

    /// Zero radius: geofencing disabled, access granted at distance 0.
    fn bypass(&self, site: SiteLocation) -> CheckOutcome {
        info!(project = %site.project_no, "Zero check-in radius, skipping position check");
        self.observer.on_radius_update(0.0);

        let coordinates = match site.target_coordinates() {
            Some(c) => c.to_string(),
            None => site.gps_location.clone().unwrap_or_default(),
        };
        let position = PositionInfo {
            name: Some(site.display_name()),
            coordinates: coordinates.clone(),
            address: Some(site.site_location.clone()),
        };
        let result = LocationCheckResult {
            distance_meters: Some(0),
            can_access: true,
            location_name: site.display_name(),
            coordinates,
            address: site.site_location.clone(),
            selected_site: site,
            status: CheckStatus::Success,
            radius_meters: 0.0,
            checked_at: Utc::now(),
        };

        self.observer.on_location_check(&result);
        self.observer.on_access_granted(&result);
        self.observer.on_location_update(&position);
        CheckOutcome::Granted(result)
    }

    fn advisory_for(&self, result: &LocationCheckResult) -> Advisory {
        let message = format!(
            "You are {} m from {}. Move within {} m and retry.",
            result.distance_meters.unwrap_or_default(),
            result.selected_site.display_name(),
            result.radius_meters,
        );
        let raised_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.options.advisory_ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Advisory {
            message,
            raised_at,
            expires_at: raised_at + ttl,
        }
    }

    fn notify(&self, outcome: &CheckOutcome) {
        match outcome {
            CheckOutcome::Granted(_) => {}
            CheckOutcome::Denied(_) => {
                if let Some(ref advisory) = self.session.advisory {
                    self.notifier.advisory(&advisory.message);
                }
            }
            CheckOutcome::Rejected { error, .. } | CheckOutcome::Error(error) => {
                if self.options.show_alerts {
                    self.notifier.alert(error.title(), &error.to_string());
                } else {
                    debug!(error = %error, "Alert suppressed");
                }
            }
        }
    }
}
