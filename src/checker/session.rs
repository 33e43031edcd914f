//! Session state for one checker: a plain value with pure transitions.
//!
//! Phases:
//!
//! ```text
//! Idle ──Begin──▶ Checking ──Completed(success)──▶ Success
//!                    │      ──Completed(failed)───▶ Failed
//!                    │      ──Rejected────────────▶ Invalid
//!                    │      ──Errored─────────────▶ Error
//!                    └──────Cancelled─────────────▶ Idle
//! any ──Begin──▶ Checking        any ──Reset──▶ Idle
//! ```

use super::outcome::{CheckError, CheckOutcome, CheckStatus, LocationCheckResult};
use crate::position::PositionFix;
use crate::site::SiteLocation;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckPhase {
    #[default]
    Idle,
    Checking,
    Success,
    Failed,
    Invalid,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckEvent {
    Begin,
    Completed(CheckStatus),
    Rejected,
    Errored,
    Cancelled,
    Reset,
}

impl CheckPhase {
    pub fn apply(self, event: CheckEvent) -> CheckPhase {
        match (self, event) {
            (_, CheckEvent::Reset) => Self::Idle,
            (_, CheckEvent::Begin) => Self::Checking,
            (Self::Checking, CheckEvent::Completed(CheckStatus::Success)) => Self::Success,
            (Self::Checking, CheckEvent::Completed(CheckStatus::Failed)) => Self::Failed,
            (Self::Checking, CheckEvent::Rejected) => Self::Invalid,
            (Self::Checking, CheckEvent::Errored) => Self::Error,
            (Self::Checking, CheckEvent::Cancelled) => Self::Idle,
            (other, _) => other,
        }
    }
}

/// Position details reported through `on_location_update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionInfo {
    pub name: Option<String>,
    pub coordinates: String,
    pub address: Option<String>,
}

impl From<&PositionFix> for PositionInfo {
    fn from(fix: &PositionFix) -> Self {
        Self {
            name: fix.name.clone(),
            coordinates: fix.coordinates.clone(),
            address: fix.address.clone(),
        }
    }
}

/// Dismissible, self-expiring notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Advisory {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub phase: CheckPhase,
    pub checking: bool,
    pub target: Option<SiteLocation>,
    pub last_result: Option<LocationCheckResult>,
    pub last_error: Option<CheckError>,
    pub position: Option<PositionInfo>,
    pub advisory: Option<Advisory>,
    /// Attempts started in this session; tags position requests.
    pub attempt: u64,
}

impl Session {
    /// A new target; anything learned about the previous one is dropped.
    pub fn select(self, site: SiteLocation) -> Self {
        Self {
            phase: self.phase.apply(CheckEvent::Reset),
            target: Some(site),
            attempt: self.attempt,
            ..Self::default()
        }
    }

    /// Enter `Checking`. The previous result does not survive the attempt.
    pub fn begin(self) -> Self {
        Self {
            phase: self.phase.apply(CheckEvent::Begin),
            checking: true,
            last_result: None,
            last_error: None,
            advisory: None,
            position: None,
            attempt: self.attempt + 1,
            ..self
        }
    }

    pub fn with_position(self, position: PositionInfo) -> Self {
        Self {
            position: Some(position),
            ..self
        }
    }

    /// Leave `Checking` with the attempt's outcome. Always clears the
    /// checking flag.
    pub fn settle(self, outcome: &CheckOutcome, advisory: Option<Advisory>) -> Self {
        let event = match outcome {
            CheckOutcome::Granted(_) => CheckEvent::Completed(CheckStatus::Success),
            CheckOutcome::Denied(_) => CheckEvent::Completed(CheckStatus::Failed),
            CheckOutcome::Rejected { .. } => CheckEvent::Rejected,
            CheckOutcome::Error(_) => CheckEvent::Errored,
        };
        Self {
            phase: self.phase.apply(event),
            checking: false,
            last_result: outcome.result().cloned(),
            last_error: outcome.error().cloned(),
            advisory,
            ..self
        }
    }

    /// The attempt was dropped before it settled. Keeps the target.
    pub fn cancel(self) -> Self {
        Self {
            phase: self.phase.apply(CheckEvent::Cancelled),
            checking: false,
            ..self
        }
    }

    /// Back to the picker: no target, no result.
    pub fn reset(self) -> Self {
        Self {
            phase: self.phase.apply(CheckEvent::Reset),
            attempt: self.attempt,
            ..Self::default()
        }
    }

    pub fn dismiss_advisory(self) -> Self {
        Self {
            advisory: None,
            ..self
        }
    }

    pub fn active_advisory(&self, now: DateTime<Utc>) -> Option<&Advisory> {
        self.advisory.as_ref().filter(|a| a.is_active(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn site() -> SiteLocation {
        SiteLocation {
            project_no: "P-1".into(),
            gps_location: Some("1,2".into()),
            ..Default::default()
        }
    }

    fn result(status: CheckStatus) -> LocationCheckResult {
        LocationCheckResult {
            distance_meters: Some(10),
            can_access: status == CheckStatus::Success,
            location_name: String::new(),
            coordinates: "1,2".into(),
            address: String::new(),
            selected_site: site(),
            status,
            radius_meters: 50.0,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_phase_transitions() {
        use CheckEvent::*;
        assert_eq!(CheckPhase::Idle.apply(Begin), CheckPhase::Checking);
        assert_eq!(CheckPhase::Checking.apply(Completed(CheckStatus::Success)), CheckPhase::Success);
        assert_eq!(CheckPhase::Checking.apply(Completed(CheckStatus::Failed)), CheckPhase::Failed);
        assert_eq!(CheckPhase::Checking.apply(Rejected), CheckPhase::Invalid);
        assert_eq!(CheckPhase::Checking.apply(Errored), CheckPhase::Error);
        assert_eq!(CheckPhase::Failed.apply(Begin), CheckPhase::Checking);
        assert_eq!(CheckPhase::Error.apply(Reset), CheckPhase::Idle);
        assert_eq!(CheckPhase::Checking.apply(Cancelled), CheckPhase::Idle);
        assert_eq!(CheckPhase::Success.apply(Cancelled), CheckPhase::Success);
    }

    #[test]
    fn test_cancel_clears_checking() {
        let s = Session::default().select(site()).begin().cancel();
        assert!(!s.checking);
        assert_eq!(s.phase, CheckPhase::Idle);
        assert!(s.target.is_some());
        assert!(s.last_result.is_none());
    }

    #[test]
    fn test_completion_outside_checking_is_ignored() {
        assert_eq!(CheckPhase::Idle.apply(CheckEvent::Errored), CheckPhase::Idle);
        assert_eq!(
            CheckPhase::Success.apply(CheckEvent::Completed(CheckStatus::Failed)),
            CheckPhase::Success
        );
    }

    #[test]
    fn test_begin_and_settle() {
        let s = Session::default().select(site()).begin();
        assert!(s.checking);
        assert_eq!(s.phase, CheckPhase::Checking);
        assert_eq!(s.attempt, 1);

        let s = s.settle(&CheckOutcome::Granted(result(CheckStatus::Success)), None);
        assert!(!s.checking);
        assert_eq!(s.phase, CheckPhase::Success);
        assert!(s.last_result.is_some());
        assert!(s.last_error.is_none());
    }

    #[test]
    fn test_retry_replaces_result() {
        let s = Session::default()
            .select(site())
            .begin()
            .settle(&CheckOutcome::Denied(result(CheckStatus::Failed)), None)
            .begin();
        assert!(s.last_result.is_none());
        assert_eq!(s.attempt, 2);

        let s = s.settle(&CheckOutcome::Error(CheckError::NoTarget), None);
        assert_eq!(s.phase, CheckPhase::Error);
        assert!(s.last_result.is_none());
        assert_eq!(s.last_error, Some(CheckError::NoTarget));
        assert!(s.target.is_some());
    }

    #[test]
    fn test_reset_clears_everything_but_attempts() {
        let s = Session::default()
            .select(site())
            .begin()
            .settle(&CheckOutcome::Denied(result(CheckStatus::Failed)), None)
            .reset();
        assert_eq!(s.phase, CheckPhase::Idle);
        assert!(s.target.is_none());
        assert!(s.last_result.is_none());
        assert_eq!(s.attempt, 1);
    }

    #[test]
    fn test_advisory_expiry() {
        let now = Utc::now();
        let advisory = Advisory {
            message: "Move closer".into(),
            raised_at: now,
            expires_at: now + Duration::seconds(4),
        };
        let s = Session::default().begin().settle(
            &CheckOutcome::Denied(result(CheckStatus::Failed)),
            Some(advisory),
        );
        assert!(s.active_advisory(now).is_some());
        assert!(s.active_advisory(now + Duration::seconds(5)).is_none());
        assert!(s.dismiss_advisory().active_advisory(now).is_none());
    }
}
