//! What a check attempt produces.

use crate::site::SiteLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result status as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Failed,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of one check attempt. A new one replaces the previous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCheckResult {
    /// Rounded distance; `None` when no distance was computed.
    pub distance_meters: Option<u64>,
    pub can_access: bool,
    pub location_name: String,
    /// Device position as `"lat,long"`.
    pub coordinates: String,
    pub address: String,
    pub selected_site: SiteLocation,
    pub status: CheckStatus,
    pub radius_meters: f64,
    pub checked_at: DateTime<Utc>,
}

/// Why a check could not produce a normal distance comparison.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckError {
    #[error("Please select a site location first")]
    NoTarget,

    #[error("Site {project_no} has no usable GPS coordinates. Choose another site or contact your administrator")]
    InvalidCoordinates { project_no: String },

    #[error("Location request timed out after {}s. Please try again", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    PositionSource(String),
}

const GENERIC_POSITION_FAILURE: &str = "Unable to get current location. Please try again";

impl CheckError {
    /// Wrap a source message, falling back to a generic one when blank.
    pub fn position_source(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::PositionSource(GENERIC_POSITION_FAILURE.to_string())
        } else {
            Self::PositionSource(message)
        }
    }

    /// Alert heading.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NoTarget => "Location Required",
            Self::InvalidCoordinates { .. } => "Invalid Location",
            Self::Timeout(_) => "Location Timeout",
            Self::PositionSource(_) => "Location Error",
        }
    }

    /// Whether retrying the same site can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::PositionSource(_))
    }
}

/// Final outcome of `check_location_distance`.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Within radius, or geofencing disabled for the site.
    Granted(LocationCheckResult),
    /// Valid comparison, too far away.
    Denied(LocationCheckResult),
    /// No target, or the target's coordinates are unusable.
    Rejected {
        error: CheckError,
        result: Option<LocationCheckResult>,
    },
    /// The device position could not be obtained.
    Error(CheckError),
}

impl CheckOutcome {
    pub fn result(&self) -> Option<&LocationCheckResult> {
        match self {
            Self::Granted(r) | Self::Denied(r) => Some(r),
            Self::Rejected { result, .. } => result.as_ref(),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CheckError> {
        match self {
            Self::Rejected { error, .. } | Self::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn can_access(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}
