//! Site records as delivered by the project directory.

use super::coords::{self, Coordinate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Allowed check-in radius in meters.
///
/// Upstream rows carry it as a number, a numeric string, or nothing at
/// all, and the zero-radius bypass has to recognize both `0` and `"0"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckinRadius {
    Meters(f64),
    Text(String),
    #[default]
    Missing,
}

impl CheckinRadius {
    fn parsed(&self) -> Option<f64> {
        let raw = match self {
            Self::Meters(m) => Some(*m),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Missing => None,
        };
        raw.filter(|m: &f64| m.is_finite())
    }

    /// Geofencing is disabled for the site.
    pub fn is_bypass(&self) -> bool {
        self.parsed() == Some(0.0)
    }

    /// Radius used for comparison; unparseable or negative values count as 0.
    pub fn meters(&self) -> f64 {
        self.parsed().map(|m| m.max(0.0)).unwrap_or(0.0)
    }
}

impl From<f64> for CheckinRadius {
    fn from(m: f64) -> Self {
        Self::Meters(m)
    }
}

/// A project site a user can check in at.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteLocation {
    #[serde(rename = "PROJECT_NO", default, deserialize_with = "lenient_string")]
    pub project_no: String,
    #[serde(rename = "PROJECT_NAME", default, deserialize_with = "lenient_opt_string")]
    pub project_name: Option<String>,
    #[serde(rename = "SITE_LOCATION", default, deserialize_with = "lenient_string")]
    pub site_location: String,
    #[serde(rename = "DETAIL_DESCRIPTION", default, deserialize_with = "lenient_string")]
    pub detail_description: String,
    #[serde(rename = "GPS_LATITUDE", default, deserialize_with = "lenient_opt_string")]
    pub gps_latitude: Option<String>,
    #[serde(rename = "GPS_LONGITUDE", default, deserialize_with = "lenient_opt_string")]
    pub gps_longitude: Option<String>,
    #[serde(rename = "coordinates", alias = "GPS_LOCATION", default, deserialize_with = "lenient_opt_string")]
    pub gps_location: Option<String>,
    #[serde(rename = "CHECKIN_RADIUS", default)]
    pub checkin_radius: CheckinRadius,
}

impl SiteLocation {
    /// Eligible for geofencing: either the discrete pair is usable or the
    /// combined string is.
    pub fn has_valid_coordinates(&self) -> bool {
        let discrete = coords::is_present(self.gps_latitude.as_deref())
            && coords::is_present(self.gps_longitude.as_deref());
        discrete || coords::is_combined_present(self.gps_location.as_deref())
    }

    /// The registered coordinate, preferring the discrete pair over the
    /// combined string. `None` when neither representation parses.
    pub fn target_coordinates(&self) -> Option<Coordinate> {
        let discrete = match (self.gps_latitude.as_deref(), self.gps_longitude.as_deref()) {
            (Some(lat), Some(lon)) if coords::is_present(Some(lat)) && coords::is_present(Some(lon)) => {
                Coordinate::from_parts(lat, lon)
            }
            _ => None,
        };
        discrete.or_else(|| {
            self.gps_location
                .as_deref()
                .filter(|c| coords::is_combined_present(Some(*c)))
                .and_then(coords::try_parse_coordinates)
        })
    }

    /// Label shown in pickers and logs.
    pub fn display_name(&self) -> String {
        let label = match self.project_name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{} {}", self.project_no, name),
            None => format!("{} {}", self.project_no, self.site_location),
        };
        label.trim().to_string()
    }
}

impl fmt::Display for SiteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Free-function form of [`SiteLocation::has_valid_coordinates`].
pub fn has_valid_coordinates(site: &SiteLocation) -> bool {
    site.has_valid_coordinates()
}

// ─── Lenient field decoding ─────────────────────────────────────
//
// Tabular backends emit numbers where text is expected and vice versa.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}
