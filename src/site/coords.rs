//! Coordinate parsing for the two shapes upstream data uses: a combined
//! `"lat,long"` string and a pair of separate numeric strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { latitude: 0.0, longitude: 0.0 };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build from two already-split fields. Rejects non-numeric text and
    /// values outside the valid latitude/longitude ranges.
    pub fn from_parts(lat: &str, lon: &str) -> Option<Self> {
        let latitude: f64 = lat.trim().parse().ok()?;
        let longitude: f64 = lon.trim().parse().ok()?;
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self { latitude, longitude })
    }

    /// Distance to another point in meters (unrounded).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        crate::geo::haversine_distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Parse `"lat,long"`. Exactly one comma, both sides numeric.
pub fn try_parse_coordinates(text: &str) -> Option<Coordinate> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 2 {
        return None;
    }
    Coordinate::from_parts(parts[0], parts[1])
}

/// Parse `"lat,long"`, normalizing anything unparseable to (0,0).
///
/// The origin is indistinguishable from a real equatorial fix; prefer
/// [`try_parse_coordinates`] wherever the caller can act on failure.
pub fn parse_coordinates(text: &str) -> Coordinate {
    try_parse_coordinates(text).unwrap_or(Coordinate::ORIGIN)
}

/// True when a discrete coordinate field carries a usable value.
pub(crate) fn is_present(field: Option<&str>) -> bool {
    match field {
        Some(v) => {
            let v = v.trim();
            !v.is_empty() && !v.eq_ignore_ascii_case("null")
        }
        None => false,
    }
}

/// True when a combined `"lat,long"` field looks usable.
pub(crate) fn is_combined_present(field: Option<&str>) -> bool {
    match field {
        Some(v) => {
            let v = v.trim();
            !v.eq_ignore_ascii_case("null,null") && v.contains(',')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let c = parse_coordinates("12.5,77.6");
        assert_eq!(c, Coordinate::new(12.5, 77.6));
    }

    #[test]
    fn test_parse_with_spaces() {
        let c = parse_coordinates(" 59.3293 , 18.0686 ");
        assert_eq!(c, Coordinate::new(59.3293, 18.0686));
    }

    #[test]
    fn test_parse_failures_normalize_to_origin() {
        assert_eq!(parse_coordinates("bad"), Coordinate::ORIGIN);
        assert_eq!(parse_coordinates("1,2,3"), Coordinate::ORIGIN);
        assert_eq!(parse_coordinates(""), Coordinate::ORIGIN);
        assert_eq!(parse_coordinates("null,null"), Coordinate::ORIGIN);
        assert_eq!(parse_coordinates("12.5,"), Coordinate::ORIGIN);
    }

    #[test]
    fn test_try_parse_distinguishes_failure() {
        assert_eq!(try_parse_coordinates("0,0"), Some(Coordinate::ORIGIN));
        assert_eq!(try_parse_coordinates("bad"), None);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(try_parse_coordinates("91,10").is_none());
        assert!(try_parse_coordinates("10,181").is_none());
        assert!(try_parse_coordinates("NaN,10").is_none());
        assert!(try_parse_coordinates("-90,-180").is_some());
    }

    #[test]
    fn test_display_matches_channel_shape() {
        let c = Coordinate::new(12.5, -77.25);
        assert_eq!(c.to_string(), "12.5,-77.25");
        assert_eq!(try_parse_coordinates(&c.to_string()), Some(c));
    }

    #[test]
    fn test_presence_checks() {
        assert!(is_present(Some("12.5")));
        assert!(!is_present(Some("NULL")));
        assert!(!is_present(Some("  ")));
        assert!(!is_present(None));
        assert!(is_combined_present(Some("1,2")));
        assert!(!is_combined_present(Some("null,null")));
        assert!(!is_combined_present(Some("12.5")));
    }
}
