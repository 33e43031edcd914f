//! Position providers: a manually supplied fix and IP geolocation.

use super::pending::PositionSink;
use super::{PositionError, PositionSource};
use crate::site::Coordinate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

// ─── Fixed position ─────────────────────────────────────────────

/// A known position, delivered on all three channels immediately.
#[derive(Debug, Clone)]
pub struct FixedPositionSource {
    coordinate: Coordinate,
    name: Option<String>,
    address: Option<String>,
}

impl FixedPositionSource {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            name: None,
            address: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl PositionSource for FixedPositionSource {
    fn request_position(&self, sink: PositionSink) -> Result<(), PositionError> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{:.5}, {:.5}", self.coordinate.latitude, self.coordinate.longitude));
        sink.on_name(name);
        sink.on_coordinates(self.coordinate.to_string());
        if let Some(ref address) = self.address {
            sink.on_address(address.clone());
        }
        Ok(())
    }
}

// ─── IP geolocation ─────────────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    region: Option<String>,
    postal: Option<String>,
    country_name: Option<String>,
}

/// Coarse position from the public IP address.
///
/// The lookup runs on a blocking worker; channels fire from that thread.
pub struct IpPositionSource {
    url: String,
    timeout: Duration,
}

impl IpPositionSource {
    pub fn new() -> Self {
        Self {
            url: "https://ipapi.co/json/".into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Default for IpPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for IpPositionSource {
    fn request_position(&self, sink: PositionSink) -> Result<(), PositionError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| PositionError::Unavailable("no async runtime for IP lookup".into()))?;
        let url = self.url.clone();
        let timeout = self.timeout;

        handle.spawn_blocking(move || match ip_lookup(&url, timeout) {
            Ok(r) => deliver(&sink, r),
            Err(e) => {
                warn!(error = %e, "IP geolocation failed");
                sink.on_error(e.to_string());
            }
        });
        Ok(())
    }
}

fn ip_lookup(url: &str, timeout: Duration) -> Result<IpApiResult, PositionError> {
    let response = ureq::get(url)
        .set("User-Agent", concat!("sitefence/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .call()
        .map_err(|e| PositionError::Unavailable(e.to_string()))?;

    response
        .into_json()
        .map_err(|e| PositionError::Unavailable(format!("invalid response: {}", e)))
}

fn deliver(sink: &PositionSink, r: IpApiResult) {
    let (Some(lat), Some(lon)) = (r.latitude, r.longitude) else {
        sink.on_error("IP geolocation returned no coordinates");
        return;
    };

    let city = r.city.clone().unwrap_or_else(|| "Unknown".into());
    let name = match r.country_name.as_deref() {
        Some(country) if !country.is_empty() => format!("{}, {}", city, country),
        _ => city,
    };
    sink.on_name(name);

    let address = format_address(&r);
    if !address.is_empty() {
        sink.on_address(address);
    }

    debug!(lat, lon, "IP geolocation resolved");
    sink.on_coordinates(Coordinate::new(lat, lon).to_string());
}

fn format_address(r: &IpApiResult) -> String {
    [&r.city, &r.region, &r.postal, &r.country_name]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fix_channel;

    #[tokio::test]
    async fn test_fixed_source_fires_all_channels() {
        let source = FixedPositionSource::new(Coordinate::new(12.5, 77.6))
            .with_name("Gate 2")
            .with_address("Ring Road");
        let (sink, pending) = fix_channel(1);
        source.request_position(sink).unwrap();

        let fix = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(fix.coordinates, "12.5,77.6");
        assert_eq!(fix.name.as_deref(), Some("Gate 2"));
        assert_eq!(fix.address.as_deref(), Some("Ring Road"));
    }

    #[tokio::test]
    async fn test_fixed_source_default_name() {
        let source = FixedPositionSource::new(Coordinate::new(1.0, 2.0));
        let (sink, pending) = fix_channel(2);
        source.request_position(sink).unwrap();

        let fix = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(fix.name.as_deref(), Some("1.00000, 2.00000"));
        assert!(fix.address.is_none());
    }

    #[tokio::test]
    async fn test_deliver_without_coordinates_errors() {
        let (sink, pending) = fix_channel(3);
        deliver(
            &sink,
            IpApiResult {
                latitude: None,
                longitude: Some(1.0),
                city: None,
                region: None,
                postal: None,
                country_name: None,
            },
        );
        let err = pending.wait(Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("no coordinates"));
    }

    #[test]
    fn test_format_address_skips_blanks() {
        let r = IpApiResult {
            latitude: Some(59.33),
            longitude: Some(18.07),
            city: Some("Stockholm".into()),
            region: Some(" ".into()),
            postal: Some("111 20".into()),
            country_name: Some("Sweden".into()),
        };
        assert_eq!(format_address(&r), "Stockholm, 111 20, Sweden");
    }

    #[test]
    fn test_ip_source_needs_runtime() {
        let (sink, _pending) = fix_channel(4);
        let result = IpPositionSource::new().request_position(sink);
        assert!(matches!(result, Err(PositionError::Unavailable(_))));
    }
}
