//! Seams to the presentation layer: outcome callbacks and user notices.

use super::outcome::LocationCheckResult;
use super::session::PositionInfo;
use tracing::{info, warn};

/// Outcome callbacks. Every method is optional; each fires at most once
/// per check attempt.
pub trait CheckObserver: Send + Sync {
    fn on_location_check(&self, _result: &LocationCheckResult) {}
    fn on_location_update(&self, _position: &PositionInfo) {}
    fn on_access_granted(&self, _result: &LocationCheckResult) {}
    fn on_access_denied(&self, _result: &LocationCheckResult) {}
    fn on_radius_update(&self, _radius_meters: f64) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl CheckObserver for NoopObserver {}

/// User-facing interruptions.
pub trait Notifier: Send + Sync {
    /// Blocking alert. Only called when alerts are enabled.
    fn alert(&self, title: &str, message: &str);

    /// Non-blocking notice that clears itself.
    fn advisory(&self, _message: &str) {}
}

/// Notifier that only logs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, title: &str, message: &str) {
        warn!(title, message, "Alert");
    }

    fn advisory(&self, message: &str) {
        info!(message, "Advisory");
    }
}
