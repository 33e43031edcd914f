//! Device position acquisition.
//!
//! A [`PositionSource`] is started with a [`PositionSink`] and reports
//! back through its callback channels; the checker awaits the matching
//! [`PendingFix`] with a deadline.

pub mod pending;
pub mod providers;

pub use pending::{fix_channel, PendingFix, PositionFix, PositionSink, WaitError};
pub use providers::{FixedPositionSource, IpPositionSource};

use thiserror::Error;

/// Failure to start a position request.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Location permission denied")]
    PermissionDenied,
}

/// Anything that can report where the device is.
///
/// Implementations return quickly and deliver results through `sink`,
/// possibly from another thread. Each channel fires at most once.
pub trait PositionSource: Send + Sync {
    fn request_position(&self, sink: PositionSink) -> Result<(), PositionError>;
}
