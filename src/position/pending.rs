//! Single-resolution bridge between callback-style position sources and an
//! awaited fix with a deadline.
//!
//! A source receives a [`PositionSink`] and may fire `on_name`,
//! `on_address` and `on_coordinates` (or `on_error`) in any order, from any
//! thread, at most once each. The waiting side holds the matching
//! [`PendingFix`]. The first of {coordinates, error, deadline} settles the
//! request; from then on every channel on the sink is a no-op. Dropping
//! every clone of the sink without resolving fails the wait immediately.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

type Resolution = Result<String, String>;

/// A settled position request.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    /// Raw `"lat,long"` as delivered by the source.
    pub coordinates: String,
    /// Place name, if it arrived before the coordinates did.
    pub name: Option<String>,
    /// Formatted address, if it arrived before the coordinates did.
    pub address: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum WaitError {
    #[error("Timed out after {}s waiting for the device position", .0.as_secs())]
    TimedOut(Duration),

    #[error("{0}")]
    Source(String),

    #[error("Position source dropped the request")]
    Abandoned,
}

struct Shared {
    request_id: u64,
    resolver: Option<oneshot::Sender<Resolution>>,
    name: Option<String>,
    address: Option<String>,
    settled: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Callback side handed to a position source.
#[derive(Clone)]
pub struct PositionSink {
    inner: Arc<SinkInner>,
}

/// Shared by all clones of one sink. Releases the resolver when the last
/// clone goes away.
struct SinkInner {
    shared: Arc<Mutex<Shared>>,
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        let mut s = lock(&self.shared);
        if s.resolver.take().is_some() {
            debug!(request_id = s.request_id, "Position sink dropped without a resolution");
        }
    }
}

impl PositionSink {
    pub fn on_name(&self, name: impl Into<String>) {
        let mut s = lock(&self.inner.shared);
        if s.settled {
            debug!(request_id = s.request_id, channel = "name", "Discarding late position callback");
            return;
        }
        s.name.get_or_insert_with(|| name.into());
    }

    pub fn on_address(&self, address: impl Into<String>) {
        let mut s = lock(&self.inner.shared);
        if s.settled {
            debug!(request_id = s.request_id, channel = "address", "Discarding late position callback");
            return;
        }
        s.address.get_or_insert_with(|| address.into());
    }

    /// Resolves the request.
    pub fn on_coordinates(&self, coordinates: impl Into<String>) {
        self.resolve("coordinates", Ok(coordinates.into()));
    }

    /// Fails the request with the source's own message.
    pub fn on_error(&self, message: impl Into<String>) {
        self.resolve("error", Err(message.into()));
    }

    /// Whether the waiting side still accepts a resolution.
    pub fn is_pending(&self) -> bool {
        let s = lock(&self.inner.shared);
        !s.settled && s.resolver.is_some()
    }

    fn resolve(&self, channel: &'static str, resolution: Resolution) {
        let mut s = lock(&self.inner.shared);
        let Some(tx) = s.resolver.take().filter(|_| !s.settled) else {
            debug!(request_id = s.request_id, channel, "Discarding late position callback");
            return;
        };
        // The receiver may already be gone if the waiter was dropped.
        let _ = tx.send(resolution);
    }
}

/// Waiting side of a position request.
pub struct PendingFix {
    rx: oneshot::Receiver<Resolution>,
    shared: Arc<Mutex<Shared>>,
}

/// Create a linked sink/waiter pair for one request.
pub fn fix_channel(request_id: u64) -> (PositionSink, PendingFix) {
    let (tx, rx) = oneshot::channel();
    let shared = Arc::new(Mutex::new(Shared {
        request_id,
        resolver: Some(tx),
        name: None,
        address: None,
        settled: false,
    }));
    (
        PositionSink {
            inner: Arc::new(SinkInner {
                shared: Arc::clone(&shared),
            }),
        },
        PendingFix { rx, shared },
    )
}

impl PendingFix {
    /// Wait for the coordinate channel, at most `deadline`.
    ///
    /// Once this returns the sink is settled and later callbacks are
    /// discarded, including name and address.
    pub async fn wait(mut self, deadline: Duration) -> Result<PositionFix, WaitError> {
        let outcome = tokio::time::timeout(deadline, &mut self.rx).await;
        let (name, address) = self.settle();

        match outcome {
            Err(_) => Err(WaitError::TimedOut(deadline)),
            Ok(Err(_)) => Err(WaitError::Abandoned),
            Ok(Ok(Err(message))) => Err(WaitError::Source(message)),
            Ok(Ok(Ok(coordinates))) => Ok(PositionFix {
                coordinates,
                name,
                address,
            }),
        }
    }

    fn settle(&self) -> (Option<String>, Option<String>) {
        let mut s = lock(&self.shared);
        s.settled = true;
        s.resolver = None;
        (s.name.take(), s.address.take())
    }
}

impl Drop for PendingFix {
    fn drop(&mut self) {
        self.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_millis(15_000);

    #[tokio::test(start_paused = true)]
    async fn test_coordinates_resolve() {
        let (sink, pending) = fix_channel(1);
        sink.on_name("Site office");
        sink.on_address("1 Main St");
        sink.on_coordinates("12.5,77.6");

        let fix = pending.wait(DEADLINE).await.unwrap();
        assert_eq!(fix.coordinates, "12.5,77.6");
        assert_eq!(fix.name.as_deref(), Some("Site office"));
        assert_eq!(fix.address.as_deref(), Some("1 Main St"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auxiliary_channels_do_not_gate() {
        let (sink, pending) = fix_channel(2);
        sink.on_coordinates("1,2");

        let fix = pending.wait(DEADLINE).await.unwrap();
        assert!(fix.name.is_none());
        assert!(fix.address.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_value_per_channel_wins() {
        let (sink, pending) = fix_channel(3);
        sink.on_name("first");
        sink.on_name("second");
        sink.on_coordinates("1,2");
        sink.on_coordinates("3,4");

        let fix = pending.wait(DEADLINE).await.unwrap();
        assert_eq!(fix.name.as_deref(), Some("first"));
        assert_eq!(fix.coordinates, "1,2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_callbacks_discarded() {
        let (sink, pending) = fix_channel(4);
        let start = tokio::time::Instant::now();

        let err = pending.wait(DEADLINE).await.unwrap_err();
        assert_eq!(err, WaitError::TimedOut(DEADLINE));
        assert!(start.elapsed() >= DEADLINE);

        assert!(!sink.is_pending());
        sink.on_coordinates("1,2");
        sink.on_name("late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_from_spawned_task() {
        let (sink, pending) = fix_channel(5);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            sink.on_coordinates("5,6");
        });

        let fix = pending.wait(DEADLINE).await.unwrap();
        assert_eq!(fix.coordinates, "5,6");
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_surfaces_message() {
        let (sink, pending) = fix_channel(6);
        sink.on_error("Location services disabled");
        sink.on_coordinates("1,2");

        let err = pending.wait(DEADLINE).await.unwrap_err();
        assert_eq!(err, WaitError::Source("Location services disabled".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_settles_sink() {
        let (sink, pending) = fix_channel(7);
        assert!(sink.is_pending());
        drop(pending);
        assert!(!sink.is_pending());
        sink.on_coordinates("1,2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sink_abandons_without_waiting() {
        let (sink, pending) = fix_channel(8);
        let start = tokio::time::Instant::now();
        drop(sink);

        let err = pending.wait(DEADLINE).await.unwrap_err();
        assert_eq!(err, WaitError::Abandoned);
        assert!(start.elapsed() < DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surviving_clone_keeps_request_open() {
        let (sink, pending) = fix_channel(9);
        let kept = sink.clone();
        drop(sink);
        assert!(kept.is_pending());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            kept.on_coordinates("7,8");
        });
        let fix = pending.wait(DEADLINE).await.unwrap();
        assert_eq!(fix.coordinates, "7,8");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_sink_dropped_still_delivers() {
        let (sink, pending) = fix_channel(10);
        sink.on_coordinates("1,2");
        drop(sink);

        let fix = pending.wait(DEADLINE).await.unwrap();
        assert_eq!(fix.coordinates, "1,2");
    }

    #[test]
    fn test_timeout_message() {
        let msg = WaitError::TimedOut(DEADLINE).to_string();
        assert_eq!(msg, "Timed out after 15s waiting for the device position");
    }
}
