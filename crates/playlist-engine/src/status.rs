//! Status snapshot publishing and listener delivery.
//!
//! The worker owns the reporter; accessors read the shared snapshot without going through
//! the command queue.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use playlist_types::{EngineEvent, StatusMessage, StatusSnapshot};
use serde_json::Value;

/// Receiver of engine events.
///
/// Called on the engine worker thread, in emission order. Implementations must not call
/// back into blocking engine operations.
pub trait StatusListener: Send {
    fn on_event(&self, name: &str, event: &EngineEvent);
}

impl<F> StatusListener for F
where
    F: Fn(&str, &EngineEvent) + Send,
{
    fn on_event(&self, name: &str, event: &EngineEvent) {
        self(name, event)
    }
}

pub(crate) type SharedSnapshot = Arc<RwLock<StatusSnapshot>>;

pub(crate) struct StatusReporter {
    listener: Option<Box<dyn StatusListener>>,
    snapshot: SharedSnapshot,
    position_interval: Duration,
    last_position: Option<Instant>,
}

impl StatusReporter {
    pub(crate) fn new(snapshot: SharedSnapshot, position_interval: Duration) -> Self {
        Self {
            listener: None,
            snapshot,
            position_interval,
            last_position: None,
        }
    }

    /// Register `listener`, replacing any previous one.
    pub(crate) fn set_listener(&mut self, listener: Box<dyn StatusListener>) {
        if self.listener.replace(listener).is_some() {
            tracing::debug!("status listener replaced");
        }
    }

    /// Drop the listener; nothing is delivered afterwards.
    pub(crate) fn close(&mut self) {
        self.listener = None;
    }

    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        if let Ok(mut guard) = self.snapshot.write() {
            *guard = snapshot;
        }
    }

    pub(crate) fn emit(&self, msg_type: StatusMessage, track_id: Option<String>, value: Value) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        let name = msg_type.event_name();
        let event = EngineEvent {
            name,
            msg_type,
            track_id,
            value,
        };
        tracing::trace!(name = name.as_str(), msg_type = ?msg_type, "emit");
        listener.on_event(name.as_str(), &event);
    }

    /// Emit `msg_type` with the serialized snapshot as payload.
    pub(crate) fn emit_status(&self, msg_type: StatusMessage, snapshot: &StatusSnapshot) {
        let value = serde_json::to_value(snapshot).unwrap_or(Value::Null);
        self.emit(msg_type, snapshot.track_id.clone(), value);
    }

    /// Emit a position update unless one went out less than the interval ago.
    pub(crate) fn emit_position(&mut self, snapshot: &StatusSnapshot, now: Instant) {
        if let Some(last) = self.last_position {
            if now.saturating_duration_since(last) < self.position_interval {
                return;
            }
        }
        self.last_position = Some(now);
        self.emit_status(StatusMessage::PlaybackPosition, snapshot);
    }

    /// Emit a position update regardless of the interval (after seeks and track changes).
    pub(crate) fn force_position(&mut self, snapshot: &StatusSnapshot, now: Instant) {
        self.last_position = Some(now);
        self.emit_status(StatusMessage::PlaybackPosition, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (StatusReporter, Arc<Mutex<Vec<EngineEvent>>>, SharedSnapshot) {
        let shared = SharedSnapshot::default();
        let mut reporter = StatusReporter::new(shared.clone(), Duration::from_millis(500));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        reporter.set_listener(Box::new(move |_: &str, ev: &EngineEvent| {
            sink.lock().unwrap().push(ev.clone());
        }));
        (reporter, seen, shared)
    }

    #[test]
    fn position_events_are_rate_limited() {
        let (mut reporter, seen, _) = recording();
        let snap = StatusSnapshot::default();
        let t0 = Instant::now();
        reporter.emit_position(&snap, t0);
        reporter.emit_position(&snap, t0 + Duration::from_millis(100));
        reporter.emit_position(&snap, t0 + Duration::from_millis(499));
        reporter.emit_position(&snap, t0 + Duration::from_millis(500));
        assert_eq!(seen.lock().unwrap().len(), 2);

        reporter.force_position(&snap, t0 + Duration::from_millis(510));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn closed_reporter_emits_nothing() {
        let (mut reporter, seen, _) = recording();
        reporter.close();
        reporter.emit_status(StatusMessage::Playing, &StatusSnapshot::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn newer_listener_replaces_older() {
        let (mut reporter, first, _) = recording();
        let second = Arc::new(Mutex::new(0usize));
        let count = second.clone();
        reporter.set_listener(Box::new(move |_: &str, _: &EngineEvent| {
            *count.lock().unwrap() += 1;
        }));
        reporter.emit(StatusMessage::Register, None, Value::Null);
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[test]
    fn events_carry_channel_name_and_snapshot() {
        let (reporter, seen, shared) = recording();
        let snap = StatusSnapshot {
            track_id: Some("a".to_string()),
            queue_length: 2,
            ..StatusSnapshot::default()
        };
        reporter.publish(snap.clone());
        reporter.emit_status(StatusMessage::TrackChanged, &snap);

        assert_eq!(*shared.read().unwrap(), snap);
        let events = seen.lock().unwrap();
        assert_eq!(events[0].name.as_str(), "item-changed");
        assert_eq!(events[0].track_id.as_deref(), Some("a"));
        assert_eq!(events[0].value["queueLength"], 2);
    }
}
