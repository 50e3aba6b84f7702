//! Attendance lifecycle events
//!
//! Every state-changing operation broadcasts an [`AttendanceEvent`] on the
//! [`EventBus`]. Subscribers are optional: the background generation worker's
//! outcome is observable here without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Attendance lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttendanceEvent {
    /// Lecture scheduled for today
    LectureCreated {
        lecture_id: Uuid,
        class_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Evidence photos appended to a lecture
    PhotosUploaded {
        lecture_id: Uuid,
        photo_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Attendance generated and the lecture locked
    AttendanceLocked {
        lecture_id: Uuid,
        record_id: Uuid,
        present_count: usize,
        absent_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Background generation gave up on a lecture
    GenerationFailed {
        lecture_id: Uuid,
        attempts: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Student challenged an ABSENT entry
    DisputeRaised {
        dispute_id: Uuid,
        entry_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Class owner approved or rejected a dispute
    DisputeResolved {
        dispute_id: Uuid,
        approved: bool,
        timestamp: DateTime<Utc>,
    },

    /// Administrator corrected an entry directly
    AttendanceOverridden {
        entry_id: Uuid,
        override_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl AttendanceEvent {
    /// Event type name as serialized in the `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            AttendanceEvent::LectureCreated { .. } => "LectureCreated",
            AttendanceEvent::PhotosUploaded { .. } => "PhotosUploaded",
            AttendanceEvent::AttendanceLocked { .. } => "AttendanceLocked",
            AttendanceEvent::GenerationFailed { .. } => "GenerationFailed",
            AttendanceEvent::DisputeRaised { .. } => "DisputeRaised",
            AttendanceEvent::DisputeResolved { .. } => "DisputeResolved",
            AttendanceEvent::AttendanceOverridden { .. } => "AttendanceOverridden",
        }
    }
}

/// Broadcast bus for attendance events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AttendanceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AttendanceEvent) {
        tracing::trace!(event = event.event_type(), "Event emitted");
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let lecture_id = Uuid::new_v4();
        bus.emit_lossy(AttendanceEvent::PhotosUploaded {
            lecture_id,
            photo_count: 2,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            AttendanceEvent::PhotosUploaded { lecture_id: id, photo_count, .. } => {
                assert_eq!(id, lecture_id);
                assert_eq!(photo_count, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(AttendanceEvent::DisputeResolved {
            dispute_id: Uuid::new_v4(),
            approved: true,
            timestamp: Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_serialized_type_tag() {
        let event = AttendanceEvent::LectureCreated {
            lecture_id: Uuid::nil(),
            class_id: Uuid::nil(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
    }
}
