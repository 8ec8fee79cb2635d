//! Event types for GemLens analysis progress
//!
//! The pipeline emits one event per stage transition. Emission is lossy:
//! a run with no subscribers proceeds normally.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Analysis progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Analysis of one gemstone started
    GemstoneStarted {
        run_id: Uuid,
        gemstone_id: String,
        image_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An image was routed to a category
    ImageClassified {
        run_id: Uuid,
        image_id: String,
        image_type: String,
        confidence: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Claims were extracted from an image
    ImageExtracted {
        run_id: Uuid,
        image_id: String,
        claim_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An image failed classification or extraction
    ImageFailed {
        run_id: Uuid,
        image_id: String,
        error_kind: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fusion finished for a gemstone
    GemstoneFused {
        run_id: Uuid,
        gemstone_id: String,
        conflicts: usize,
        needs_review: bool,
        complete: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AnalysisEvent {
    /// Run identifier carried by every event
    pub fn run_id(&self) -> Uuid {
        match self {
            AnalysisEvent::GemstoneStarted { run_id, .. }
            | AnalysisEvent::ImageClassified { run_id, .. }
            | AnalysisEvent::ImageExtracted { run_id, .. }
            | AnalysisEvent::ImageFailed { run_id, .. }
            | AnalysisEvent::GemstoneFused { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast bus for analysis events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AnalysisEvent) {
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
        let run_id = Uuid::new_v4();

        bus.emit_lossy(AnalysisEvent::ImageExtracted {
            run_id,
            image_id: "img-1".to_string(),
            claim_count: 3,
            timestamp: chrono::Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id(), run_id);
        assert!(matches!(event, AnalysisEvent::ImageExtracted { claim_count: 3, .. }));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(AnalysisEvent::GemstoneStarted {
            run_id: Uuid::new_v4(),
            gemstone_id: "gem-1".to_string(),
            image_count: 0,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = AnalysisEvent::ImageFailed {
            run_id: Uuid::nil(),
            image_id: "img-2".to_string(),
            error_kind: "timeout".to_string(),
            message: "oracle call exceeded 60s".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImageFailed");
        assert_eq!(json["error_kind"], "timeout");
    }
}
