//! Change notifications that drive re-evaluation
//!
//! The scene graph publishes on an [`EventBus`] whenever its entity set or
//! its browsing context changes. The filter controller subscribes once and
//! funnels every notification into the same synchronous re-evaluation.
//!
//! ```text
//! scene graph ──┐
//!               ├──▶ EventBus::publish() ──▶ broadcast channel ──▶ FilterController listener
//! drill-down UI ┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something in the scene changed under the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneEvent {
    /// Entities were added, removed or had their attributes changed
    EntitiesChanged,
    /// The user drilled into (or out of) an ancestor group
    SelectionContextChanged { active_group: Option<Uuid> },
}

impl SceneEvent {
    pub fn kind(&self) -> &str {
        match self {
            SceneEvent::EntitiesChanged => "entities_changed",
            SceneEvent::SelectionContextChanged { .. } => "selection_context_changed",
        }
    }
}

/// Envelope wrapping a scene event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    pub event: SceneEvent,
}

impl EventEnvelope {
    pub fn new(event: SceneEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based bus for scene notifications
///
/// Cheap to clone. Slow receivers lose the oldest events once `capacity`
/// is exceeded and get a `Lagged` error on their next `recv()`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails. Returns the number of receivers that will see the event.
    pub fn publish(&self, event: SceneEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
