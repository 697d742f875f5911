//! Change notifications for templates and connection configs.
//!
//! Stores publish one [`ChangeEvent`] per successful write. Shards subscribe and keep their
//! caches in step with the stores.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Save,
    Update,
    Delete,
}

impl EventType {
    /// Events after which the entity still exists and can be rewarmed.
    pub fn rewarms(&self) -> bool {
        matches!(self, Self::Save | Self::Update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Template,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub entity_id: String,
    pub entity: EntityKind,
    pub event_type: EventType,
}

impl ChangeEvent {
    pub fn config(id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            entity_id: id.into(),
            entity: EntityKind::Config,
            event_type,
        }
    }

    pub fn template(id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            entity_id: id.into(),
            entity: EntityKind::Template,
            event_type,
        }
    }
}

/// In-process fan-out of change events.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        debug!(
            entity = ?event.entity,
            id = %event.entity_id,
            event_type = ?event.event_type,
            "publishing change event"
        );
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = ChangeBus::default();
        assert_eq!(bus.publish(ChangeEvent::config("c1", EventType::Save)), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = ChangeBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(ChangeEvent::template("t1", EventType::Delete));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, EntityKind::Template);
        assert!(!event.event_type.rewarms());
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_string(&ChangeEvent::config("c9", EventType::Update)).unwrap();
        assert_eq!(
            json,
            r#"{"entityId":"c9","entity":"config","eventType":"UPDATE"}"#
        );
    }
}
