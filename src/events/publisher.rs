//! Lifecycle event publisher.
//!
//! Status changes fan out to whatever transports the host wires up (push
//! notifications, websockets, log shippers) by subscribing to this broadcast
//! channel. Publishing with zero subscribers is fine; the engine never blocks
//! on an observer.

use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast publisher for task and variation lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and JSON context
    pub async fn publish(
        &self,
        event_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // A send error only means nobody is subscribed right now, which is
        // not a failure from the engine's point of view
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let publisher = EventPublisher::new(16);
        let mut receiver = publisher.subscribe();

        publisher
            .publish("task.claimed", json!({"task_id": "abc"}))
            .await
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "task.claimed");
        assert_eq!(event.context["task_id"], "abc");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(16);
        assert!(publisher.publish("task.failed", json!({})).await.is_ok());
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
