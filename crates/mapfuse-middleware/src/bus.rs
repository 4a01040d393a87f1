//! Topic-based publish/subscribe bus for map notifications.
//!
//! Built on [`tokio::sync::broadcast`], so every subscriber sees every event
//! and a slow subscriber only hurts itself (it observes `Lagged`).
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::MapUpdates`] | One [`MapEvent`] per processed frame (composited or skipped) |
//! | [`Topic::Diagnostics`] | Session-level notices such as start, stop and fatal errors |

use mapfuse_types::{MapError, MapEvent};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-frame pipeline outcomes.
    MapUpdates,
    /// Session lifecycle and error notices.
    Diagnostics,
}

/// Shared event bus.  Clones share the same underlying channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    map_updates: broadcast::Sender<MapEvent>,
    diagnostics: broadcast::Sender<MapEvent>,
}

impl EventBus {
    /// Create a bus whose topic channels each buffer `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a [`broadcast::channel`] requirement).
    pub fn new(capacity: usize) -> Self {
        let (map_updates, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        Self {
            map_updates,
            diagnostics,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers that were handed the event, or
    /// [`MapError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: MapEvent) -> Result<usize, MapError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| MapError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a single topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Current number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<MapEvent> {
        match topic {
            Topic::MapUpdates => &self.map_updates,
            Topic::Diagnostics => &self.diagnostics,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to one [`Topic`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<MapEvent>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// * `Err(RecvError::Lagged(n))`: the subscriber fell behind and `n`
    ///   events were dropped.
    /// * `Err(RecvError::Closed)`: every [`EventBus`] clone has been dropped.
    pub async fn recv(&mut self) -> Result<MapEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<MapEvent, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mapfuse_types::{MapEventPayload, SkipReason};

    fn skipped(source: &str) -> MapEvent {
        MapEvent::new(
            source,
            MapEventPayload::FrameSkipped {
                stamp: Utc::now(),
                reason: SkipReason::PoseUnavailable,
            },
        )
    }

    #[test]
    fn publish_without_subscribers_is_channel_error() {
        let bus = EventBus::default();
        let err = bus.publish_to(Topic::MapUpdates, skipped("test")).unwrap_err();
        assert!(matches!(err, MapError::Channel(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut first = bus.subscribe_to(Topic::MapUpdates);
        let mut second = bus.subscribe_to(Topic::MapUpdates);
        assert_eq!(bus.subscriber_count(Topic::MapUpdates), 2);

        let event = skipped("map_builder");
        assert_eq!(bus.publish_to(Topic::MapUpdates, event.clone())?, 2);

        assert_eq!(first.recv().await?.id, event.id);
        assert_eq!(second.recv().await?.id, event.id);
        assert_eq!(first.topic(), Topic::MapUpdates);
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut diagnostics = bus.subscribe_to(Topic::Diagnostics);
        let _updates = bus.subscribe_to(Topic::MapUpdates);

        bus.publish_to(Topic::MapUpdates, skipped("map_builder"))?;

        assert!(matches!(
            diagnostics.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::MapUpdates);

        for _ in 0..32 {
            let _ = bus.publish_to(Topic::MapUpdates, skipped("flood"));
        }

        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn dropping_every_bus_closes_receivers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Diagnostics);
        drop(bus);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
