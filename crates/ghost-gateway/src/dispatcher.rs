use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use ghost_types::events::{EventName, GatewayEvent};
use ghost_types::models::RoomId;

/// One subscriber's endpoint on one room channel.
struct Subscriber {
    events: HashSet<EventName>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Fans room events out to every subscriber of the room's channel.
///
/// Each subscription owns an unbounded queue, so a slow reader never loses a
/// `destroy`. `publish` is synchronous and is meant to be called from inside
/// the room store's critical section, which fixes the per-room event order.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// room_id -> (subscription_id -> subscriber)
    channels: RwLock<HashMap<RoomId, HashMap<Uuid, Subscriber>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `events` on every room in `room_ids`.
    ///
    /// Events published after this call returns are delivered to the returned
    /// [`Subscription`] until it is dropped.
    pub fn subscribe(
        &self,
        room_ids: impl IntoIterator<Item = RoomId>,
        events: impl IntoIterator<Item = EventName>,
    ) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let events: HashSet<EventName> = events.into_iter().collect();
        let room_ids: Vec<RoomId> = room_ids
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        {
            let mut channels = self
                .inner
                .channels
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for room_id in &room_ids {
                channels.entry(*room_id).or_default().insert(
                    id,
                    Subscriber {
                        events: events.clone(),
                        tx: tx.clone(),
                    },
                );
            }
        }

        Subscription {
            id,
            room_ids,
            rx,
            dispatcher: self.clone(),
        }
    }

    /// Deliver a room event to the subscribers of its channel.
    /// Returns how many subscribers it was queued for.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        let (Some(room_id), Some(name)) = (event.room_id(), event.name()) else {
            return 0;
        };

        let channels = self
            .inner
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = channels.get(&room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for subscriber in subscribers.values() {
            if subscriber.events.contains(&name) && subscriber.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!("Published {:?} for room {} to {} subscribers", name, room_id, delivered);
        delivered
    }

    /// Number of live subscriptions on a room channel.
    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.inner
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&room_id)
            .map_or(0, HashMap::len)
    }

    fn unsubscribe(&self, id: Uuid, room_ids: &[RoomId]) {
        let mut channels = self
            .inner
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for room_id in room_ids {
            if let Some(subscribers) = channels.get_mut(room_id) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    channels.remove(room_id);
                }
            }
        }
    }
}

/// A live subscription. Dropping it unsubscribes; nothing queued for it can be
/// observed afterwards.
pub struct Subscription {
    id: Uuid,
    room_ids: Vec<RoomId>,
    rx: mpsc::UnboundedReceiver<GatewayEvent>,
    dispatcher: Dispatcher,
}

impl Subscription {
    pub fn room_ids(&self) -> &[RoomId] {
        &self.room_ids
    }

    /// Wait for the next event. Never returns `None` while subscribed.
    pub async fn next(&mut self) -> Option<GatewayEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<GatewayEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = GatewayEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.id, &self.room_ids);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_types::models::{MessageStatus, MessageView};

    fn message(room_id: RoomId, id: u64) -> GatewayEvent {
        GatewayEvent::Message {
            room_id,
            message: MessageView {
                id,
                sender: "A".into(),
                text: format!("msg {id}"),
                timestamp: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
                status: MessageStatus::Ok,
            },
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let mut sub = dispatcher.subscribe([room], EventName::all());

        dispatcher.publish(message(room, 1));
        dispatcher.publish(message(room, 2));
        dispatcher.publish(GatewayEvent::Destroy { room_id: room });

        assert_eq!(sub.next().await, Some(message(room, 1)));
        assert_eq!(sub.next().await, Some(message(room, 2)));
        assert_eq!(sub.next().await, Some(GatewayEvent::Destroy { room_id: room }));
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let dispatcher = Dispatcher::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let mut sub = dispatcher.subscribe([room_a], EventName::all());

        assert_eq!(dispatcher.publish(GatewayEvent::Destroy { room_id: room_b }), 0);
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn filters_by_event_name() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let mut sub = dispatcher.subscribe([room], [EventName::Destroy]);

        assert_eq!(dispatcher.publish(message(room, 1)), 0);
        assert_eq!(dispatcher.publish(GatewayEvent::Destroy { room_id: room }), 1);
        assert_eq!(sub.next().await, Some(GatewayEvent::Destroy { room_id: room }));
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let mut first = dispatcher.subscribe([room], EventName::all());
        let mut second = dispatcher.subscribe([room], EventName::all());

        assert_eq!(dispatcher.publish(GatewayEvent::Destroy { room_id: room }), 2);
        assert!(first.try_next().is_some());
        assert!(second.try_next().is_some());
    }

    #[test]
    fn drop_unsubscribes_synchronously() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let sub = dispatcher.subscribe([room, room], EventName::all());
        assert_eq!(sub.room_ids(), &[room]);
        assert_eq!(dispatcher.subscriber_count(room), 1);

        sub.unsubscribe();
        assert_eq!(dispatcher.subscriber_count(room), 0);
        assert_eq!(dispatcher.publish(GatewayEvent::Destroy { room_id: room }), 0);
    }

    #[test]
    fn connection_events_are_not_published() {
        let dispatcher = Dispatcher::new();
        let _sub = dispatcher.subscribe([Uuid::new_v4()], EventName::all());
        assert_eq!(
            dispatcher.publish(GatewayEvent::Error { reason: "x".into() }),
            0
        );
    }
}
