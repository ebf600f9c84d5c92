use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ghost_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::{Dispatcher, Subscription};
use crate::membership::Membership;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Upper bound on rooms a single connection may watch.
const MAX_ROOMS_PER_CONNECTION: usize = 16;

/// Handle a single WebSocket connection.
///
/// The client sends `Subscribe` with its participant token to pick its rooms;
/// the server acknowledges with `Subscribed` and then forwards
/// `Message`/`Destroy` events. The subscription is released as soon as the
/// loop exits.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    membership: Arc<dyn Membership>,
) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut subscription: Option<Subscription> = None;

    info!("Gateway connection {} opened", conn_id);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            event = next_event(&mut subscription) => {
                let Some(event) = event else {
                    subscription = None;
                    continue;
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<GatewayCommand>(text.as_str()) {
                            Ok(cmd) => handle_command(&dispatcher, membership.as_ref(), conn_id, cmd, &mut subscription),
                            Err(e) => {
                                warn!(
                                    "Gateway connection {} bad command: {} -- raw: {}",
                                    conn_id,
                                    e,
                                    text.as_str().chars().take(200).collect::<String>()
                                );
                                Some(GatewayEvent::Error { reason: format!("bad command: {e}") })
                            }
                        };
                        if let Some(reply) = reply {
                            if send_event(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Gateway connection {} heartbeat timeout (missed {} pongs), dropping", conn_id, missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(subscription);
    info!("Gateway connection {} closed", conn_id);
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<GatewayEvent> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Apply a client command. Returns the reply to send back, if any.
fn handle_command(
    dispatcher: &Dispatcher,
    membership: &dyn Membership,
    conn_id: Uuid,
    cmd: GatewayCommand,
    subscription: &mut Option<Subscription>,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Subscribe { room_ids, events, token } => {
            if room_ids.len() > MAX_ROOMS_PER_CONNECTION {
                return Some(GatewayEvent::Error {
                    reason: format!("at most {MAX_ROOMS_PER_CONNECTION} rooms per connection"),
                });
            }
            if let Some(denied) = room_ids
                .iter()
                .find(|room_id| !token.is_some_and(|t| membership.is_member(**room_id, t)))
            {
                warn!(
                    "Gateway connection {} denied subscription to room {}",
                    conn_id, denied
                );
                return Some(GatewayEvent::Error {
                    reason: format!("not a participant of room {denied}"),
                });
            }
            debug!(
                "Gateway connection {} subscribing to {} rooms",
                conn_id,
                room_ids.len()
            );
            // Release the old subscription before registering the new one.
            *subscription = None;
            let sub = dispatcher.subscribe(room_ids, events);
            let room_ids = sub.room_ids().to_vec();
            *subscription = Some(sub);
            Some(GatewayEvent::Subscribed { room_ids })
        }

        GatewayCommand::Unsubscribe => {
            debug!("Gateway connection {} unsubscribing", conn_id);
            *subscription = None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use ghost_types::events::EventName;
    use ghost_types::models::RoomId;

    /// Fixed set of (room, token) pairs.
    #[derive(Default)]
    struct Members(HashSet<(RoomId, Uuid)>);

    impl Members {
        fn admit(&mut self, room_id: RoomId) -> Uuid {
            let token = Uuid::new_v4();
            self.0.insert((room_id, token));
            token
        }
    }

    impl Membership for Members {
        fn is_member(&self, room_id: RoomId, token: Uuid) -> bool {
            self.0.contains(&(room_id, token))
        }
    }

    fn subscribe(room_ids: Vec<RoomId>, token: Option<Uuid>) -> GatewayCommand {
        GatewayCommand::Subscribe { room_ids, events: EventName::all(), token }
    }

    #[test]
    fn subscribe_replaces_previous_subscription() {
        let dispatcher = Dispatcher::new();
        let mut members = Members::default();
        let conn_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let first_token = members.admit(first);
        let second_token = members.admit(second);
        let mut subscription = None;

        let reply = handle_command(
            &dispatcher,
            &members,
            conn_id,
            subscribe(vec![first], Some(first_token)),
            &mut subscription,
        );
        assert_eq!(reply, Some(GatewayEvent::Subscribed { room_ids: vec![first] }));
        assert_eq!(dispatcher.subscriber_count(first), 1);

        handle_command(
            &dispatcher,
            &members,
            conn_id,
            subscribe(vec![second], Some(second_token)),
            &mut subscription,
        );
        assert_eq!(dispatcher.subscriber_count(first), 0);
        assert_eq!(dispatcher.subscriber_count(second), 1);
    }

    #[test]
    fn unsubscribe_releases_channel() {
        let dispatcher = Dispatcher::new();
        let mut members = Members::default();
        let room = Uuid::new_v4();
        let token = members.admit(room);
        let mut subscription = None;

        handle_command(&dispatcher, &members, Uuid::new_v4(), subscribe(vec![room], Some(token)), &mut subscription);
        let reply = handle_command(&dispatcher, &members, Uuid::new_v4(), GatewayCommand::Unsubscribe, &mut subscription);

        assert!(reply.is_none());
        assert!(subscription.is_none());
        assert_eq!(dispatcher.subscriber_count(room), 0);
    }

    #[test]
    fn too_many_rooms_rejected() {
        let dispatcher = Dispatcher::new();
        let members = Members::default();
        let mut subscription = None;
        let room_ids: Vec<Uuid> = (0..=MAX_ROOMS_PER_CONNECTION).map(|_| Uuid::new_v4()).collect();

        let reply = handle_command(&dispatcher, &members, Uuid::new_v4(), subscribe(room_ids, None), &mut subscription);
        assert!(matches!(reply, Some(GatewayEvent::Error { .. })));
        assert!(subscription.is_none());
    }

    #[test]
    fn outsider_cannot_subscribe() {
        let dispatcher = Dispatcher::new();
        let mut members = Members::default();
        let room = Uuid::new_v4();
        let other_room = Uuid::new_v4();
        let other_token = members.admit(other_room);
        let mut subscription = None;

        for token in [None, Some(Uuid::new_v4()), Some(other_token)] {
            let reply = handle_command(&dispatcher, &members, Uuid::new_v4(), subscribe(vec![room], token), &mut subscription);
            assert!(matches!(reply, Some(GatewayEvent::Error { .. })));
            assert!(subscription.is_none());
            assert_eq!(dispatcher.subscriber_count(room), 0);
        }
    }

    #[test]
    fn one_foreign_room_rejects_whole_subscription() {
        let dispatcher = Dispatcher::new();
        let mut members = Members::default();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let token = members.admit(mine);
        members.admit(theirs);
        let mut subscription = None;

        let reply = handle_command(&dispatcher, &members, Uuid::new_v4(), subscribe(vec![mine, theirs], Some(token)), &mut subscription);
        assert!(matches!(reply, Some(GatewayEvent::Error { .. })));
        assert_eq!(dispatcher.subscriber_count(mine), 0);
    }
}
