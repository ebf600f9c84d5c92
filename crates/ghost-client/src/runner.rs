use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ghost_types::models::RoomId;

use crate::error::ClientError;
use crate::http::RoomClient;
use crate::realtime::RealtimeConnection;
use crate::session::{Applied, RoomSession, SessionEnd};

/// Display tick.
const TICK: Duration = Duration::from_secs(1);

/// Re-read the authoritative TTL every this many ticks.
const RESYNC_TICKS: u32 = 15;

/// Follow a room as the participant holding `token` until it ends, calling
/// `on_update` whenever the local view changes.
///
/// Subscribes first and then re-reads the room, so a destroy that lands
/// between the initial fetch and the subscription is still noticed.
/// Transport failures after the session is established end it with
/// [`SessionEnd::ConnectionLost`] instead of an error. Cancellation is
/// honoured while any request is in flight.
pub async fn run_session<F>(
    client: &RoomClient,
    room_id: RoomId,
    token: Uuid,
    cancel: CancellationToken,
    mut on_update: F,
) -> Result<SessionEnd, ClientError>
where
    F: FnMut(&RoomSession),
{
    let Some(ttl) = cancellable(&cancel, client.ttl(room_id)).await else {
        return Ok(SessionEnd::Cancelled);
    };
    let Some(ttl) = gone_or(ttl)? else {
        return Ok(SessionEnd::Destroyed);
    };
    let mut session = RoomSession::new(room_id, ttl, Instant::now());
    if let Some(end) = session.ended() {
        return Ok(end);
    }

    let gateway_url = client.gateway_url();
    let connect = RealtimeConnection::connect(&gateway_url, vec![room_id], token);
    let mut realtime = match cancellable(&cancel, connect).await {
        None => return Ok(SessionEnd::Cancelled),
        Some(Ok(realtime)) => realtime,
        // The gateway refuses rooms that are already gone.
        Some(Err(ClientError::Protocol(reason))) => {
            return match cancellable(&cancel, client.ttl(room_id)).await {
                None => Ok(SessionEnd::Cancelled),
                Some(Err(ClientError::RoomGone)) => Ok(SessionEnd::Destroyed),
                Some(_) => Err(ClientError::Protocol(reason)),
            };
        }
        Some(Err(e)) => return Err(e),
    };

    if let Some(end) = prime(client, token, &cancel, &mut session).await? {
        realtime.close().await;
        return Ok(end);
    }
    on_update(&session);
    info!("Session for room {} established", room_id);

    let mut ticker = tokio::time::interval(TICK);
    ticker.tick().await;
    let mut ticks: u32 = 0;

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break session.end(SessionEnd::Cancelled),

            event = realtime.next_event() => {
                let event = match event {
                    Ok(Some(event)) => event,
                    Ok(None) => break session.end(SessionEnd::ConnectionLost),
                    Err(e) => {
                        warn!("Gateway connection for room {} failed: {}", room_id, e);
                        break session.end(SessionEnd::ConnectionLost);
                    }
                };
                match session.apply(event, Instant::now()) {
                    Applied::Appended(_) => on_update(&session),
                    Applied::Gap { expected, got } => {
                        debug!("Message gap in room {} (expected {}, got {}), refetching", room_id, expected, got);
                        match cancellable(&cancel, client.messages(room_id, token)).await {
                            None => break session.end(SessionEnd::Cancelled),
                            Some(Ok(messages)) => session.replace_messages(messages),
                            Some(Err(ClientError::RoomGone)) => break session.end(SessionEnd::Destroyed),
                            Some(Err(e)) => warn!("Refetch for room {} failed: {}", room_id, e),
                        }
                        on_update(&session);
                    }
                    Applied::Ended(end) => break end,
                    Applied::Duplicate | Applied::Ignored => {}
                }
            }

            _ = ticker.tick() => {
                ticks += 1;
                let local_zero = session.remaining(Instant::now()) == 0;
                if local_zero || ticks % RESYNC_TICKS == 0 {
                    match cancellable(&cancel, client.ttl(room_id)).await {
                        None => break session.end(SessionEnd::Cancelled),
                        Some(Ok(ttl)) => session.sync_ttl(ttl, Instant::now()),
                        Some(Err(ClientError::RoomGone)) => {
                            let reason = if local_zero { SessionEnd::Expired } else { SessionEnd::Destroyed };
                            break session.end(reason);
                        }
                        Some(Err(e)) => warn!("TTL resync for room {} failed: {}", room_id, e),
                    }
                    if let Some(end) = session.ended() {
                        break end;
                    }
                }
                on_update(&session);
            }
        }
    };

    realtime.close().await;
    info!("Session for room {} ended: {}", room_id, end);
    Ok(end)
}

/// Once subscribed, verify the room still exists and take the message list.
/// Returns the end reason if the session is over before it starts.
async fn prime(
    client: &RoomClient,
    token: Uuid,
    cancel: &CancellationToken,
    session: &mut RoomSession,
) -> Result<Option<SessionEnd>, ClientError> {
    let room_id = session.room_id();

    let Some(ttl) = cancellable(cancel, client.ttl(room_id)).await else {
        return Ok(Some(SessionEnd::Cancelled));
    };
    match gone_or(ttl)? {
        Some(ttl) => session.sync_ttl(ttl, Instant::now()),
        None => return Ok(Some(SessionEnd::Destroyed)),
    }
    if let Some(end) = session.ended() {
        return Ok(Some(end));
    }

    let Some(messages) = cancellable(cancel, client.messages(room_id, token)).await else {
        return Ok(Some(SessionEnd::Cancelled));
    };
    match gone_or(messages)? {
        Some(messages) => session.replace_messages(messages),
        None => return Ok(Some(SessionEnd::Destroyed)),
    }
    Ok(None)
}

/// Await `fut` unless `cancel` fires first, in which case `None`.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

/// `RoomGone` becomes `None`; other errors pass through.
fn gone_or<T>(result: Result<T, ClientError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ClientError::RoomGone) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(cancellable(&cancel, std::future::pending::<u8>()).await, None);
        assert_eq!(cancellable(&cancel, async { 7 }).await, None);
    }

    #[tokio::test]
    async fn cancellable_passes_output_through() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { 7 }).await, Some(7));
    }
}
