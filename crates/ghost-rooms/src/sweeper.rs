//! Background expiry sweep.
//!
//! Lazy expiry only fires when someone touches a room. The sweep destroys
//! rooms that nobody reads after their TTL, so their `destroy` event still
//! goes out and their ciphertext does not linger in memory.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lifecycle::Lifecycle;

pub async fn run_expiry_sweep(lifecycle: Lifecycle, interval: Duration, cancel: CancellationToken) {
    info!("Expiry sweep started (every {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&lifecycle),
            _ = cancel.cancelled() => break,
        }
    }

    info!("Expiry sweep stopped");
}

fn sweep_once(lifecycle: &Lifecycle) {
    match lifecycle.sweep() {
        Ok(0) => {}
        Ok(destroyed) => debug!("Expiry sweep destroyed {} rooms", destroyed),
        // Unavailable store: try again on the next tick.
        Err(e) => warn!("Expiry sweep failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_crypto::{Codec, EncryptionKey};
    use ghost_gateway::Dispatcher;
    use ghost_types::events::{EventName, GatewayEvent};

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(Codec::new(&EncryptionKey::generate()), Dispatcher::new(), 60)
    }

    #[tokio::test]
    async fn untouched_room_is_destroyed_after_ttl() {
        let lifecycle = lifecycle();
        let room = lifecycle.create_room_with_ttl(1).unwrap();
        let mut sub = lifecycle.dispatcher().subscribe([room.id], EventName::all());

        let cancel = CancellationToken::new();
        let sweep = tokio::spawn(run_expiry_sweep(
            lifecycle.clone(),
            Duration::from_millis(100),
            cancel.clone(),
        ));

        let event = tokio::time::timeout(Duration::from_secs(3), sub.next())
            .await
            .expect("room should be swept within 3s");
        assert_eq!(event, Some(GatewayEvent::Destroy { room_id: room.id }));
        assert_eq!(lifecycle.room_count().unwrap(), 0);

        cancel.cancel();
        sweep.await.unwrap();
    }

    #[tokio::test]
    async fn live_rooms_survive_the_sweep() {
        let lifecycle = lifecycle();
        let room = lifecycle.create_room().unwrap();

        let cancel = CancellationToken::new();
        let sweep = tokio::spawn(run_expiry_sweep(
            lifecycle.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        sweep.await.unwrap();

        assert!(lifecycle.room(room.id).is_ok());
    }

    #[tokio::test]
    async fn exits_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(
            Duration::from_secs(1),
            run_expiry_sweep(lifecycle(), Duration::from_secs(60), cancel),
        )
        .await
        .expect("sweep should stop once cancelled");
    }
}
