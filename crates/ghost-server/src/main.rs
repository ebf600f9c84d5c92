mod config;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ghost_api::AppStateInner;
use ghost_crypto::{Codec, EncryptionKey};
use ghost_gateway::Dispatcher;
use ghost_rooms::{Lifecycle, run_expiry_sweep};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `ghost-server generate-key` prints a fresh key for GHOST_ENCRYPTION_KEY.
    if std::env::args().nth(1).as_deref() == Some("generate-key") {
        println!("{}", EncryptionKey::generate().to_hex());
        return Ok(());
    }

    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ghost_server=debug,ghost_api=debug,ghost_rooms=debug,ghost_gateway=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let lifecycle = Lifecycle::new(
        Codec::new(&config.encryption_key),
        Dispatcher::new(),
        config.room_ttl_secs,
    );

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(run_expiry_sweep(
        lifecycle.clone(),
        config.sweep_interval,
        cancel.clone(),
    ));

    let app = ghost_api::router(AppStateInner::new(lifecycle));

    let addr = config.bind_address()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Ghost server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    sweeper.await?;
    info!("Ghost server shut down");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels background work.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down"),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    cancel.cancel();
}
