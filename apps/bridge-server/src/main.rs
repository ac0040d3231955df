//! Bridge Server - standalone headless Asterisk ARI / AudioSocket / Realtime
//! telephony bridge.
//!
//! The HTTP control plane that accepts "place a call" requests is an
//! external, out-of-scope collaborator; this binary wires together the ARI
//! events consumer, the AudioSocket server, and the per-call orchestrator
//! and media session tasks that `bridge_core::CallManager::place_call`
//! spawns when invoked. It exposes only the ambient `GET /health` surface.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_core::ari;
use bridge_core::bootstrap::{bind_audiosocket_server, bootstrap_services};
use clap::Parser;
use futures::StreamExt;
use tokio::signal;

use crate::config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("bridge-server v{}", env!("CARGO_PKG_VERSION"));

    let config = args.resolve_config().context("failed to resolve configuration")?;
    let config = Arc::new(config);

    let services = bootstrap_services(&config).context("failed to bootstrap services")?;
    let audiosocket_server = bind_audiosocket_server(&config)
        .await
        .context("failed to bind AudioSocket server")?;
    log::info!(
        "AudioSocket listening on {}",
        audiosocket_server.local_addr()?
    );

    let ari_events_task = tokio::spawn(run_ari_events_loop(
        services.call_manager.clone(),
        config.ari_events_url(),
        config.ari_user.clone(),
        config.ari_pass.clone(),
        services.cancel_token.clone(),
    ));

    let audiosocket_task = tokio::spawn(run_audiosocket_accept_loop(
        audiosocket_server,
        services.call_manager.clone(),
        services.call_store.clone(),
        services.event_bridge.clone(),
        config.clone(),
        services.cancel_token.clone(),
    ));

    let health_state = bridge_core::api::HealthState {
        call_manager: services.call_manager.clone(),
        version: env!("CARGO_PKG_VERSION"),
    };
    let health_addr = config.health_bind_addr.clone();
    let health_listener = tokio::net::TcpListener::bind(&health_addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {health_addr}"))?;
    log::info!("Health endpoint listening on {health_addr}");
    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, bridge_core::api::router(health_state)).await {
            log::error!("Health server error: {e}");
        }
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    health_task.abort();
    ari_events_task.abort();
    audiosocket_task.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Subscribes to the ARI events WebSocket for the lifetime of the process
/// and routes each event to its call's orchestrator mailbox. No reconnect
/// within a call: a dropped subscription is fatal to the process (§6), since
/// every live call depends on it to learn of Dial answers and hangups.
async fn run_ari_events_loop(
    call_manager: bridge_core::CallManager,
    events_url: String,
    user: String,
    pass: String,
    cancel: tokio_util::sync::CancellationToken,
) {
    let stream = match ari::connect(&events_url, &user, &pass).await {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("[Main] failed to connect to ARI events: {e}");
            return;
        }
    };
    tokio::pin!(stream);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = stream.next() => {
                match item {
                    Some(Ok(event)) => call_manager.dispatch_ari_event(event).await,
                    Some(Err(e)) => {
                        log::error!("[Main] ARI events stream error: {e}");
                        break;
                    }
                    None => {
                        log::error!("[Main] ARI events stream closed");
                        break;
                    }
                }
            }
        }
    }
}

/// Accepts AudioSocket connections from Asterisk's externalMedia channels,
/// notifies the owning call's orchestrator of the identify handshake, and
/// spawns the per-call media session that relays audio to the Realtime
/// session (§4.1, §4.4, §5).
///
/// The listener is shared across every in-flight call, so which call a
/// connection belongs to is only known once its IDENTIFY frame is read; the
/// UUID is then checked against `call_store` before anything is spawned. An
/// unregistered or stale UUID gets its connection dropped outright — closing
/// both socket halves — rather than a Realtime session opened for it (§3,
/// §8 Property 6, Scenario S3).
async fn run_audiosocket_accept_loop(
    server: bridge_core::audiosocket::AudioSocketServer,
    call_manager: bridge_core::CallManager,
    call_store: Arc<dyn bridge_core::CallStore>,
    event_bridge: Arc<bridge_core::BroadcastEventBridge>,
    config: Arc<bridge_core::Config>,
    cancel: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = server.accept(None) => {
                match accepted {
                    Ok(conn) => {
                        let call_id = conn.call_id;
                        match call_store.get_by_uuid(call_id).await {
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                log::warn!("[Main] AudioSocket identify for unknown call {call_id}, closing connection");
                                continue;
                            }
                            Err(e) => {
                                log::warn!("[Main] call store lookup for {call_id} failed: {e}, closing connection");
                                continue;
                            }
                        }
                        let call_manager = call_manager.clone();
                        let call_store = call_store.clone();
                        let event_bridge = event_bridge.clone();
                        let config = config.clone();
                        let session_cancel = cancel.child_token();
                        tokio::spawn(async move {
                            call_manager.dispatch_audiosocket_identified(call_id).await;
                            if let Err(e) = bridge_core::call::run_media_session(
                                call_id, conn, config, call_store, event_bridge, session_cancel,
                            ).await {
                                log::warn!("[Main] media session for {call_id} ended with error: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("[Main] AudioSocket accept failed: {e}");
                    }
                }
            }
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
