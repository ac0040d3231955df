//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root — the single place where all
//! services are instantiated and wired together. Wiring order matters:
//!
//! 1. Shared infrastructure (HTTP client, broadcast channel, cancellation token)
//! 2. ARI REST client (depends on HTTP client, config)
//! 3. Call store (no dependencies)
//! 4. AudioSocket server (binds immediately so the port is reserved)

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ari::AriRestClient;
use crate::audiosocket::AudioSocketServer;
use crate::call::{CallManager, CallStore, InMemoryCallStore};
use crate::config::Config;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{BroadcastEvent, BroadcastEventBridge};
use crate::protocol_constants::EVENT_CHANNEL_CAPACITY;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// ARI REST client for bridge/channel/dial/hangup commands.
    pub ari: Arc<AriRestClient>,
    /// Call persistence collaborator.
    pub call_store: Arc<dyn CallStore>,
    /// Broadcast channel sender for the ambient health/diagnostic surface.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Event bridge for emitting call/audio events.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Spawns and routes per-call orchestrator tasks.
    pub call_manager: CallManager,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
}

impl BootstrappedServices {
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Initiates graceful shutdown: cancels the shared token so every
    /// per-call orchestrator task begins its hangup sequence.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] beginning graceful shutdown");
        self.cancel_token.cancel();
    }
}

fn create_http_client(timeout: Duration) -> BridgeResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BridgeError::Internal(format!("failed to create HTTP client: {e}")))
}

/// Bootstraps all application services with their dependencies.
pub fn bootstrap_services(config: &Config) -> BridgeResult<BootstrappedServices> {
    let http_client = create_http_client(Duration::from_secs(config.ari_timeout_secs))?;

    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(EVENT_CHANNEL_CAPACITY);
    let event_bridge = Arc::new(BroadcastEventBridge::with_sender(broadcast_tx.clone()));
    let cancel_token = CancellationToken::new();

    let ari = Arc::new(AriRestClient::new(
        http_client.clone(),
        config.ari_base_url(),
        config.ari_user.clone(),
        config.ari_pass.clone(),
    ));

    let call_store: Arc<dyn CallStore> = Arc::new(InMemoryCallStore::new());

    let call_manager = CallManager::new(
        ari.clone(),
        call_store.clone(),
        event_bridge.clone(),
        Arc::new(config.clone()),
        cancel_token.clone(),
    );

    Ok(BootstrappedServices {
        ari,
        call_store,
        broadcast_tx,
        event_bridge,
        call_manager,
        cancel_token,
        http_client,
    })
}

/// Binds the AudioSocket server. Separate from [`bootstrap_services`] because
/// binding is fallible on its own I/O error type and async, while service
/// wiring is synchronous.
pub async fn bind_audiosocket_server(config: &Config) -> BridgeResult<AudioSocketServer> {
    AudioSocketServer::bind(&config.audiosocket_host, config.audiosocket_port)
        .await
        .map_err(BridgeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_client_is_created_with_configured_timeout() {
        let client = create_http_client(Duration::from_secs(30)).unwrap();
        assert!(client.get("http://example.test").build().is_ok());
    }

    #[tokio::test]
    async fn bootstrap_services_wires_ari_and_store() {
        let config = Config {
            ari_host: "10.0.0.1:8088".into(),
            ari_user: "asterisk".into(),
            ari_pass: "secret".into(),
            ..Default::default()
        };
        let services = bootstrap_services(&config).unwrap();
        assert!(Arc::strong_count(&services.ari) >= 1);
    }
}
