//! The call manager: the seam between the out-of-scope "place a call"
//! control plane and the per-call orchestrator/session tasks (§1, §9).
//!
//! Owning a registry of live calls lets inbound ARI events (keyed by
//! channel id) and AudioSocket identify handshakes (keyed by call UUID) be
//! routed to the right orchestrator mailbox without the transport layers
//! knowing anything about call lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::Call;
use super::orchestrator::{self, OrchestratorEvent};
use super::store::CallStore;
use crate::ari::{AriEvent, AriRestClient};
use crate::config::Config;
use crate::error::{BridgeError, BridgeResult};
use crate::events::BroadcastEventBridge;
use crate::protocol_constants::EVENT_CHANNEL_CAPACITY;

fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Spawns and routes per-call orchestrator tasks.
///
/// One `CallManager` per process. `place_call` is the library-level
/// equivalent of the control plane's "place a call" endpoint (§1); the
/// binary that owns the HTTP surface, if any, is expected to call it.
#[derive(Clone)]
pub struct CallManager {
    ari: Arc<AriRestClient>,
    store: Arc<dyn CallStore>,
    events: Arc<BroadcastEventBridge>,
    config: Arc<Config>,
    mailboxes: Arc<DashMap<Uuid, mpsc::Sender<OrchestratorEvent>>>,
    cancel: CancellationToken,
}

impl CallManager {
    pub fn new(
        ari: Arc<AriRestClient>,
        store: Arc<dyn CallStore>,
        events: Arc<BroadcastEventBridge>,
        config: Arc<Config>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ari,
            store,
            events,
            config,
            mailboxes: Arc::new(DashMap::new()),
            cancel,
        }
    }

    /// Creates a `Call`, persists it, and spawns its orchestrator task.
    /// Returns the assigned UUID immediately; failures after this point are
    /// only observable through the status log (§7's user-visible behavior).
    pub async fn place_call(&self, destination: String) -> BridgeResult<Uuid> {
        let call = Call::new(destination, now_unix_ms());
        let call_id = call.id;
        self.store.create_call(call.clone()).await?;

        let (tx, rx) = mpsc::channel(32);
        self.mailboxes.insert(call_id, tx);

        let ari = self.ari.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let cancel = self.cancel.child_token();
        let app_name = self.config.stasis_app_name.clone();
        let external_media_host = self.config.external_host.clone();
        let audio_format =
            orchestrator::external_media_format(self.config.input_format == crate::config::InputFormat::G711Alaw)
                .to_string();
        let mailboxes = self.mailboxes.clone();

        tokio::spawn(async move {
            orchestrator::run(call, ari, store, events, rx, cancel, app_name, external_media_host, audio_format)
                .await;
            mailboxes.remove(&call_id);
        });

        Ok(call_id)
    }

    /// Routes an ARI event to the orchestrator mailbox for the call that
    /// owns its channel, if any live call does.
    pub async fn dispatch_ari_event(&self, event: AriEvent) {
        let channel_id = match ari_event_channel_id(&event) {
            Some(id) => id,
            None => return,
        };

        let call = match self.store.get_by_channel(channel_id).await {
            Ok(Some(call)) => call,
            Ok(None) => return,
            Err(e) => {
                log::warn!("[CallManager] get_by_channel({channel_id}) failed: {e}");
                return;
            }
        };

        if let Some(mailbox) = self.mailboxes.get(&call.id) {
            if mailbox.send(OrchestratorEvent::Ari(event)).await.is_err() {
                log::debug!("[CallManager] mailbox for {} closed", call.id);
            }
        }
    }

    /// Routes an AudioSocket IDENTIFY handshake to its call's mailbox.
    pub async fn dispatch_audiosocket_identified(&self, call_id: Uuid) {
        if let Some(mailbox) = self.mailboxes.get(&call_id) {
            if mailbox
                .send(OrchestratorEvent::AudioSocketIdentified(call_id))
                .await
                .is_err()
            {
                log::debug!("[CallManager] mailbox for {call_id} closed");
            }
        } else {
            log::warn!("[CallManager] AudioSocket identified for unknown call {call_id}");
        }
    }

    /// Number of calls currently tracked, for the ambient health endpoint.
    pub fn active_call_count(&self) -> usize {
        self.mailboxes.len()
    }
}

fn ari_event_channel_id(event: &AriEvent) -> Option<&str> {
    match event {
        AriEvent::StasisStart { channel, .. } => Some(&channel.id),
        AriEvent::StasisEnd { channel } => Some(&channel.id),
        AriEvent::Dial { peer, .. } => peer.as_ref().map(|p| p.id.as_str()),
        AriEvent::ChannelVarset { channel, .. } => Some(&channel.id),
        AriEvent::ChannelHangupRequest { channel } => Some(&channel.id),
        AriEvent::ChannelDestroyed { channel } => Some(&channel.id),
        AriEvent::ChannelStateChange { channel } => Some(&channel.id),
        AriEvent::ChannelLeftBridge { channel, .. } => Some(&channel.id),
        AriEvent::ChannelEnteredBridge { channel, .. } => Some(&channel.id),
        AriEvent::ChannelDialplan { channel } => Some(&channel.id),
        AriEvent::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::InMemoryCallStore;
    use crate::events::BroadcastEventBridge;

    fn test_manager() -> CallManager {
        let (tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        CallManager::new(
            Arc::new(AriRestClient::new(
                reqwest::Client::new(),
                "http://10.0.0.1:8088/ari".into(),
                "asterisk".into(),
                "secret".into(),
            )),
            Arc::new(InMemoryCallStore::new()),
            Arc::new(BroadcastEventBridge::with_sender(tx)),
            Arc::new(Config {
                ari_host: "10.0.0.1:8088".into(),
                ari_user: "asterisk".into(),
                ari_pass: "secret".into(),
                openai_api_key: "sk-test".into(),
                external_host: "10.0.0.2:7575".into(),
                ..Default::default()
            }),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn placing_a_call_registers_its_mailbox() {
        let manager = test_manager();
        assert_eq!(manager.active_call_count(), 0);
        let _ = manager.place_call("79117772200".into()).await.unwrap();
        // The orchestrator task is spawned asynchronously; the mailbox is
        // inserted synchronously before the task starts, so it is visible
        // immediately without waiting on the task.
        assert_eq!(manager.active_call_count(), 1);
    }

    #[tokio::test]
    async fn dispatch_to_unknown_call_is_a_noop() {
        let manager = test_manager();
        manager.dispatch_audiosocket_identified(Uuid::new_v4()).await;
        assert_eq!(manager.active_call_count(), 0);
    }
}
