//! The persistence collaborator interface (§6), consumed but not implemented
//! here. `InMemoryCallStore` is the headless/test implementation; a real
//! relational store is out of scope and lives behind this trait.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::model::{Call, Speaker, Status};
use crate::error::BridgeResult;

/// The call persistence collaborator.
///
/// Every method is fire-and-forget from the orchestrator's point of view
/// (§4.2): a `PersistenceError` is logged but never fails the call.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create_call(&self, call: Call) -> BridgeResult<()>;
    async fn append_status(&self, call_id: Uuid, status: Status) -> BridgeResult<()>;
    async fn get_by_uuid(&self, call_id: Uuid) -> BridgeResult<Option<Call>>;
    async fn get_by_channel(&self, channel_id: &str) -> BridgeResult<Option<Call>>;
    async fn get_by_phone(&self, digits: &str) -> BridgeResult<Vec<Call>>;
    async fn add_phrases(&self, call_id: Uuid, speaker: Speaker, texts: Vec<String>) -> BridgeResult<()>;
    async fn update_call(&self, call: Call) -> BridgeResult<()>;
}

/// In-memory `CallStore`, keyed by call UUID with a secondary channel-id index.
///
/// This is the store used by the standalone server and by tests; a durable
/// relational implementation is explicitly out of scope (§1).
#[derive(Default)]
pub struct InMemoryCallStore {
    by_uuid: DashMap<Uuid, Call>,
    channel_to_uuid: DashMap<String, Uuid>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn create_call(&self, call: Call) -> BridgeResult<()> {
        if let Some(channel_id) = &call.channel_id {
            self.channel_to_uuid.insert(channel_id.clone(), call.id);
        }
        self.by_uuid.insert(call.id, call);
        Ok(())
    }

    async fn append_status(&self, call_id: Uuid, status: Status) -> BridgeResult<()> {
        match self.by_uuid.get_mut(&call_id) {
            Some(mut call) => {
                call.status_log.push(status);
                Ok(())
            }
            None => Err(crate::error::BridgeError::CallNotFound(call_id.to_string())),
        }
    }

    async fn get_by_uuid(&self, call_id: Uuid) -> BridgeResult<Option<Call>> {
        Ok(self.by_uuid.get(&call_id).map(|r| r.clone()))
    }

    async fn get_by_channel(&self, channel_id: &str) -> BridgeResult<Option<Call>> {
        let Some(call_id) = self.channel_to_uuid.get(channel_id).map(|r| *r) else {
            return Ok(None);
        };
        self.get_by_uuid(call_id).await
    }

    async fn get_by_phone(&self, digits: &str) -> BridgeResult<Vec<Call>> {
        Ok(self
            .by_uuid
            .iter()
            .filter(|r| r.destination == digits)
            .map(|r| r.clone())
            .collect())
    }

    async fn add_phrases(&self, call_id: Uuid, speaker: Speaker, texts: Vec<String>) -> BridgeResult<()> {
        match self.by_uuid.get_mut(&call_id) {
            Some(mut call) => {
                for text in texts {
                    call.push_utterance(speaker, text);
                }
                Ok(())
            }
            None => Err(crate::error::BridgeError::CallNotFound(call_id.to_string())),
        }
    }

    async fn update_call(&self, call: Call) -> BridgeResult<()> {
        if let Some(channel_id) = &call.channel_id {
            self.channel_to_uuid.insert(channel_id.clone(), call.id);
        }
        self.by_uuid.insert(call.id, call);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::model::CallState;

    #[tokio::test]
    async fn create_and_get_by_uuid_round_trips() {
        let store = InMemoryCallStore::new();
        let call = Call::new("79117772200".into(), 1000);
        let id = call.id;
        store.create_call(call).await.unwrap();

        let fetched = store.get_by_uuid(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.state, CallState::Init);
    }

    #[tokio::test]
    async fn get_by_channel_resolves_through_secondary_index() {
        let store = InMemoryCallStore::new();
        let mut call = Call::new("79117772200".into(), 1000);
        call.set_bridge_id("B1".into());
        call.set_channel_id("C1".into());
        let id = call.id;
        store.create_call(call).await.unwrap();

        let fetched = store.get_by_channel("C1").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn append_status_on_unknown_call_errors() {
        let store = InMemoryCallStore::new();
        let result = store
            .append_status(
                Uuid::new_v4(),
                Status {
                    kind: crate::call::model::StatusKind::Ended,
                    at_unix_ms: 0,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn add_phrases_tags_each_speaker_independently() {
        let store = InMemoryCallStore::new();
        let call = Call::new("79117772200".into(), 1000);
        let id = call.id;
        store.create_call(call).await.unwrap();

        store.add_phrases(id, Speaker::User, vec!["hello".into()]).await.unwrap();
        store.add_phrases(id, Speaker::Agent, vec!["hi there".into()]).await.unwrap();

        let fetched = store.get_by_uuid(id).await.unwrap().unwrap();
        assert_eq!(fetched.dialog.len(), 2);
        assert_eq!(fetched.dialog[0].speaker, Speaker::User);
        assert_eq!(fetched.dialog[1].speaker, Speaker::Agent);
    }

    #[tokio::test]
    async fn get_by_phone_filters_by_destination() {
        let store = InMemoryCallStore::new();
        store
            .create_call(Call::new("111".into(), 0))
            .await
            .unwrap();
        store
            .create_call(Call::new("222".into(), 0))
            .await
            .unwrap();

        let matches = store.get_by_phone("111").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].destination, "111");
    }
}
