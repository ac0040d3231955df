//! Ambient health/diagnostic HTTP surface (§10).
//!
//! This is observability, not the call-control path: no ARI, AudioSocket,
//! or Realtime traffic flows through axum. `GET /health` reports liveness
//! and active call count for operators and orchestration probes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::call::CallManager;
use crate::protocol_constants::SERVICE_ID;

#[derive(Clone)]
pub struct HealthState {
    pub call_manager: CallManager,
    pub version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    service: &'static str,
    version: &'static str,
    status: &'static str,
    active_calls: usize,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_ID,
        version: state.version,
        status: "ok",
        active_calls: state.call_manager.active_call_count(),
    })
}

/// Builds the ambient health router.
pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::InMemoryCallStore;
    use crate::config::Config;
    use crate::events::BroadcastEventBridge;
    use std::sync::Arc;

    #[tokio::test]
    async fn health_endpoint_reports_service_id() {
        let (tx, _rx) = tokio::sync::broadcast::channel(8);
        let call_manager = CallManager::new(
            Arc::new(crate::ari::AriRestClient::new(
                reqwest::Client::new(),
                "http://10.0.0.1:8088/ari".into(),
                "asterisk".into(),
                "secret".into(),
            )),
            Arc::new(InMemoryCallStore::new()),
            Arc::new(BroadcastEventBridge::with_sender(tx)),
            Arc::new(Config::default()),
            tokio_util::sync::CancellationToken::new(),
        );
        let state = HealthState {
            call_manager,
            version: env!("CARGO_PKG_VERSION"),
        };
        let Json(body) = health(State(state)).await;
        assert_eq!(body.service, SERVICE_ID);
        assert_eq!(body.status, "ok");
        assert_eq!(body.active_calls, 0);
    }
}
