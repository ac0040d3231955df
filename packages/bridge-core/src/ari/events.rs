//! The ARI events WebSocket consumer (§6): one long-lived subscription per
//! process at `ws://<host>/ari/events?app=<name>`, Basic auth in the URL.
//! No reconnect within a call — a drop is surfaced as an `AriError::WebSocket`
//! and the orchestrator fails the affected calls.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;

use super::rest::{AriError, AriResult};

/// The subset of ARI Stasis application events the orchestrator consumes (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AriEvent {
    StasisStart {
        channel: ChannelSnapshot,
        #[serde(default)]
        args: Vec<String>,
    },
    StasisEnd {
        channel: ChannelSnapshot,
    },
    Dial {
        #[serde(default)]
        peer: Option<ChannelSnapshot>,
        dialstatus: String,
    },
    ChannelVarset {
        channel: ChannelSnapshot,
        variable: String,
        value: String,
    },
    ChannelHangupRequest {
        channel: ChannelSnapshot,
    },
    ChannelDestroyed {
        channel: ChannelSnapshot,
    },
    ChannelStateChange {
        channel: ChannelSnapshot,
    },
    ChannelLeftBridge {
        channel: ChannelSnapshot,
        bridge: BridgeSnapshot,
    },
    ChannelEnteredBridge {
        channel: ChannelSnapshot,
        bridge: BridgeSnapshot,
    },
    ChannelDialplan {
        channel: ChannelSnapshot,
    },
    /// Any event type not enumerated above (§6: unrecognized events are
    /// logged and dropped, not fatal).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSnapshot {
    pub id: String,
}

/// Connects to the ARI events WebSocket and yields decoded events.
///
/// `events_url` is `ws://host/ari/events?app=name`; Basic auth is added as
/// an `Authorization` header on the upgrade request, matching how the REST
/// client authenticates (§4.3).
pub async fn connect(
    events_url: &str,
    user: &str,
    pass: &str,
) -> AriResult<impl futures::Stream<Item = AriResult<AriEvent>>> {
    let mut request = events_url
        .into_client_request()
        .map_err(|e| AriError::WebSocket(e.to_string()))?;
    let credentials = crate::ari::basic_auth_header(user, pass);
    request.headers_mut().insert(
        AUTHORIZATION,
        credentials
            .parse()
            .map_err(|_| AriError::WebSocket("invalid auth header".into()))?,
    );

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| AriError::WebSocket(e.to_string()))?;

    let (_write, read) = stream.split();
    Ok(read.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => {
                Some(serde_json::from_str::<AriEvent>(&text).map_err(|e| AriError::Parse(e.to_string())))
            }
            Ok(Message::Close(_)) => Some(Err(AriError::WebSocket("connection closed".into()))),
            Ok(_) => None,
            Err(e) => Some(Err(AriError::WebSocket(e.to_string()))),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stasis_start_deserializes_from_ari_json() {
        let json = r#"{"type":"StasisStart","channel":{"id":"C1","name":"PJSIP/trunk-1"},"args":[]}"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        match event {
            AriEvent::StasisStart { channel, .. } => assert_eq!(channel.id, "C1"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unrecognized_event_type_falls_back_to_other() {
        let json = r#"{"type":"TextMessageReceived"}"#;
        let event: AriEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, AriEvent::Other));
    }
}
