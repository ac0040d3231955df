//! Realtime WebSocket session: sends `session.update` and
//! `input_audio_buffer.append` events, and decodes server events (§4.4).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

use super::{RealtimeError, RealtimeResult};
use crate::protocol_constants::REALTIME_BETA_HEADER_VALUE;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Server-to-client events the bridge acts on (§4.4, §6). Unrecognized
/// event types decode to `Other` rather than failing the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta { delta: String },

    #[serde(rename = "response.audio_transcript.done")]
    TranscriptDone { transcript: String },

    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    UserTranscriptionDelta { delta: String },

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { error: RealtimeErrorBody },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Turn detection parameters mirrored onto `session.update` (§4.4).
#[derive(Debug, Clone, Serialize)]
struct TurnDetection {
    #[serde(rename = "type")]
    kind: &'static str,
    threshold: f32,
    prefix_padding_ms: u64,
    silence_duration_ms: u64,
    create_response: bool,
    interrupt_response: bool,
}

/// Parameters needed to open and configure a Realtime session.
pub struct RealtimeSession {
    pub model: String,
    pub voice: String,
    pub instructions: String,
    pub temperature: f32,
    pub transcription_model: String,
    pub vad_threshold: f32,
    pub vad_prefix_ms: u64,
    pub vad_silence_ms: u64,
}

/// A connected Realtime WebSocket session: a sender half for outbound
/// client events and a receiver half that yields decoded server events.
pub struct RealtimeClient {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Receiver<RealtimeResult<RealtimeEvent>>,
}

impl RealtimeClient {
    /// Connects to `url` with the OpenAI beta header and API-key auth, sends
    /// the initial `session.update`, and spawns the sender/receiver tasks.
    pub async fn connect(url: &str, api_key: &str, session: RealtimeSession) -> RealtimeResult<Self> {
        let mut request = url
            .into_client_request()
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        request.headers_mut().insert(
            AUTHORIZATION,
            format!("Bearer {api_key}")
                .parse()
                .map_err(|_| RealtimeError::Connect("invalid api key header".into()))?,
        );
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            format!("realtime, {REALTIME_BETA_HEADER_VALUE}")
                .parse()
                .map_err(|_| RealtimeError::Connect("invalid protocol header".into()))?,
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        let (mut write, mut read) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(32);
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let decoded = match msg {
                    Ok(Message::Text(text)) => {
                        serde_json::from_str::<RealtimeEvent>(&text).map_err(|e| RealtimeError::Malformed(e.to_string()))
                    }
                    Ok(Message::Close(_)) => Err(RealtimeError::WebSocket("connection closed".into())),
                    Ok(_) => continue,
                    Err(e) => Err(RealtimeError::WebSocket(e.to_string())),
                };
                if inbound_tx.send(decoded).await.is_err() {
                    break;
                }
            }
        });

        let client = Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
        };
        client.send_session_update(&session).await?;
        Ok(client)
    }

    async fn send_session_update(&self, session: &RealtimeSession) -> RealtimeResult<()> {
        let turn_detection = TurnDetection {
            kind: "server_vad",
            threshold: session.vad_threshold,
            prefix_padding_ms: session.vad_prefix_ms,
            silence_duration_ms: session.vad_silence_ms,
            create_response: true,
            interrupt_response: true,
        };
        let payload = json!({
            "type": "session.update",
            "session": {
                "modalities": ["audio", "text"],
                "model": session.model,
                "voice": session.voice,
                "instructions": session.instructions,
                "temperature": session.temperature,
                "input_audio_format": "pcm16",
                "output_audio_format": "pcm16",
                "input_audio_transcription": { "model": session.transcription_model },
                "turn_detection": turn_detection,
            }
        });
        self.send_json(&payload).await
    }

    /// Appends a chunk of base64-encoded PCM16 audio to the input buffer
    /// (§4.4: encoding/decoding is the audio pipeline's responsibility,
    /// this method only frames the wire event).
    pub async fn append_audio(&self, base64_pcm16: &str) -> RealtimeResult<()> {
        let payload = json!({
            "type": "input_audio_buffer.append",
            "audio": base64_pcm16,
        });
        self.send_json(&payload).await
    }

    async fn send_json(&self, payload: &serde_json::Value) -> RealtimeResult<()> {
        let text = serde_json::to_string(payload).map_err(|e| RealtimeError::Malformed(e.to_string()))?;
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| RealtimeError::WebSocket("sender task closed".into()))
    }

    /// Waits for the next server event, subject to a 60s deadline (§6).
    pub async fn recv(&mut self) -> RealtimeResult<RealtimeEvent> {
        match tokio::time::timeout(Duration::from_secs(60), self.inbound.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => Err(RealtimeError::WebSocket("receiver task closed".into())),
            Err(_) => Err(RealtimeError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_delta_event_decodes_from_json() {
        let json = r#"{"type":"response.audio.delta","delta":"AAAA"}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        match event {
            RealtimeEvent::AudioDelta { delta } => assert_eq!(delta, "AAAA"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn speech_started_event_decodes_with_no_fields() {
        let json = r#"{"type":"input_audio_buffer.speech_started"}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, RealtimeEvent::SpeechStarted));
    }

    #[test]
    fn unrecognized_event_falls_back_to_other() {
        let json = r#"{"type":"response.created"}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, RealtimeEvent::Other));
    }

    #[test]
    fn user_transcription_delta_event_decodes_from_json() {
        let json = r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"hel"}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        match event {
            RealtimeEvent::UserTranscriptionDelta { delta } => assert_eq!(delta, "hel"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn response_done_event_decodes_with_no_fields() {
        let json = r#"{"type":"response.done"}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, RealtimeEvent::ResponseDone));
    }

    #[test]
    fn error_event_carries_message() {
        let json = r#"{"type":"error","error":{"message":"bad request"}}"#;
        let event: RealtimeEvent = serde_json::from_str(json).unwrap();
        match event {
            RealtimeEvent::Error { error } => assert_eq!(error.message, "bad request"),
            _ => panic!("wrong variant"),
        }
    }
}
