//! The media session (§4.4, §4.5, §5): wires one call's AudioSocket
//! connection to a Realtime session through the ingress/egress pipelines.
//!
//! Runs as a sibling task to [`super::orchestrator::run`] once the call
//! reaches BRIDGED; the orchestrator owns call-lifecycle state, this task
//! owns audio flow and never touches `Call` directly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::Speaker;
use super::store::CallStore;
use crate::audio::{run_egress_loop, EgressPipeline, IngressConverter, PipelineStats};
use crate::audiosocket::{AudioSocketConnection, AudioSocketFrame};
use crate::config::Config;
use crate::events::BroadcastEventBridge;
use crate::realtime::{RealtimeClient, RealtimeError, RealtimeEvent, RealtimeSession};
use crate::protocol_constants::EGRESS_QUEUE_CAPACITY;

/// Runs the media session for one call until the AudioSocket connection
/// closes, the Realtime session errors unrecoverably, or `cancel` fires.
///
/// Errors connecting to the Realtime session are the caller's concern
/// (surfaced as a `BridgeError::Transport` would be, via the return); once
/// the session is up, per-event failures are logged and never tear down the
/// whole call on their own — the orchestrator's ARI-driven hangup path is
/// the single place that ends a call (§7).
pub async fn run(
    call_id: Uuid,
    mut conn: AudioSocketConnection,
    config: Arc<Config>,
    store: Arc<dyn CallStore>,
    events: Arc<BroadcastEventBridge>,
    cancel: CancellationToken,
) -> Result<(), RealtimeError> {
    let session = RealtimeSession {
        model: config.realtime_model.clone(),
        voice: config.voice.clone(),
        instructions: config.instructions.clone(),
        temperature: config.temperature,
        transcription_model: config.transcription_model.clone(),
        vad_threshold: config.vad_threshold,
        vad_prefix_ms: config.vad_prefix_ms,
        vad_silence_ms: config.vad_silence_ms,
    };

    let mut realtime = RealtimeClient::connect(&config.realtime_url, &config.openai_api_key, session).await?;

    let mut ingress = IngressConverter::new(&config).map_err(|e| RealtimeError::WebSocket(e.to_string()))?;
    let egress_pipeline = EgressPipeline::new(&config).map_err(|e| RealtimeError::WebSocket(e.to_string()))?;
    let stats = PipelineStats::new();

    let (delta_tx, delta_rx) = mpsc::channel::<String>(EGRESS_QUEUE_CAPACITY);
    let (drain_tx, drain_rx) = mpsc::channel::<()>(1);

    let egress_task = tokio::spawn(run_egress_loop(
        egress_pipeline,
        delta_rx,
        drain_rx,
        conn.egress.clone(),
        std::time::Duration::from_millis(config.interrupt_pause_ms),
        cancel.child_token(),
        stats.clone(),
        events.clone(),
        call_id,
    ));

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            frame = conn.ingress.recv() => {
                match frame {
                    Some(AudioSocketFrame::Audio(bytes)) => {
                        match ingress.convert(&bytes, &stats) {
                            Ok(base64_pcm16) => {
                                if let Err(e) = realtime.append_audio(&base64_pcm16).await {
                                    log::warn!("[MediaSession] {call_id} append_audio failed: {e}");
                                }
                            }
                            Err(e) => log::warn!("[MediaSession] {call_id} ingress conversion failed: {e}"),
                        }
                    }
                    Some(AudioSocketFrame::Terminate) | None => break,
                    Some(_) => {}
                }
            }

            event = realtime.recv() => {
                match event {
                    Ok(RealtimeEvent::AudioDelta { delta }) => {
                        if delta_tx.send(delta).await.is_err() {
                            break;
                        }
                    }
                    Ok(RealtimeEvent::SpeechStarted) => {
                        // The real dropped-byte count is only known inside the
                        // egress task once it drains; it emits BargeIn itself.
                        let _ = drain_tx.send(()).await;
                    }
                    Ok(RealtimeEvent::SpeechStopped) | Ok(RealtimeEvent::TranscriptDelta { .. }) | Ok(RealtimeEvent::Other) => {}
                    Ok(RealtimeEvent::TranscriptDone { transcript }) => {
                        if let Err(e) = store.add_phrases(call_id, Speaker::Agent, vec![transcript]).await {
                            log::warn!("[MediaSession] {call_id} failed to persist transcript: {e}");
                        }
                    }
                    Ok(RealtimeEvent::UserTranscriptionDelta { delta }) => {
                        if let Err(e) = store.add_phrases(call_id, Speaker::User, vec![delta]).await {
                            log::warn!("[MediaSession] {call_id} failed to persist user transcript: {e}");
                        }
                    }
                    Ok(RealtimeEvent::ResponseDone) => {
                        log::debug!("[MediaSession] {call_id} agent turn complete");
                    }
                    Ok(RealtimeEvent::Error { error }) => {
                        log::warn!("[MediaSession] {call_id} Realtime API error: {}", error.message);
                    }
                    Err(RealtimeError::Timeout) => continue,
                    Err(e) => {
                        log::warn!("[MediaSession] {call_id} Realtime receive failed: {e}");
                        break;
                    }
                }
            }
        }
    }

    drop(delta_tx);
    let _ = egress_task.await;
    Ok(())
}
