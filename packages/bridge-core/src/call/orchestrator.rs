//! The call orchestrator (§4.2): drives one call's ARI choreography and
//! state machine from a mailbox that merges ARI events, the AudioSocket
//! identify handshake, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::{Call, CallState, StatusKind};
use super::store::CallStore;
use crate::ari::{AriEvent, AriRestClient};
use crate::events::{BroadcastEventBridge, CallEvent, EventEmitter};
use crate::protocol_constants::WAITING_STASIS_TIMEOUT_SECS;

/// One item in the orchestrator's mailbox (§5: "merges ARI events,
/// AudioSocket identify, and Realtime events").
pub enum OrchestratorEvent {
    Ari(AriEvent),
    AudioSocketIdentified(Uuid),
    Cancel,
}

fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Channel variables carrying RTP QoS / bridge diagnostics (§6). Asterisk
/// reports these as a single variable whose value is itself a
/// `key=value;key=value;...` string; we don't act on them, only log them.
const QOS_VARS: [&str; 4] = ["RTPAUDIOQOS", "STASISSTATUS", "BRIDGEPEER", "BRIDGEPVTCALLID"];

fn log_channel_varset(call_id: Uuid, variable: &str, value: &str) {
    if QOS_VARS.iter().any(|prefix| variable.starts_with(prefix)) {
        log::debug!("[Orchestrator] {call_id} channel var {variable}: {:?}", parse_qos_pairs(value));
    }
}

/// Splits a `key=value;key=value;...` channel variable value into pairs.
fn parse_qos_pairs(value: &str) -> Vec<(&str, &str)> {
    value
        .split(';')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

/// Drives `call` through the state machine to a terminal state, persisting
/// every transition via `store` and publishing `CallEvent`s on `events`.
///
/// Returns once the call reaches ENDED or FAILED. Resource cleanup (hangup,
/// bridge deletion) is best-effort: failures are logged, never propagated,
/// since the call is already on its way out (§7).
pub async fn run(
    mut call: Call,
    ari: Arc<AriRestClient>,
    store: Arc<dyn CallStore>,
    events: Arc<BroadcastEventBridge>,
    mut mailbox: mpsc::Receiver<OrchestratorEvent>,
    cancel: CancellationToken,
    app_name: String,
    external_media_host: String,
    audio_format: String,
) {
    let call_id = call.id;

    macro_rules! advance {
        ($state:expr, $kind:expr) => {{
            call.transition($state, $kind, now_unix_ms());
            events.emit_call(CallEvent::StateChanged {
                call_id: call_id.to_string(),
                state: $state.as_str().to_string(),
                timestamp: now_unix_ms(),
            });
            if let Err(e) = store.update_call(call.clone()).await {
                log::warn!("[Orchestrator] persistence failure for {call_id}: {e}");
            }
        }};
    }

    // CREATING: bridge → channel → externalMedia → addChannel(bridge, client_channel)
    advance!(CallState::Creating, StatusKind::Created);

    let bridge_id = match ari.create_bridge().await {
        Ok(id) => id,
        Err(e) => return fail(&mut call, &store, &events, &format!("create_bridge: {e}")).await,
    };
    call.set_bridge_id(bridge_id.clone());

    let endpoint = format!("PJSIP/{}", call.destination);
    let channel_id = match ari.create_channel(&endpoint, &app_name).await {
        Ok(id) => id,
        Err(e) => return fail(&mut call, &store, &events, &format!("create_channel: {e}")).await,
    };
    call.set_channel_id(channel_id.clone());

    let external_media_id = match ari
        .create_external_media(&app_name, &external_media_host, &audio_format, &call_id.to_string())
        .await
    {
        Ok(id) => id,
        Err(e) => return fail(&mut call, &store, &events, &format!("create_external_media: {e}")).await,
    };
    call.set_external_media_id(external_media_id.clone());

    if let Err(e) = ari.add_channel_to_bridge(&bridge_id, &channel_id).await {
        return fail(&mut call, &store, &events, &format!("addChannel(client): {e}")).await;
    }

    advance!(CallState::WaitingStasis, StatusKind::StasisStart);

    // Tie-break (§4.2): AudioSocket may IDENTIFY before ANSWERED.
    let mut pending_identify: Option<Uuid> = None;
    let mut stasis_started = false;

    let waiting_deadline = tokio::time::sleep(Duration::from_secs(WAITING_STASIS_TIMEOUT_SECS));
    tokio::pin!(waiting_deadline);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
            }

            _ = &mut waiting_deadline, if !stasis_started => {
                return fail(&mut call, &store, &events, "WAITING_STASIS timed out").await;
            }

            event = mailbox.recv() => {
                let Some(event) = event else {
                    return fail(&mut call, &store, &events, "mailbox closed while WAITING_STASIS").await;
                };
                match event {
                    OrchestratorEvent::Cancel => {
                        return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
                    }
                    OrchestratorEvent::AudioSocketIdentified(uuid) => {
                        pending_identify = Some(uuid);
                    }
                    OrchestratorEvent::Ari(AriEvent::StasisStart { channel, .. }) => {
                        if channel.id != channel_id {
                            continue; // not our client channel
                        }
                        if stasis_started {
                            continue; // duplicate StasisStart is idempotent
                        }
                        stasis_started = true;
                        if let Err(e) = ari.dial(&channel_id).await {
                            return fail(&mut call, &store, &events, &format!("dial: {e}")).await;
                        }
                        advance!(CallState::Dialing, StatusKind::StasisStart);
                        break;
                    }
                    OrchestratorEvent::Ari(AriEvent::ChannelVarset { variable, value, .. }) => {
                        log_channel_varset(call_id, &variable, &value);
                    }
                    OrchestratorEvent::Ari(_) => {}
                }
            }
        }
    }

    // DIALING: wait for Dial.dialstatus=ANSWER for the client channel.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
            }
            event = mailbox.recv() => {
                let Some(event) = event else {
                    return fail(&mut call, &store, &events, "mailbox closed while DIALING").await;
                };
                match event {
                    OrchestratorEvent::Cancel => {
                        return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
                    }
                    OrchestratorEvent::AudioSocketIdentified(uuid) => {
                        pending_identify = Some(uuid);
                    }
                    OrchestratorEvent::Ari(AriEvent::Dial { peer, dialstatus }) => {
                        let is_client_peer = peer.as_ref().map(|p| p.id == channel_id).unwrap_or(false);
                        if !is_client_peer {
                            continue; // ignore non-client peer answers
                        }
                        if dialstatus != "ANSWER" {
                            continue;
                        }
                        if let Err(e) = ari.add_channel_to_bridge(&bridge_id, &external_media_id).await {
                            return fail(&mut call, &store, &events, &format!("addChannel(external_media): {e}")).await;
                        }
                        advance!(CallState::Answered, StatusKind::DialAnswered);
                        break;
                    }
                    OrchestratorEvent::Ari(AriEvent::ChannelVarset { variable, value, .. }) => {
                        log_channel_varset(call_id, &variable, &value);
                    }
                    OrchestratorEvent::Ari(_) => {}
                }
            }
        }
    }

    // ANSWERED: wait for AudioSocket Identified(uuid) == Call.UUID.
    loop {
        if let Some(identified) = pending_identify.take() {
            if identified == call_id {
                advance!(CallState::Bridged, StatusKind::Bridged);
                break;
            } else {
                return fail(&mut call, &store, &events, "AudioSocket identify UUID mismatch").await;
            }
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
            }
            event = mailbox.recv() => {
                match event {
                    Some(OrchestratorEvent::Cancel) => {
                        return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
                    }
                    Some(OrchestratorEvent::AudioSocketIdentified(uuid)) => {
                        pending_identify = Some(uuid);
                    }
                    Some(OrchestratorEvent::Ari(AriEvent::ChannelHangupRequest { channel }))
                        if channel.id == channel_id =>
                    {
                        return hangup(&mut call, &ari, &store, &events, &bridge_id, &[channel_id.clone(), external_media_id.clone()]).await;
                    }
                    Some(OrchestratorEvent::Ari(AriEvent::ChannelVarset { variable, value, .. })) => {
                        log_channel_varset(call_id, &variable, &value);
                    }
                    Some(_) => {}
                    None => {
                        return fail(&mut call, &store, &events, "mailbox closed while ANSWERED").await;
                    }
                }
            }
        }
    }

    // BRIDGED: stay until hangup is requested or cancelled. The Realtime
    // session and audio pipeline run in sibling tasks outside this loop
    // (§5); this loop only watches for lifecycle-ending events.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break;
            }
            event = mailbox.recv() => {
                match event {
                    Some(OrchestratorEvent::Ari(AriEvent::ChannelHangupRequest { channel }))
                        if channel.id == channel_id =>
                    {
                        break;
                    }
                    Some(OrchestratorEvent::Ari(AriEvent::ChannelVarset { variable, value, .. })) => {
                        log_channel_varset(call_id, &variable, &value);
                    }
                    Some(OrchestratorEvent::Cancel) => break,
                    Some(_) => continue,
                    None => break,
                }
            }
        }
    }

    hangup(
        &mut call,
        &ari,
        &store,
        &events,
        &bridge_id,
        &[channel_id, external_media_id],
    )
    .await;
}

async fn hangup(
    call: &mut Call,
    ari: &AriRestClient,
    store: &Arc<dyn CallStore>,
    events: &BroadcastEventBridge,
    bridge_id: &str,
    channel_ids: &[String],
) {
    call.transition(CallState::Hangup, StatusKind::HangupRequested, now_unix_ms());
    let _ = store.update_call(call.clone()).await;

    for channel_id in channel_ids {
        if let Err(e) = ari.hangup(channel_id).await {
            log::warn!("[Orchestrator] hangup({channel_id}) failed: {e}");
        }
    }
    if let Err(e) = ari.delete_bridge(bridge_id).await {
        log::warn!("[Orchestrator] delete_bridge({bridge_id}) failed: {e}");
    }

    call.transition(CallState::Ended, StatusKind::Ended, now_unix_ms());
    events.emit_call(CallEvent::Ended {
        call_id: call.id.to_string(),
        failed: false,
        timestamp: now_unix_ms(),
    });
    let _ = store.update_call(call.clone()).await;
}

async fn fail(call: &mut Call, store: &Arc<dyn CallStore>, events: &BroadcastEventBridge, reason: &str) {
    log::warn!("[Orchestrator] call {} failed: {reason}", call.id);
    call.transition(CallState::Failed, StatusKind::Failed, now_unix_ms());
    events.emit_call(CallEvent::Ended {
        call_id: call.id.to_string(),
        failed: true,
        timestamp: now_unix_ms(),
    });
    let _ = store.update_call(call.clone()).await;
}

/// Builds the `externalMedia` `format` value matching the configured
/// telephony codec, e.g. `alaw` or `slin16` (§6).
pub fn external_media_format(input_is_alaw: bool) -> &'static str {
    if input_is_alaw {
        "alaw"
    } else {
        "slin16"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_media_format_maps_alaw_and_linear() {
        assert_eq!(external_media_format(true), "alaw");
        assert_eq!(external_media_format(false), "slin16");
    }

    #[test]
    fn parse_qos_pairs_splits_semicolon_kv() {
        assert_eq!(
            parse_qos_pairs("ssrc=1234;themssrc=5678;lp=0;rxjitter=1.5"),
            vec![("ssrc", "1234"), ("themssrc", "5678"), ("lp", "0"), ("rxjitter", "1.5")]
        );
    }

    #[test]
    fn parse_qos_pairs_ignores_empty_segments() {
        assert_eq!(parse_qos_pairs(""), Vec::<(&str, &str)>::new());
        assert_eq!(parse_qos_pairs("a=1;;b=2;"), vec![("a", "1"), ("b", "2")]);
    }
}
