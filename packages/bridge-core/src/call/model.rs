//! The `Call` data model (§3): lifecycle unit, status log, and dialog.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single transition recorded in a call's status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Created,
    StasisStart,
    DialAnswered,
    Bridged,
    UserSpeaking,
    AgentSpeaking,
    BargedIn,
    HangupRequested,
    Ended,
    Failed,
}

/// An append record `{kind, at}` (§3). The log is append-only and
/// monotonically non-decreasing in timestamp (invariant iii).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub at_unix_ms: u64,
}

/// Who produced a line of the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// One transcribed utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

/// The call-lifecycle state machine (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Init,
    Creating,
    WaitingStasis,
    Dialing,
    Answered,
    Bridged,
    Hangup,
    Ended,
    Failed,
}

impl CallState {
    /// Human-readable name, used for logging and the status log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Creating => "CREATING",
            Self::WaitingStasis => "WAITING_STASIS",
            Self::Dialing => "DIALING",
            Self::Answered => "ANSWERED",
            Self::Bridged => "BRIDGED",
            Self::Hangup => "HANGUP",
            Self::Ended => "ENDED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether this state is terminal; no further transitions are valid.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

/// The unit of call lifecycle (§3).
///
/// Owned exclusively by one orchestrator task; every mutator is a method on
/// this type invoked from that task, never shared across tasks by `&mut`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Opaque, immutable, unique identifier (invariant i). Carried through
    /// ARI external-media `data` into the AudioSocket IDENTIFY payload.
    pub id: Uuid,

    /// Destination phone number, digits only.
    pub destination: String,

    pub state: CallState,

    /// Become non-empty exactly once, in order bridge → channel → external
    /// media (invariant ii), and are never cleared afterward.
    pub bridge_id: Option<String>,
    pub channel_id: Option<String>,
    pub external_media_id: Option<String>,

    /// Append-only, monotonically non-decreasing in timestamp (invariant iii).
    pub status_log: Vec<Status>,

    pub dialog: Vec<Utterance>,
}

impl Call {
    /// Creates a new call in `INIT` with a fresh UUID and a `CREATED` status.
    pub fn new(destination: String, now_unix_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination,
            state: CallState::Init,
            bridge_id: None,
            channel_id: None,
            external_media_id: None,
            status_log: vec![Status {
                kind: StatusKind::Created,
                at_unix_ms: now_unix_ms,
            }],
            dialog: Vec::new(),
        }
    }

    /// Transitions to `state`, appending a matching status entry.
    ///
    /// The caller supplies the `StatusKind`; this keeps the state machine
    /// (in `orchestrator.rs`) the single place deciding which transitions
    /// are legal, while this method only records the effect.
    pub fn transition(&mut self, state: CallState, kind: StatusKind, now_unix_ms: u64) {
        self.state = state;
        self.status_log.push(Status {
            kind,
            at_unix_ms: now_unix_ms,
        });
    }

    /// Sets the bridge id exactly once (invariant ii).
    pub fn set_bridge_id(&mut self, id: String) {
        debug_assert!(self.bridge_id.is_none(), "bridge_id set twice");
        self.bridge_id = Some(id);
    }

    /// Sets the client channel id exactly once, after the bridge id (invariant ii).
    pub fn set_channel_id(&mut self, id: String) {
        debug_assert!(self.bridge_id.is_some(), "channel_id set before bridge_id");
        debug_assert!(self.channel_id.is_none(), "channel_id set twice");
        self.channel_id = Some(id);
    }

    /// Sets the external-media channel id exactly once, after the client channel.
    pub fn set_external_media_id(&mut self, id: String) {
        debug_assert!(
            self.channel_id.is_some(),
            "external_media_id set before channel_id"
        );
        debug_assert!(
            self.external_media_id.is_none(),
            "external_media_id set twice"
        );
        self.external_media_id = Some(id);
    }

    pub fn push_utterance(&mut self, speaker: Speaker, text: String) {
        self.dialog.push(Utterance { speaker, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_call_starts_in_init_with_created_status() {
        let call = Call::new("79117772200".into(), 1000);
        assert_eq!(call.state, CallState::Init);
        assert_eq!(call.status_log.len(), 1);
        assert_eq!(call.status_log[0].kind, StatusKind::Created);
    }

    #[test]
    fn resource_ids_follow_bridge_channel_external_media_order() {
        let mut call = Call::new("79117772200".into(), 1000);
        call.set_bridge_id("B1".into());
        call.set_channel_id("C1".into());
        call.set_external_media_id("E1".into());
        assert_eq!(call.bridge_id.as_deref(), Some("B1"));
        assert_eq!(call.channel_id.as_deref(), Some("C1"));
        assert_eq!(call.external_media_id.as_deref(), Some("E1"));
    }

    #[test]
    fn status_log_is_append_only_and_monotonic() {
        let mut call = Call::new("79117772200".into(), 1000);
        call.transition(CallState::Creating, StatusKind::StasisStart, 1001);
        call.transition(CallState::Bridged, StatusKind::Bridged, 1002);
        let timestamps: Vec<_> = call.status_log.iter().map(|s| s.at_unix_ms).collect();
        assert_eq!(timestamps, vec![1000, 1001, 1002]);
    }

    #[test]
    fn terminal_states_are_ended_and_failed() {
        assert!(CallState::Ended.is_terminal());
        assert!(CallState::Failed.is_terminal());
        assert!(!CallState::Bridged.is_terminal());
    }
}
