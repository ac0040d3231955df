//! Event system for observing call lifecycle and audio pipeline activity.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`BroadcastEvent`] and its per-domain variants
//!
//! The actual transport (broadcast channel, logging, no-op) is decided by the
//! emitter implementation; domain code only depends on the trait.

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events broadcast for observability. Not part of the call-control path;
/// losing one (e.g. to a lagging broadcast receiver) never affects a call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Call lifecycle transitions.
    Call(CallEvent),

    /// Audio pipeline activity (barge-in, pacing health).
    Audio(AudioEvent),
}

/// Events reflecting the call-lifecycle state machine (§4.2).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CallEvent {
    /// The call entered a new state.
    StateChanged {
        #[serde(rename = "callId")]
        call_id: String,
        state: String,
        timestamp: u64,
    },
    /// The call ended, successfully or not.
    Ended {
        #[serde(rename = "callId")]
        call_id: String,
        failed: bool,
        timestamp: u64,
    },
}

/// Events from the audio pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AudioEvent {
    /// The Realtime session reported speech start; barge-in was triggered.
    BargeIn {
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(rename = "framesDropped")]
        frames_dropped: usize,
        timestamp: u64,
    },
    /// Periodic pipeline health snapshot (frames relayed, queue depth).
    PipelineHealth {
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(rename = "ingressFrames")]
        ingress_frames: u64,
        #[serde(rename = "egressFrames")]
        egress_frames: u64,
        #[serde(rename = "queueDepth")]
        queue_depth: usize,
        timestamp: u64,
    },
}

impl From<CallEvent> for BroadcastEvent {
    fn from(event: CallEvent) -> Self {
        BroadcastEvent::Call(event)
    }
}

impl From<AudioEvent> for BroadcastEvent {
    fn from(event: AudioEvent) -> Self {
        BroadcastEvent::Audio(event)
    }
}
