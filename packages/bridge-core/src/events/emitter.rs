//! Event emitter abstraction for decoupling call/pipeline logic from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! broadcast channel, which keeps them testable and lets the binary choose
//! a transport (or none) at composition time.

use super::{AudioEvent, CallEvent};

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a call-lifecycle event.
    fn emit_call(&self, event: CallEvent);

    /// Emits an audio-pipeline event.
    fn emit_audio(&self, event: AudioEvent);
}

/// No-op emitter for headless operation or tests that don't assert on events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_call(&self, _event: CallEvent) {}
    fn emit_audio(&self, _event: AudioEvent) {}
}

/// Logging emitter: logs every event at debug level via `tracing`.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_call(&self, event: CallEvent) {
        tracing::debug!(?event, "call_event");
    }

    fn emit_audio(&self, event: AudioEvent) {
        tracing::debug!(?event, "audio_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEventEmitter {
        call_count: AtomicUsize,
        audio_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                audio_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_call(&self, _event: CallEvent) {
            self.call_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_audio(&self, _event: AudioEvent) {
            self.audio_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_call(CallEvent::StateChanged {
            call_id: "test".to_string(),
            state: "BRIDGED".to_string(),
            timestamp: 0,
        });
        emitter.emit_call(CallEvent::Ended {
            call_id: "test".to_string(),
            failed: false,
            timestamp: 0,
        });
        emitter.emit_audio(AudioEvent::BargeIn {
            call_id: "test".to_string(),
            frames_dropped: 3,
            timestamp: 0,
        });

        assert_eq!(emitter.call_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.audio_count.load(Ordering::SeqCst), 1);
    }
}
