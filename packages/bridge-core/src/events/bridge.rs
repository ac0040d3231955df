//! Bridge implementation that maps domain events to broadcast transport.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between domain services
//! and transport concerns, mapping typed domain events onto a broadcast
//! channel that the ambient health/diagnostic surface can subscribe to.

use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{AudioEvent, BroadcastEvent, CallEvent};

/// Bridges domain events to a `tokio::sync::broadcast` channel.
///
/// # Thread Safety
///
/// `Send + Sync`, cheap to clone (the sender is reference-counted internally).
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Creates a new bridge wrapping an existing broadcast sender.
    pub fn with_sender(tx: broadcast::Sender<BroadcastEvent>) -> Self {
        Self { tx }
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Returns a reference to the broadcast sender.
    pub fn sender(&self) -> &broadcast::Sender<BroadcastEvent> {
        &self.tx
    }
}

/// Generates an [`EventEmitter`] method that forwards to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Err(e) = self.tx.send(BroadcastEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_call, CallEvent, Call);
    impl_emit!(emit_audio, AudioEvent, Audio);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_forwarded_events() {
        let bridge = BroadcastEventBridge::new(8);
        let mut rx = bridge.subscribe();

        bridge.emit_call(CallEvent::StateChanged {
            call_id: "abc".into(),
            state: "BRIDGED".into(),
            timestamp: 0,
        });

        let received = rx.try_recv().expect("event forwarded");
        matches!(received, BroadcastEvent::Call(CallEvent::StateChanged { .. }));
    }

    #[test]
    fn send_with_no_receivers_does_not_panic() {
        let bridge = BroadcastEventBridge::new(8);
        bridge.emit_audio(AudioEvent::BargeIn {
            call_id: "abc".into(),
            frames_dropped: 0,
            timestamp: 0,
        });
    }
}
