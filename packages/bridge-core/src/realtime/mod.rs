//! OpenAI Realtime WebSocket session (§4.4, §6): session setup, audio
//! streaming, and server-event decoding.

pub mod client;

pub use client::{RealtimeClient, RealtimeEvent, RealtimeSession};

use thiserror::Error;

/// Errors from the Realtime session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Failed to connect to Realtime API: {0}")]
    Connect(String),

    #[error("Realtime WebSocket error: {0}")]
    WebSocket(String),

    /// No server event arrived within the receive deadline.
    #[error("Realtime receive timed out")]
    Timeout,

    #[error("Malformed Realtime event: {0}")]
    Malformed(String),

    /// The server sent an `error` event.
    #[error("Realtime API error: {0}")]
    Remote(String),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
