//! AudioSocket protocol: wire codec and TCP server (§4.1, §6).

pub mod codec;
pub mod server;

pub use codec::{AudioSocketFrame, FrameDecoder};
pub use server::{AudioSocketConnection, AudioSocketServer};

use thiserror::Error;

/// Errors from the AudioSocket transport and framing layer.
#[derive(Debug, Error)]
pub enum AudioSocketError {
    #[error("AudioSocket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No IDENTIFY frame arrived within `AUDIOSOCKET_IDENTIFY_TIMEOUT_SECS`.
    #[error("AudioSocket IDENTIFY timed out")]
    IdentifyTimeout,

    /// The IDENTIFY payload's UUID did not match the call the connection
    /// was expected to carry (invariant: contract violation, §4.1).
    #[error("AudioSocket IDENTIFY UUID did not match the expected call")]
    IdentifyMismatch,

    /// A frame violated the wire format (short header, truncated payload).
    #[error("Malformed AudioSocket frame: {0}")]
    Malformed(String),
}

pub type AudioSocketResult<T> = Result<T, AudioSocketError>;
