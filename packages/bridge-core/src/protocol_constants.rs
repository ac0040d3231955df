//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (AudioSocket, G.711,
//! the Realtime WebSocket wire format) and changing them would break protocol
//! compliance. Tunables that are meant to be adjusted live in [`crate::config`].

// ─────────────────────────────────────────────────────────────────────────────
// AudioSocket wire format
// ─────────────────────────────────────────────────────────────────────────────

/// AudioSocket packet type: terminate the connection.
pub const AUDIOSOCKET_TYPE_TERMINATE: u8 = 0x00;

/// AudioSocket packet type: 16-byte call UUID, sent once on connect.
pub const AUDIOSOCKET_TYPE_IDENTIFY: u8 = 0x01;

/// AudioSocket packet type: audio payload (α-law or linear PCM per config).
pub const AUDIOSOCKET_TYPE_AUDIO: u8 = 0x10;

/// AudioSocket packet type: UTF-8 error code payload.
pub const AUDIOSOCKET_TYPE_ERROR: u8 = 0xFF;

/// Size of an AudioSocket IDENTIFY payload: a raw 128-bit UUID.
pub const AUDIOSOCKET_IDENTIFY_PAYLOAD_LEN: usize = 16;

/// Size of the AudioSocket packet header (type + big-endian u16 length).
pub const AUDIOSOCKET_HEADER_LEN: usize = 3;

/// Maximum payload length representable by the 16-bit length field.
pub const AUDIOSOCKET_MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Deadline for receiving IDENTIFY after a TCP accept, per §6.
pub const AUDIOSOCKET_IDENTIFY_TIMEOUT_SECS: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Audio standards
// ─────────────────────────────────────────────────────────────────────────────

/// Sample width of linear PCM used throughout the bridge (16-bit).
pub const SAMPLE_WIDTH_BYTES: usize = 2;

/// Audio is always mono at every pipeline boundary.
pub const CHANNEL_COUNT: u16 = 1;

/// Nominal telephony frame duration (ms). One AudioSocket AUDIO frame.
pub const TELEPHONY_FRAME_DURATION_MS: u64 = 20;

/// Telephony-side α-law frame size in bytes at the nominal 20 ms duration
/// and 8 kHz sample rate (8000 Hz * 0.02 s * 1 byte/sample).
pub const TELEPHONY_ALAW_FRAME_BYTES: usize = 160;

// ─────────────────────────────────────────────────────────────────────────────
// ARI (Asterisk REST Interface)
// ─────────────────────────────────────────────────────────────────────────────

/// `encapsulation` value requested when creating an externalMedia channel.
pub const ARI_EXTERNAL_MEDIA_ENCAPSULATION: &str = "audiosocket";

/// `transport` value requested when creating an externalMedia channel.
pub const ARI_EXTERNAL_MEDIA_TRANSPORT: &str = "tcp";

/// HTTP statuses ARI treats as success for a command (the source's
/// `_normalize_response` bug, fixed per §9 Open Question 2: exactly
/// `{200, 204}`, not "anything that isn't 200 and isn't 204").
pub const ARI_SUCCESS_STATUSES: [u16; 2] = [200, 204];

// ─────────────────────────────────────────────────────────────────────────────
// Realtime API
// ─────────────────────────────────────────────────────────────────────────────

/// Required header announcing the Realtime beta wire protocol.
pub const REALTIME_BETA_HEADER_VALUE: &str = "realtime=v1";

// ─────────────────────────────────────────────────────────────────────────────
// Application identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported on the ambient health endpoint.
pub const SERVICE_ID: &str = "stasis-bridge";

// ─────────────────────────────────────────────────────────────────────────────
// Ambient stack sizing
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the event broadcast channel for the health/diagnostic surface.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// SPSC egress audio queue capacity (§5): bounded to ~16 frames so the
/// Realtime receiver backpressures against a slow telephony writer instead
/// of growing memory unbounded.
pub const EGRESS_QUEUE_CAPACITY: usize = 16;

/// A call stuck in WAITING_STASIS longer than this is failed (§4.2).
pub const WAITING_STASIS_TIMEOUT_SECS: u64 = 30;

/// Interval between `debug`-level pipeline health summaries (§10).
pub const PIPELINE_HEALTH_INTERVAL_SECS: u64 = 30;
