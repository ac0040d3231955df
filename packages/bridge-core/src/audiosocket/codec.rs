//! AudioSocket wire framing (§4.1): `type(1) | length(2, BE) | payload(length)`.
//!
//! The reference implementation this protocol was distilled from sliced the
//! payload as `buffer[3:payload_length]` instead of `buffer[3:3 + payload_length]`,
//! silently truncating or misreading every frame whose header offset wasn't
//! zero. `FrameDecoder` below slices `3 .. 3 + length` and is stream-safe:
//! it buffers partial frames across reads instead of assuming one read is
//! one frame (§9 Open Question 1).

use bytes::{Buf, BufMut, BytesMut};

use super::{AudioSocketError, AudioSocketResult};
use crate::protocol_constants::{
    AUDIOSOCKET_HEADER_LEN, AUDIOSOCKET_MAX_PAYLOAD_LEN, AUDIOSOCKET_TYPE_AUDIO,
    AUDIOSOCKET_TYPE_ERROR, AUDIOSOCKET_TYPE_IDENTIFY, AUDIOSOCKET_TYPE_TERMINATE,
};

/// A single decoded AudioSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSocketFrame {
    Terminate,
    Identify(Vec<u8>),
    Audio(Vec<u8>),
    Error(Vec<u8>),
    /// A type byte not in the known set; the payload is kept for logging
    /// but is never interpreted.
    Unknown(u8, Vec<u8>),
}

impl AudioSocketFrame {
    fn type_byte(&self) -> u8 {
        match self {
            Self::Terminate => AUDIOSOCKET_TYPE_TERMINATE,
            Self::Identify(_) => AUDIOSOCKET_TYPE_IDENTIFY,
            Self::Audio(_) => AUDIOSOCKET_TYPE_AUDIO,
            Self::Error(_) => AUDIOSOCKET_TYPE_ERROR,
            Self::Unknown(t, _) => *t,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Terminate => &[],
            Self::Identify(p) | Self::Audio(p) | Self::Error(p) | Self::Unknown(_, p) => p,
        }
    }

    /// Encodes this frame to its wire representation.
    pub fn encode(&self) -> AudioSocketResult<BytesMut> {
        let payload = self.payload();
        if payload.len() > AUDIOSOCKET_MAX_PAYLOAD_LEN {
            return Err(AudioSocketError::Malformed(format!(
                "payload of {} bytes exceeds max {}",
                payload.len(),
                AUDIOSOCKET_MAX_PAYLOAD_LEN
            )));
        }
        let mut buf = BytesMut::with_capacity(AUDIOSOCKET_HEADER_LEN + payload.len());
        buf.put_u8(self.type_byte());
        buf.put_u16(payload.len() as u16);
        buf.put_slice(payload);
        Ok(buf)
    }

    fn from_wire(type_byte: u8, payload: Vec<u8>) -> Self {
        match type_byte {
            AUDIOSOCKET_TYPE_TERMINATE => Self::Terminate,
            AUDIOSOCKET_TYPE_IDENTIFY => Self::Identify(payload),
            AUDIOSOCKET_TYPE_AUDIO => Self::Audio(payload),
            AUDIOSOCKET_TYPE_ERROR => Self::Error(payload),
            other => Self::Unknown(other, payload),
        }
    }
}

/// Incremental, stream-safe AudioSocket frame decoder.
///
/// Feed it arbitrarily-sized chunks from the TCP socket via [`Self::push`];
/// each call to [`Self::next_frame`] returns at most one complete frame,
/// leaving any partial trailing bytes buffered for the next read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete frame buffered, if any, consuming it from
    /// the internal buffer. Returns `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> AudioSocketResult<Option<AudioSocketFrame>> {
        if self.buffer.len() < AUDIOSOCKET_HEADER_LEN {
            return Ok(None);
        }
        let type_byte = self.buffer[0];
        let length = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
        let total_length = AUDIOSOCKET_HEADER_LEN + length;
        if self.buffer.len() < total_length {
            return Ok(None);
        }

        self.buffer.advance(AUDIOSOCKET_HEADER_LEN);
        let payload = self.buffer.split_to(length).to_vec();
        Ok(Some(AudioSocketFrame::from_wire(type_byte, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_frame_round_trips_through_encode_and_decode() {
        let uuid_bytes = vec![0xAB; 16];
        let frame = AudioSocketFrame::Identify(uuid_bytes.clone());
        let wire = frame.encode().unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&wire);
        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, AudioSocketFrame::Identify(uuid_bytes));
    }

    #[test]
    fn decoder_is_stream_safe_across_arbitrary_chunk_boundaries() {
        let frame = AudioSocketFrame::Audio(vec![1, 2, 3, 4, 5]);
        let wire = frame.encode().unwrap();

        let mut decoder = FrameDecoder::new();
        // Feed one byte at a time; no frame should surface until complete.
        for (i, byte) in wire.iter().enumerate() {
            decoder.push(&[*byte]);
            let result = decoder.next_frame().unwrap();
            if i + 1 < wire.len() {
                assert!(result.is_none());
            } else {
                assert_eq!(result, Some(frame.clone()));
            }
        }
    }

    #[test]
    fn decoder_handles_two_frames_in_one_chunk() {
        let first = AudioSocketFrame::Audio(vec![9; 4]);
        let second = AudioSocketFrame::Terminate;
        let mut wire = first.encode().unwrap();
        wire.extend_from_slice(&second.encode().unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&wire);
        assert_eq!(decoder.next_frame().unwrap(), Some(first));
        assert_eq!(decoder.next_frame().unwrap(), Some(second));
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn payload_offset_is_three_not_payload_length() {
        // Regression test for the historical off-by-offset bug: a short
        // header followed by a long payload must decode the payload
        // starting right after the 3-byte header, not at byte `length`.
        let payload = vec![7u8; 200];
        let frame = AudioSocketFrame::Audio(payload.clone());
        let wire = frame.encode().unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&wire);
        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, AudioSocketFrame::Audio(payload));
    }

    #[test]
    fn unknown_type_byte_is_preserved_but_uninterpreted() {
        let mut wire = BytesMut::new();
        wire.put_u8(0x42);
        wire.put_u16(3);
        wire.put_slice(&[1, 2, 3]);

        let mut decoder = FrameDecoder::new();
        decoder.push(&wire);
        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, AudioSocketFrame::Unknown(0x42, vec![1, 2, 3]));
    }
}
