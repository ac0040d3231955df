//! G.711 A-law ↔ linear PCM16 conversion (§4.5).
//!
//! Table-based, matching the ITU-T G.711 A-law companding curve used by
//! `audioop.alaw2lin`/`lin2alaw` in the reference implementation this
//! pipeline was distilled from.

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0F;
const SEG_SHIFT: u8 = 4;
const SEG_MASK: u8 = 0x70;

/// Decodes one A-law byte to a 16-bit linear PCM sample.
pub fn alaw_to_pcm16(alaw: u8) -> i16 {
    let mut alaw = alaw ^ 0x55;
    let sign = alaw & SIGN_BIT;
    alaw &= !SIGN_BIT;

    let segment = (alaw & SEG_MASK) >> SEG_SHIFT;
    let mantissa = (alaw & QUANT_MASK) as i16;

    let sample = if segment == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (segment - 1)
    };

    if sign != 0 {
        -sample
    } else {
        sample
    }
}

/// Encodes a 16-bit linear PCM sample to one A-law byte.
pub fn pcm16_to_alaw(pcm: i16) -> u8 {
    const CLIP: i32 = 32635;

    let sign = if pcm < 0 { 0x00u8 } else { SIGN_BIT };
    let mut sample = pcm as i32;
    if sign == 0x00 {
        sample = -sample;
    }
    let sample = sample.min(CLIP);

    let (segment, mantissa) = if sample >= 256 {
        let segment = (sample >> 8).min(7) as u8;
        let shift = segment + 3;
        let mantissa = ((sample >> shift) & 0x0F) as u8;
        (segment, mantissa)
    } else {
        (0, ((sample >> 4) & 0x0F) as u8)
    };

    let alaw = sign | (segment << SEG_SHIFT) | mantissa;
    alaw ^ 0x55
}

/// Decodes a buffer of A-law bytes to interleaved little-endian PCM16 bytes.
pub fn alaw_buf_to_pcm16(alaw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(alaw.len() * 2);
    for &byte in alaw {
        out.extend_from_slice(&alaw_to_pcm16(byte).to_le_bytes());
    }
    out
}

/// Encodes interleaved little-endian PCM16 bytes to A-law bytes.
///
/// `pcm16.len()` must be even; trailing odd bytes are dropped.
pub fn pcm16_buf_to_alaw(pcm16: &[u8]) -> Vec<u8> {
    pcm16
        .chunks_exact(2)
        .map(|chunk| pcm16_to_alaw(i16::from_le_bytes([chunk[0], chunk[1]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alaw_silence_decodes_near_zero() {
        // 0xD5 is the canonical A-law "silence" byte (sign-inverted zero).
        let sample = alaw_to_pcm16(0xD5);
        assert!(sample.abs() < 16, "expected near-zero, got {sample}");
    }

    #[test]
    fn round_trip_is_lossy_but_bounded() {
        for pcm in [-20000i16, -1000, -8, 0, 8, 1000, 20000] {
            let alaw = pcm16_to_alaw(pcm);
            let back = alaw_to_pcm16(alaw);
            let error = (pcm as i32 - back as i32).abs();
            assert!(error < 1100, "pcm={pcm} back={back} error={error}");
        }
    }

    #[test]
    fn buffer_helpers_preserve_sample_count() {
        let alaw = vec![0xD5u8; 160];
        let pcm = alaw_buf_to_pcm16(&alaw);
        assert_eq!(pcm.len(), 320);
        let back = pcm16_buf_to_alaw(&pcm);
        assert_eq!(back.len(), 160);
    }
}
