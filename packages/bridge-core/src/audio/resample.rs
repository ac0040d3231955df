//! Polyphase PCM16 resampling (§4.5).
//!
//! One `Resampler` is constructed per direction (ingress 8k→24k, egress
//! 24k→8k) and kept alive for the lifetime of the call so the sinc filter's
//! internal state carries across chunks — the streaming model resolved by
//! §9 Open Question 3, rather than re-deriving a fresh filter per packet.

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{BridgeError, BridgeResult};

const SINC_LEN: usize = 256;
const OVERSAMPLING_FACTOR: usize = 256;

/// Streaming PCM16 rate converter between two fixed sample rates.
pub struct Resampler {
    inner: SincFixedIn<f32>,
    ratio: f64,
}

impl Resampler {
    /// Builds a resampler for `from_rate` → `to_rate`, processing fixed
    /// chunks of `chunk_frames` input frames at a time.
    pub fn new(from_rate: u32, to_rate: u32, chunk_frames: usize) -> BridgeResult<Self> {
        let ratio = to_rate as f64 / from_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: OVERSAMPLING_FACTOR,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_frames, 1)
            .map_err(|e| BridgeError::Internal(format!("failed to build resampler: {e}")))?;
        Ok(Self { inner, ratio })
    }

    /// Resamples one chunk of mono f32 samples, in the state left by any
    /// prior call to this method.
    pub fn process(&mut self, input: &[f32]) -> BridgeResult<Vec<f32>> {
        let max_out = self.inner.output_frames_max();
        let mut output = vec![vec![0f32; max_out]];
        let (_consumed, produced) = self
            .inner
            .process_into_buffer(&[input], &mut output, None)
            .map_err(|e| BridgeError::Internal(format!("resample failed: {e}")))?;
        output[0].truncate(produced);
        Ok(output.pop().unwrap())
    }

    /// Number of input frames this resampler expects per `process` call.
    pub fn input_frames_next(&self) -> usize {
        self.inner.input_frames_next()
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

/// Converts interleaved little-endian PCM16 bytes to f32 samples in `[-1, 1]`.
pub fn pcm16_bytes_to_f32(pcm16: &[u8]) -> Vec<f32> {
    pcm16
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// Converts f32 samples in `[-1, 1]` to interleaved little-endian PCM16 bytes.
pub fn f32_to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let pcm = (clamped * i16::MAX as f32) as i16;
        out.extend_from_slice(&pcm.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsampling_produces_more_frames_than_input() {
        let mut resampler = Resampler::new(8000, 24000, 160).unwrap();
        let input = vec![0.1f32; 160];
        let output = resampler.process(&input).unwrap();
        assert!(output.len() > input.len());
    }

    #[test]
    fn downsampling_produces_fewer_frames_than_input() {
        let mut resampler = Resampler::new(24000, 8000, 480).unwrap();
        let input = vec![0.1f32; 480];
        let output = resampler.process(&input).unwrap();
        assert!(output.len() < input.len());
    }

    #[test]
    fn pcm16_byte_round_trip_preserves_magnitude_order() {
        let original = vec![0i16, 1000, -1000, i16::MAX, i16::MIN + 1];
        let bytes: Vec<u8> = original.iter().flat_map(|s| s.to_le_bytes()).collect();
        let samples = pcm16_bytes_to_f32(&bytes);
        let back = f32_to_pcm16_bytes(&samples);
        let back_samples: Vec<i16> = back
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        for (a, b) in original.iter().zip(back_samples.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }
}
