//! Ingress and egress audio pipelines (§4.5): format conversion, resampling,
//! and paced delivery between AudioSocket and the Realtime session.
//!
//! The egress side follows the same metronome shape as the HTTP cadence
//! streamer: a fixed-period tick drives delivery, and a bounded queue between
//! the Realtime receiver and the ticking writer absorbs jitter without
//! growing unbounded (§5).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::alaw::{alaw_buf_to_pcm16, pcm16_buf_to_alaw};
use super::resample::{f32_to_pcm16_bytes, pcm16_bytes_to_f32, Resampler};
use crate::audiosocket::AudioSocketFrame;
use crate::config::{Config, InputFormat, OutputFormat};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{AudioEvent, BroadcastEventBridge, EventEmitter};
use crate::protocol_constants::{PIPELINE_HEALTH_INTERVAL_SECS, TELEPHONY_FRAME_DURATION_MS};

fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Lock-free hot-path counters shared between a call's ingress and egress
/// pipeline halves (§10): incremented without locking so the audio loops
/// never block on telemetry, and snapshotted periodically for the health
/// summary.
#[derive(Clone)]
pub struct PipelineStats {
    ingress_frames: Arc<AtomicU64>,
    egress_frames: Arc<AtomicU64>,
    resample_calls: Arc<AtomicU64>,
    barge_ins: Arc<AtomicU64>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            ingress_frames: Arc::new(AtomicU64::new(0)),
            egress_frames: Arc::new(AtomicU64::new(0)),
            resample_calls: Arc::new(AtomicU64::new(0)),
            barge_ins: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_ingress_frame(&self) {
        self.ingress_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_egress_frame(&self) {
        self.egress_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resample(&self) {
        self.resample_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_barge_in(&self) {
        self.barge_ins.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.ingress_frames.load(Ordering::Relaxed),
            self.egress_frames.load(Ordering::Relaxed),
            self.resample_calls.load(Ordering::Relaxed),
            self.barge_ins.load(Ordering::Relaxed),
        )
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts one inbound AudioSocket AUDIO frame to base64 PCM16 at the
/// Realtime session's input rate, resampling if telephony audio is
/// narrowband (§4.5).
pub struct IngressConverter {
    input_format: InputFormat,
    resampler: Option<Resampler>,
}

impl IngressConverter {
    pub fn new(config: &Config) -> BridgeResult<Self> {
        let resampler = if config.default_sample_rate != config.openai_output_rate {
            Some(Resampler::new(
                config.default_sample_rate,
                config.openai_output_rate,
                config.default_sample_rate as usize * TELEPHONY_FRAME_DURATION_MS as usize / 1000,
            )?)
        } else {
            None
        };
        Ok(Self {
            input_format: config.input_format,
            resampler,
        })
    }

    /// Converts telephony audio bytes to a base64 PCM16 chunk ready for
    /// `input_audio_buffer.append`, recording the frame and any resample
    /// call against `stats` (§10).
    pub fn convert(&mut self, telephony_audio: &[u8], stats: &PipelineStats) -> BridgeResult<String> {
        let pcm16 = match self.input_format {
            InputFormat::G711Alaw => alaw_buf_to_pcm16(telephony_audio),
            InputFormat::Pcm16 => telephony_audio.to_vec(),
        };

        let pcm16 = if let Some(resampler) = &mut self.resampler {
            stats.record_resample();
            let samples = pcm16_bytes_to_f32(&pcm16);
            let resampled = resampler.process(&samples)?;
            f32_to_pcm16_bytes(&resampled)
        } else {
            pcm16
        };

        stats.record_ingress_frame();
        Ok(STANDARD.encode(pcm16))
    }
}

/// Converts base64 PCM16 audio deltas from the Realtime session back to
/// telephony-framed AudioSocket AUDIO frames, paced at the telephony frame
/// rate (§4.5, §5).
pub struct EgressPipeline {
    telephony_sample_rate: u32,
    output_format: OutputFormat,
    resampler: Option<Resampler>,
    queue: VecDeque<u8>,
}

impl EgressPipeline {
    pub fn new(config: &Config) -> BridgeResult<Self> {
        let resampler = if config.openai_output_rate != config.default_sample_rate {
            Some(Resampler::new(
                config.openai_output_rate,
                config.default_sample_rate,
                config.openai_output_rate as usize * TELEPHONY_FRAME_DURATION_MS as usize / 1000,
            )?)
        } else {
            None
        };
        Ok(Self {
            telephony_sample_rate: config.default_sample_rate,
            output_format: config.output_format,
            resampler,
            queue: VecDeque::new(),
        })
    }

    /// Decodes and resamples one `response.audio.delta`, appending telephony
    /// bytes to the internal frame queue, α-law encoding only if the
    /// configured AudioSocket payload is α-law (§4.5 step 4). Records any
    /// resample call against `stats` (§10).
    pub fn push_delta(&mut self, base64_pcm16: &str, stats: &PipelineStats) -> BridgeResult<()> {
        let pcm16 = STANDARD
            .decode(base64_pcm16)
            .map_err(|e| BridgeError::Protocol(format!("invalid base64 audio delta: {e}")))?;

        let pcm16 = if let Some(resampler) = &mut self.resampler {
            stats.record_resample();
            let samples = pcm16_bytes_to_f32(&pcm16);
            let resampled = resampler.process(&samples)?;
            f32_to_pcm16_bytes(&resampled)
        } else {
            pcm16
        };

        match self.output_format {
            OutputFormat::Alaw => self.queue.extend(pcm16_buf_to_alaw(&pcm16)),
            OutputFormat::Pcm16 => self.queue.extend(pcm16),
        }
        Ok(())
    }

    /// Drops all queued but undelivered audio. Called on `speech_started`
    /// to implement barge-in (§4.2, §8 S3): the user interrupting the
    /// agent must hear silence immediately, not the rest of the buffered
    /// response.
    pub fn drain(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Bytes currently queued but undelivered, for the pipeline health
    /// summary (§10).
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// One telephony frame's size in bytes: one byte per sample for α-law,
    /// two (linear PCM16) otherwise (§4.5 step 5).
    fn frame_bytes(&self) -> usize {
        let samples_per_frame = self.telephony_sample_rate as usize * TELEPHONY_FRAME_DURATION_MS as usize / 1000;
        match self.output_format {
            OutputFormat::Alaw => samples_per_frame,
            OutputFormat::Pcm16 => samples_per_frame * 2,
        }
    }

    /// Pops one telephony-frame-sized chunk, or `None` if the queue has
    /// less than a full frame buffered.
    fn pop_frame(&mut self) -> Option<Vec<u8>> {
        let frame_bytes = self.frame_bytes();
        if self.queue.len() < frame_bytes {
            return None;
        }
        Some(self.queue.drain(..frame_bytes).collect())
    }
}

/// Runs the paced egress loop: a metronome ticking every telephony frame
/// duration pops one frame from `pipeline` and writes it to `audiosocket_tx`.
/// `drain_rx` signals barge-in; receiving on it empties the pipeline queue,
/// emits `AudioEvent::BargeIn` with the real dropped-byte count, and holds
/// delivery for `interrupt_pause` before resuming (§4.5: "a short grace
/// pause is applied before restarting"). A periodic ticker snapshots
/// `stats` and emits `AudioEvent::PipelineHealth` at `debug` (§10).
#[allow(clippy::too_many_arguments)]
pub async fn run_egress_loop(
    mut pipeline: EgressPipeline,
    mut delta_rx: mpsc::Receiver<String>,
    mut drain_rx: mpsc::Receiver<()>,
    audiosocket_tx: mpsc::Sender<AudioSocketFrame>,
    interrupt_pause: Duration,
    cancel: CancellationToken,
    stats: PipelineStats,
    events: Arc<BroadcastEventBridge>,
    call_id: Uuid,
) {
    let mut metronome = interval(Duration::from_millis(TELEPHONY_FRAME_DURATION_MS));
    metronome.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut health_ticker = interval(Duration::from_secs(PIPELINE_HEALTH_INTERVAL_SECS));
    health_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = drain_rx.recv() => {
                let dropped = pipeline.drain();
                stats.record_barge_in();
                if dropped > 0 {
                    log::info!("[AudioPipeline] barge-in drained {dropped} queued bytes");
                }
                events.emit_audio(AudioEvent::BargeIn {
                    call_id: call_id.to_string(),
                    frames_dropped: dropped,
                    timestamp: now_unix_ms(),
                });
                tokio::select! {
                    _ = tokio::time::sleep(interrupt_pause) => {}
                    _ = cancel.cancelled() => break,
                }
            }

            _ = metronome.tick() => {
                if let Some(frame) = pipeline.pop_frame() {
                    stats.record_egress_frame();
                    if audiosocket_tx.send(AudioSocketFrame::Audio(frame)).await.is_err() {
                        break;
                    }
                }
            }

            delta = delta_rx.recv() => {
                match delta {
                    Some(base64_pcm16) => {
                        if let Err(e) = pipeline.push_delta(&base64_pcm16, &stats) {
                            log::warn!("[AudioPipeline] dropping malformed audio delta: {e}");
                        }
                    }
                    None => {
                        if pipeline.is_empty() {
                            break;
                        }
                    }
                }
            }

            _ = health_ticker.tick() => {
                let (ingress_frames, egress_frames, resample_calls, barge_ins) = stats.snapshot();
                let queue_depth = pipeline.queue_depth();
                log::debug!(
                    "[AudioPipeline] {call_id} health: ingress_frames={ingress_frames} egress_frames={egress_frames} resample_calls={resample_calls} barge_ins={barge_ins} queue_depth={queue_depth}"
                );
                events.emit_audio(AudioEvent::PipelineHealth {
                    call_id: call_id.to_string(),
                    ingress_frames,
                    egress_frames,
                    queue_depth,
                    timestamp: now_unix_ms(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            default_sample_rate: 8000,
            openai_output_rate: 8000,
            ..Default::default()
        }
    }

    #[test]
    fn ingress_converter_produces_base64_pcm16() {
        let mut converter = IngressConverter::new(&test_config()).unwrap();
        let stats = PipelineStats::new();
        let alaw = vec![0xD5u8; 160];
        let encoded = converter.convert(&alaw, &stats).unwrap();
        assert!(!encoded.is_empty());
        assert!(STANDARD.decode(&encoded).is_ok());
        assert_eq!(stats.snapshot().0, 1);
    }

    #[test]
    fn egress_pipeline_pops_exact_frame_size() {
        let mut pipeline = EgressPipeline::new(&test_config()).unwrap();
        let stats = PipelineStats::new();
        let pcm16 = vec![0u8; 320]; // 160 samples silence
        let encoded = STANDARD.encode(&pcm16);
        pipeline.push_delta(&encoded, &stats).unwrap();

        let frame = pipeline.pop_frame().unwrap();
        assert_eq!(frame.len(), 160);
        assert!(pipeline.pop_frame().is_none());
    }

    #[test]
    fn drain_empties_queue_and_reports_dropped_count() {
        let mut pipeline = EgressPipeline::new(&test_config()).unwrap();
        let stats = PipelineStats::new();
        let pcm16 = vec![0u8; 640];
        let encoded = STANDARD.encode(&pcm16);
        pipeline.push_delta(&encoded, &stats).unwrap();

        let dropped = pipeline.drain();
        assert_eq!(dropped, 320);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn pipeline_stats_snapshot_reflects_recorded_counters() {
        let stats = PipelineStats::new();
        stats.record_ingress_frame();
        stats.record_egress_frame();
        stats.record_egress_frame();
        stats.record_resample();
        stats.record_barge_in();

        let (ingress, egress, resamples, barge_ins) = stats.snapshot();
        assert_eq!(ingress, 1);
        assert_eq!(egress, 2);
        assert_eq!(resamples, 1);
        assert_eq!(barge_ins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_holds_delivery_for_interrupt_pause() {
        let pipeline = EgressPipeline::new(&test_config()).unwrap();
        let (delta_tx, delta_rx) = mpsc::channel(4);
        let (drain_tx, drain_rx) = mpsc::channel(1);
        let (audio_tx, mut audio_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_egress_loop(
            pipeline,
            delta_rx,
            drain_rx,
            audio_tx,
            Duration::from_millis(300),
            cancel.clone(),
            PipelineStats::new(),
            Arc::new(BroadcastEventBridge::new(8)),
            Uuid::new_v4(),
        ));

        drain_tx.send(()).await.unwrap();
        tokio::task::yield_now().await;

        let pcm16 = vec![0u8; 160]; // one α-law-sized frame once queued
        delta_tx.send(STANDARD.encode(&pcm16)).await.unwrap();

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(
            audio_rx.try_recv().is_err(),
            "no frame should be delivered before the grace pause elapses"
        );

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::time::advance(Duration::from_millis(TELEPHONY_FRAME_DURATION_MS)).await;
        assert!(
            audio_rx.try_recv().is_ok(),
            "frame should be delivered once the grace pause has elapsed"
        );

        cancel.cancel();
        let _ = handle.await;
    }

    #[test]
    fn egress_pipeline_passes_through_linear_pcm_when_configured() {
        let mut pipeline = EgressPipeline::new(&Config {
            output_format: OutputFormat::Pcm16,
            ..test_config()
        })
        .unwrap();
        let stats = PipelineStats::new();
        let pcm16 = vec![0u8; 320]; // 160 samples silence
        let encoded = STANDARD.encode(&pcm16);
        pipeline.push_delta(&encoded, &stats).unwrap();

        let frame = pipeline.pop_frame().unwrap();
        assert_eq!(frame.len(), 320);
        assert!(pipeline.pop_frame().is_none());
    }
}
