//! Microphone side of a call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::audio::effects::load_level;
use crate::audio::{AudioFrame, ChunkEncoder, EncodedChunk, FrameBatcher, LevelMeter, MuteGate};
use crate::io::{AudioDevices, DeviceGuard};
use crate::live::LiveConfig;
use crate::live::error::CallError;
use crate::pipeline::Pushable;
use crate::push_chain;

/// Builds the capture chain and opens the microphone with it.
///
/// ```text
/// device -> FrameBatcher -> LevelMeter -> MuteGate -> ChunkEncoder -> on_chunk
/// ```
///
/// Metering sits before the gate so the level keeps moving while muted.
pub struct CapturePipeline {
    volume: Arc<AtomicU32>,
    muted: Arc<AtomicBool>,
    frame_size: usize,
    capture_rate_hint: Option<u32>,
    outbound_sample_rate: u32,
}

impl CapturePipeline {
    pub fn new(config: &LiveConfig, volume: Arc<AtomicU32>, muted: Arc<AtomicBool>) -> Self {
        Self {
            volume,
            muted,
            frame_size: config.frame_size,
            capture_rate_hint: config.capture_rate_hint,
            outbound_sample_rate: config.outbound_sample_rate,
        }
    }

    /// The push end handed to the input device.
    pub fn sink(&self, on_chunk: Arc<dyn Pushable<EncodedChunk>>) -> Arc<dyn Pushable<AudioFrame>> {
        let chain: Arc<dyn Pushable<AudioFrame>> = push_chain![
            LevelMeter::new(self.volume.clone()),
            MuteGate::new(self.muted.clone()),
            ChunkEncoder::new(self.outbound_sample_rate),
            => on_chunk
        ];
        Arc::new(FrameBatcher::new(self.frame_size, chain))
    }

    pub fn start(
        &self,
        devices: &dyn AudioDevices,
        on_chunk: Arc<dyn Pushable<EncodedChunk>>,
    ) -> Result<DeviceGuard, CallError> {
        devices.open_input(self.capture_rate_hint, self.sink(on_chunk))
    }

    pub fn stop(guard: &mut Option<DeviceGuard>) {
        if let Some(mut guard) = guard.take() {
            guard.release();
        }
    }

    pub fn read_volume(&self) -> f32 {
        load_level(&self.volume)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::decode_from_transport;
    use crate::audio::pcm::bytes_to_pcm;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EncodedChunk>>);

    impl Pushable<EncodedChunk> for Collect {
        fn push(&self, input: EncodedChunk) {
            self.0.lock().unwrap().push(input);
        }
    }

    fn pipeline(frame_size: usize) -> CapturePipeline {
        let config = LiveConfig {
            frame_size,
            ..Default::default()
        };
        CapturePipeline::new(
            &config,
            Arc::new(AtomicU32::new(0)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_frames_become_16k_chunks() {
        let capture = pipeline(480);
        let out = Arc::new(Collect::default());
        let sink = capture.sink(out.clone());

        sink.push(AudioFrame::new(48_000, vec![0.5; 256]).unwrap());
        sink.push(AudioFrame::new(48_000, vec![0.5; 256]).unwrap());

        let chunks = out.0.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].mime_type, "audio/pcm;rate=16000");
        let pcm = bytes_to_pcm(&decode_from_transport(&chunks[0].data).unwrap()).unwrap();
        assert_eq!(pcm.len(), 160);
        assert_eq!(capture.read_volume(), 0.5);
    }

    #[test]
    fn test_mute_blocks_chunks_but_keeps_metering() {
        let capture = pipeline(64);
        let out = Arc::new(Collect::default());
        let sink = capture.sink(out.clone());

        capture.set_muted(true);
        for _ in 0..5 {
            sink.push(AudioFrame::new(16_000, vec![0.25; 64]).unwrap());
        }
        assert!(out.0.lock().unwrap().is_empty());
        assert_eq!(capture.read_volume(), 0.25);

        capture.set_muted(false);
        sink.push(AudioFrame::new(16_000, vec![0.25; 64]).unwrap());
        assert_eq!(out.0.lock().unwrap().len(), 1);
    }
}
