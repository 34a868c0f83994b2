//! Frame batcher for turning device callback buffers into fixed-size frames.

use std::sync::{Arc, Mutex};

use crate::audio::frame::AudioFrame;
use crate::pipeline::Pushable;

struct Pending {
    sample_rate: u32,
    samples: Vec<f32>,
}

/// Accumulates callback buffers and pushes frames of exactly `frame_size`
/// samples downstream.
///
/// Device callbacks deliver whatever buffer size the backend picks, so one
/// push may emit zero, one or several frames. Leftover samples wait for the
/// next push. A change of sample rate discards the partial frame.
pub struct FrameBatcher {
    pending: Mutex<Pending>,
    frame_size: usize,
    output: Arc<dyn Pushable<AudioFrame>>,
}

impl FrameBatcher {
    pub fn new(frame_size: usize, output: Arc<dyn Pushable<AudioFrame>>) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            pending: Mutex::new(Pending {
                sample_rate: 0,
                samples: Vec::with_capacity(frame_size * 2),
            }),
            frame_size,
            output,
        }
    }
}

impl Pushable<AudioFrame> for FrameBatcher {
    fn push(&self, input: AudioFrame) {
        let ready: Vec<AudioFrame> = {
            let mut pending = self.pending.lock().unwrap();
            if pending.sample_rate != input.sample_rate() {
                pending.sample_rate = input.sample_rate();
                pending.samples.clear();
            }
            pending.samples.extend(input.into_inner());

            let mut ready = Vec::new();
            while pending.samples.len() >= self.frame_size {
                let samples: Vec<f32> = pending.samples.drain(..self.frame_size).collect();
                if let Ok(frame) = AudioFrame::new(pending.sample_rate, samples) {
                    ready.push(frame);
                }
            }
            ready
        };

        for frame in ready {
            self.output.push(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<AudioFrame>>);

    impl Pushable<AudioFrame> for Collect {
        fn push(&self, input: AudioFrame) {
            self.0.lock().unwrap().push(input);
        }
    }

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_batches_small_buffers_into_fixed_frames() {
        let sink = Arc::new(Collect::default());
        let batcher = FrameBatcher::new(4, sink.clone());

        batcher.push(AudioFrame::new(16_000, ramp(0, 3)).unwrap());
        assert!(sink.0.lock().unwrap().is_empty());

        batcher.push(AudioFrame::new(16_000, ramp(3, 3)).unwrap());
        let frames = sink.0.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_large_buffer_emits_several_frames_in_order() {
        let sink = Arc::new(Collect::default());
        let batcher = FrameBatcher::new(4, sink.clone());

        batcher.push(AudioFrame::new(48_000, ramp(0, 10)).unwrap());
        batcher.push(AudioFrame::new(48_000, ramp(10, 2)).unwrap());

        let frames = sink.0.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].samples(), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(frames[2].samples(), &[8.0, 9.0, 10.0, 11.0]);
        assert!(frames.iter().all(|f| f.sample_rate() == 48_000));
    }

    #[test]
    fn test_rate_change_drops_partial_frame() {
        let sink = Arc::new(Collect::default());
        let batcher = FrameBatcher::new(4, sink.clone());

        batcher.push(AudioFrame::new(48_000, ramp(0, 3)).unwrap());
        batcher.push(AudioFrame::new(16_000, ramp(100, 4)).unwrap());

        let frames = sink.0.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sample_rate(), 16_000);
        assert_eq!(frames[0].samples(), &[100.0, 101.0, 102.0, 103.0]);
    }
}
