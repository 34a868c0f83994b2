//! Audio level metering.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::audio::frame::AudioFrame;
use crate::pipeline::Node;

/// Root mean square of the samples, `0.0` for an empty slice.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Reads a level stored by [`LevelMeter`].
pub fn load_level(level: &AtomicU32) -> f32 {
    f32::from_bits(level.load(Ordering::Relaxed))
}

/// Given an Arc<AtomicU32>, stores the RMS of every frame that passes through
/// as `f32` bits. Frames are forwarded untouched.
pub struct LevelMeter {
    level: Arc<AtomicU32>,
}

impl LevelMeter {
    pub fn new(level: Arc<AtomicU32>) -> Self {
        Self { level }
    }
}

impl Node for LevelMeter {
    type Input = AudioFrame;
    type Output = AudioFrame;

    fn process(&self, input: Self::Input) -> Option<Self::Output> {
        let rms = calculate_rms(input.samples());
        self.level.store(rms.to_bits(), Ordering::Relaxed);
        Some(input)
    }
}
