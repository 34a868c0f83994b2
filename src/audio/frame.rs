use std::time::Duration;

use anyhow::Result;

/// A buffer of mono samples with the rate they were produced at.
///
/// Samples are normalized floats in `[-1.0, 1.0]`. Capture produces one frame
/// per tick at the device rate; the decoder produces frames at the inbound
/// service rate. The rate is a runtime value because the capture device
/// decides it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioFrame {
    /// Create a new frame from raw samples.
    ///
    /// Returns an error if the sample rate is zero.
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 {
            anyhow::bail!("Sample rate must be non-zero");
        }
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1; capture downmixes to mono before framing.
    pub const fn channels(&self) -> usize {
        1
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length of the frame.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Consumes the frame and returns the raw vector.
    pub fn into_inner(self) -> Vec<f32> {
        self.samples
    }
}
