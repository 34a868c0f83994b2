//! The seam between the call and the audio hardware.

use std::sync::Arc;

use tracing::debug;

use crate::audio::AudioFrame;
use crate::live::CallError;
use crate::pipeline::{Pullable, Pushable};

/// Opens microphone and speaker streams.
///
/// Opening may block while the OS negotiates the device (and, on some
/// platforms, asks the user for microphone permission). The returned guard
/// keeps the stream alive until released or dropped.
pub trait AudioDevices: Send + Sync {
    /// Starts capture. Every callback buffer is downmixed to mono and pushed
    /// into `sink` at the device rate. `rate_hint` is used when the device
    /// supports it.
    fn open_input(
        &self,
        rate_hint: Option<u32>,
        sink: Arc<dyn Pushable<AudioFrame>>,
    ) -> Result<DeviceGuard, CallError>;

    /// Starts playback of `source`, which produces mono frames at
    /// `sample_rate`.
    fn open_output(
        &self,
        sample_rate: u32,
        source: Arc<dyn Pullable<AudioFrame>>,
    ) -> Result<DeviceGuard, CallError>;
}

/// Releases a device exactly once, on [`release`](Self::release) or drop.
pub struct DeviceGuard {
    name: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DeviceGuard {
    pub fn new(name: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            debug!("Releasing {}", self.name);
            release();
        }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}
