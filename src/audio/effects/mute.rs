//! Mute gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::frame::AudioFrame;
use crate::pipeline::Node;

/// Blocks frames while the shared `muted` flag is set.
/// When muted, downstream gets no data at all, not even silence.
#[derive(Clone)]
pub struct MuteGate {
    muted: Arc<AtomicBool>,
}

impl MuteGate {
    pub fn new(muted: Arc<AtomicBool>) -> Self {
        Self { muted }
    }
}

impl Node for MuteGate {
    type Input = AudioFrame;
    type Output = AudioFrame;

    fn process(&self, input: Self::Input) -> Option<Self::Output> {
        if self.muted.load(Ordering::Acquire) {
            None
        } else {
            Some(input)
        }
    }
}
