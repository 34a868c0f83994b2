//! Application state shared between the call driver and the UI.
//!
//! - [`CallStatus`] - Lifecycle state of the call
//! - [`CallState`] - Status, error message, level and counters, read by the UI
//! - [`AppState`] - What the UI gets from the dioxus context

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::effects::load_level;
use crate::live::CallHandle;

/// Call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

/// State of one call, written by the driver and polled by the UI.
pub struct CallState {
    status: Mutex<CallStatus>,
    error_message: Mutex<Option<String>>,
    pub muted: Arc<AtomicBool>,
    /// RMS of the latest captured frame, stored as `f32` bits.
    pub volume: Arc<AtomicU32>,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    chunks_scheduled: AtomicU64,
}

impl Default for CallState {
    fn default() -> Self {
        Self::new()
    }
}

impl CallState {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(CallStatus::Idle),
            error_message: Mutex::new(None),
            muted: Arc::new(AtomicBool::new(false)),
            volume: Arc::new(AtomicU32::new(0)),
            frames_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            chunks_scheduled: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> CallStatus {
        *self.status.lock().unwrap()
    }

    pub fn set_status(&self, status: CallStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message.lock().unwrap().clone()
    }

    pub fn set_error_message(&self, message: Option<String>) {
        *self.error_message.lock().unwrap() = message;
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn volume(&self) -> f32 {
        load_level(&self.volume)
    }

    pub fn reset_volume(&self) {
        self.volume.store(0f32.to_bits(), Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames captured but never offered to a session.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks_scheduled(&self) -> u64 {
        self.chunks_scheduled.load(Ordering::Relaxed)
    }

    pub fn record_chunk_scheduled(&self) {
        self.chunks_scheduled.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub call: CallHandle,
    pub model: String,
    pub voice: String,
}

impl AppState {
    pub fn new(call: CallHandle, model: String, voice: String) -> Arc<Self> {
        Arc::new(Self { call, model, voice })
    }

    pub fn call_state(&self) -> &Arc<CallState> {
        self.call.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_defaults() {
        let state = CallState::new();

        assert_eq!(state.status(), CallStatus::Idle);
        assert_eq!(state.error_message(), None);
        assert!(!state.is_muted());
        assert_eq!(state.volume(), 0.0);
    }

    #[test]
    fn test_volume_round_trips_through_bits() {
        let state = CallState::new();
        state.volume.store(0.42f32.to_bits(), Ordering::Relaxed);
        assert_eq!(state.volume(), 0.42);

        state.reset_volume();
        assert_eq!(state.volume(), 0.0);
    }
}
