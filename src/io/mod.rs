//! Hardware I/O.
//!
//! - [`AudioDevices`] / [`DeviceGuard`] - The device seam used by the call
//! - [`CpalDevices`] - Microphone capture and speaker playback via cpal

pub mod audio;
pub mod device;

pub use audio::CpalDevices;
pub use device::{AudioDevices, DeviceGuard};
