//! Audio effect nodes.
//!
//! This module provides capture-side effects that implement [`Node`](crate::pipeline::Node).

pub mod level_meter;
pub mod mute;

pub use level_meter::{LevelMeter, calculate_rms, load_level};
pub use mute::MuteGate;
