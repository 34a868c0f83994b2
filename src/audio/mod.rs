//! Audio data types, processing nodes, and effects.
//!
//! # Data Types
//! - [`AudioFrame`] - Mono float samples with their sample rate
//! - [`EncodedChunk`] - Base64 PCM with a mime tag, as exchanged with the model
//!
//! # Conversion
//! - [`pcm`] - Float/PCM conversion and box-filter downsampling
//! - [`codec`] - Transport encoding and the encoder/decoder nodes
//!
//! # Buffers
//! - [`FrameBatcher`] - Fixed-size framing of device callback buffers
//! - [`PlaybackScheduler`] - Gapless ordered playback timeline
//!
//! # Effects
//! - [`effects::level_meter`] - RMS level metering
//! - [`effects::mute`] - Mute gate

pub mod batcher;
pub mod codec;
pub mod effects;
pub mod frame;
pub mod pcm;
pub mod playback;

pub use batcher::FrameBatcher;
pub use codec::{ChunkDecoder, ChunkEncoder, EncodedChunk};
pub use effects::{LevelMeter, MuteGate, calculate_rms};
pub use frame::AudioFrame;
pub use playback::{PlaybackScheduler, ScheduledUnit};
