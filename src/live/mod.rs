//! The live voice call with the remote model.
//!
//! # Call
//! - [`CallDriver`] / [`CallHandle`] - Lifecycle state machine and its UI handle
//! - [`CapturePipeline`] - Microphone chain: framing, metering, mute, encoding
//!
//! # Transport
//! - [`LiveTransport`] / [`LiveSession`] - Seam to the remote model
//! - [`GeminiTransport`] - Gemini Live over a websocket
//!
//! # Support
//! - [`LiveConfig`] - Model, voice, endpoint and audio parameters
//! - [`CallError`] - Failure taxonomy

pub mod call;
pub mod capture;
pub mod config;
pub mod error;
pub mod gemini;
pub mod transport;

pub use call::{CallDriver, CallEvent, CallHandle};
pub use capture::CapturePipeline;
pub use config::LiveConfig;
pub use error::CallError;
pub use gemini::GeminiTransport;
pub use transport::{EventSink, LiveSession, LiveTransport, SessionEvent};
