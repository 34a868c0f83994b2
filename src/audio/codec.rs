//! Transport encoding of audio chunks.
//!
//! Converts between [`AudioFrame`] (raw samples) and [`EncodedChunk`]
//! (base64 PCM with a mime tag), the unit exchanged with the live model.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::warn;

use crate::audio::frame::AudioFrame;
use crate::audio::pcm::{bytes_to_pcm, downsample, float_to_int16_pcm, int16_to_float, pcm_to_bytes};
use crate::live::CallError;
use crate::pipeline::Node;

/// One unit of encoded audio exchanged with the remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub mime_type: String,
    /// Base64 of little-endian 16-bit PCM.
    pub data: String,
}

impl EncodedChunk {
    /// A 16-bit PCM chunk tagged with its sample rate.
    pub fn pcm(sample_rate: u32, data: String) -> Self {
        Self {
            mime_type: pcm_mime_type(sample_rate),
            data,
        }
    }
}

pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

pub fn encode_to_transport(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_from_transport(text: &str) -> Result<Vec<u8>, CallError> {
    BASE64
        .decode(text)
        .map_err(|e| CallError::MalformedPayload(e.to_string()))
}

/// Encodes captured frames for the wire.
///
/// Downsamples to the outbound rate when the capture rate is higher, then
/// converts to PCM and base64.
pub struct ChunkEncoder {
    target_rate: u32,
}

impl ChunkEncoder {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn encode(&self, frame: &AudioFrame) -> EncodedChunk {
        let samples = downsample(frame.samples(), frame.sample_rate(), self.target_rate);
        let pcm = float_to_int16_pcm(&samples);
        EncodedChunk::pcm(self.target_rate, encode_to_transport(&pcm_to_bytes(&pcm)))
    }
}

impl Node for ChunkEncoder {
    type Input = AudioFrame;
    type Output = EncodedChunk;

    fn process(&self, input: Self::Input) -> Option<Self::Output> {
        Some(self.encode(&input))
    }
}

/// Decodes inbound chunks into frames at the fixed inbound rate.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDecoder {
    sample_rate: u32,
}

impl ChunkDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn decode(&self, chunk: &EncodedChunk) -> Result<AudioFrame, CallError> {
        let bytes = decode_from_transport(&chunk.data)?;
        let pcm = bytes_to_pcm(&bytes)?;
        AudioFrame::new(self.sample_rate, int16_to_float(&pcm))
            .map_err(|e| CallError::MalformedPayload(e.to_string()))
    }
}

impl Node for ChunkDecoder {
    type Input = EncodedChunk;
    type Output = AudioFrame;

    fn process(&self, input: Self::Input) -> Option<Self::Output> {
        match self.decode(&input) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Dropping inbound chunk: {}", e);
                None
            }
        }
    }
}
