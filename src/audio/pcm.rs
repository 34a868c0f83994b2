//! Sample format conversions between the capture/playback float domain and
//! the 16-bit PCM the live model speaks.

use crate::live::CallError;

/// Converts normalized floats to 16-bit PCM.
///
/// Samples are clamped to `[-1.0, 1.0]`; negative values scale by 32768 and
/// non-negative values by 32767, so both ends of the range are reachable.
pub fn float_to_int16_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Converts 16-bit PCM back to normalized floats.
pub fn int16_to_float(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Box-filter decimation from `from_rate` to `to_rate`.
///
/// Returns the input unchanged when `to_rate >= from_rate`. Otherwise each
/// output sample is the mean of its window of input samples. There is no
/// anti-aliasing filter; that is good enough for speech.
pub fn downsample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if to_rate == 0 || to_rate >= from_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    let mut start = 0usize;
    for i in 0..out_len {
        let end = (((i + 1) as f64 * ratio).round() as usize).min(samples.len());
        let window = &samples[start.min(end)..end];
        if window.is_empty() {
            out.push(0.0);
        } else {
            out.push(window.iter().sum::<f32>() / window.len() as f32);
        }
        start = end;
    }
    out
}

/// Serializes PCM as little-endian bytes.
pub fn pcm_to_bytes(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parses little-endian bytes back to PCM.
pub fn bytes_to_pcm(bytes: &[u8]) -> Result<Vec<i16>, CallError> {
    if bytes.len() % 2 != 0 {
        return Err(CallError::MalformedPayload(format!(
            "PCM payload has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
