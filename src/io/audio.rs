//! Audio device I/O using cpal.
//!
//! Provides [`CpalDevices`], the [`AudioDevices`] implementation used by the
//! app. Each stream is built and owned by its own thread, since
//! `cpal::Stream` is not `Send` on every platform; the returned
//! [`DeviceGuard`] stops the thread and drops the stream.

use std::collections::VecDeque;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig};
use crossbeam::channel;
use dasp_sample::{FromSample, Sample};
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, error, info, warn};

use crate::audio::AudioFrame;
use crate::io::device::{AudioDevices, DeviceGuard};
use crate::live::CallError;
use crate::pipeline::{Pullable, Pushable};

/// Opens the default (or a named) microphone and speaker.
#[derive(Debug, Clone, Default)]
pub struct CpalDevices {
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalDevices {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }
}

impl AudioDevices for CpalDevices {
    fn open_input(
        &self,
        rate_hint: Option<u32>,
        sink: Arc<dyn Pushable<AudioFrame>>,
    ) -> Result<DeviceGuard, CallError> {
        let device_name = self.input_device.clone();
        spawn_stream_thread("microphone", move || {
            let device = get_input_device(device_name.as_deref())?;
            let supported = input_config(&device, rate_hint)?;
            debug!("Input config: {supported:#?}");

            let config: StreamConfig = supported.config();
            let stream = match supported.sample_format() {
                SampleFormat::F32 => build_input_stream::<f32>(&device, &config, sink)?,
                SampleFormat::I16 => build_input_stream::<i16>(&device, &config, sink)?,
                SampleFormat::U16 => build_input_stream::<u16>(&device, &config, sink)?,
                format => {
                    return Err(CallError::DeviceUnavailable(format!(
                        "Unsupported input sample format: {format:?}"
                    )));
                }
            };
            stream.play().map_err(|e| classify_device_error(e.to_string()))?;
            info!(
                "Microphone input enabled at {} Hz, {} channels",
                config.sample_rate.0, config.channels
            );
            Ok(stream)
        })
    }

    fn open_output(
        &self,
        sample_rate: u32,
        source: Arc<dyn Pullable<AudioFrame>>,
    ) -> Result<DeviceGuard, CallError> {
        let device_name = self.output_device.clone();
        spawn_stream_thread("speaker", move || {
            let device = get_output_device(device_name.as_deref())?;
            let supported = output_config(&device, sample_rate)?;
            debug!("Output config: {supported:#?}");

            let config: StreamConfig = supported.config();
            if config.sample_rate.0 != sample_rate {
                warn!(
                    "Output device does not support {} Hz, converting to {} Hz",
                    sample_rate, config.sample_rate.0
                );
            }
            let converter = OutputResampler::new(sample_rate, config.sample_rate.0)?;
            let stream = match supported.sample_format() {
                SampleFormat::F32 => {
                    build_output_stream::<f32>(&device, &config, source, converter)?
                }
                SampleFormat::I16 => {
                    build_output_stream::<i16>(&device, &config, source, converter)?
                }
                SampleFormat::U16 => {
                    build_output_stream::<u16>(&device, &config, source, converter)?
                }
                format => {
                    return Err(CallError::DeviceUnavailable(format!(
                        "Unsupported output sample format: {format:?}"
                    )));
                }
            };
            stream.play().map_err(|e| classify_device_error(e.to_string()))?;
            info!("Speaker output enabled at {} Hz", config.sample_rate.0);
            Ok(stream)
        })
    }
}

/// Builds a stream on a dedicated thread and keeps it alive there until the
/// guard is released.
fn spawn_stream_thread<F>(name: &'static str, build: F) -> Result<DeviceGuard, CallError>
where
    F: FnOnce() -> Result<cpal::Stream, CallError> + Send + 'static,
{
    let (ready_tx, ready_rx) = channel::bounded::<Result<(), CallError>>(1);
    let (stop_tx, stop_rx) = channel::bounded::<()>(1);

    let handle = std::thread::Builder::new()
        .name(format!("audio-{name}"))
        .spawn(move || {
            let stream = match build() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Returns on stop or when the guard is dropped.
            let _ = stop_rx.recv();
            drop(stream);
        })
        .map_err(|e| CallError::DeviceUnavailable(format!("Failed to spawn {name} thread: {e}")))?;

    let ready = ready_rx.recv().unwrap_or_else(|_| {
        Err(CallError::DeviceUnavailable(format!(
            "{name} thread exited before the stream started"
        )))
    });
    if let Err(e) = ready {
        let _ = handle.join();
        return Err(e);
    }

    Ok(DeviceGuard::new(name, move || {
        let _ = stop_tx.send(());
        if handle.join().is_err() {
            error!("Audio thread for {} panicked", name);
        }
        info!("{} released", name);
    }))
}

fn find_device<I: Iterator<Item = Device>>(mut devices: I, name: &str) -> Option<Device> {
    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

fn get_input_device(name: Option<&str>) -> Result<Device, CallError> {
    let host = cpal::default_host();
    match name {
        Some(name) => {
            let devices = host
                .input_devices()
                .map_err(|e| classify_device_error(e.to_string()))?;
            find_device(devices, name).ok_or_else(|| {
                CallError::DeviceUnavailable(format!("Input device '{name}' not found"))
            })
        }
        None => host.default_input_device().ok_or_else(|| {
            CallError::DeviceUnavailable("No default input device available".to_string())
        }),
    }
}

fn get_output_device(name: Option<&str>) -> Result<Device, CallError> {
    let host = cpal::default_host();
    match name {
        Some(name) => {
            let devices = host
                .output_devices()
                .map_err(|e| classify_device_error(e.to_string()))?;
            find_device(devices, name).ok_or_else(|| {
                CallError::DeviceUnavailable(format!("Output device '{name}' not found"))
            })
        }
        None => host.default_output_device().ok_or_else(|| {
            CallError::DeviceUnavailable("No default output device available".to_string())
        }),
    }
}

fn is_handled_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

fn input_config(device: &Device, rate_hint: Option<u32>) -> Result<SupportedStreamConfig, CallError> {
    if let Some(rate) = rate_hint
        && let Ok(mut configs) = device.supported_input_configs()
        && let Some(range) = configs.find(|c| {
            is_handled_format(c.sample_format())
                && c.min_sample_rate().0 <= rate
                && rate <= c.max_sample_rate().0
        })
    {
        return Ok(range.with_sample_rate(SampleRate(rate)));
    }
    device
        .default_input_config()
        .map_err(|e| classify_device_error(e.to_string()))
}

fn output_config(device: &Device, rate: u32) -> Result<SupportedStreamConfig, CallError> {
    if let Ok(mut configs) = device.supported_output_configs()
        && let Some(range) = configs.find(|c| {
            is_handled_format(c.sample_format())
                && c.min_sample_rate().0 <= rate
                && rate <= c.max_sample_rate().0
        })
    {
        return Ok(range.with_sample_rate(SampleRate(rate)));
    }
    device
        .default_output_config()
        .map_err(|e| classify_device_error(e.to_string()))
}

/// Backends report a refused microphone as an ordinary backend error, so the
/// message text is the only signal.
fn classify_device_error(message: String) -> CallError {
    let lower = message.to_lowercase();
    if ["permission", "denied", "not authorized", "access"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CallError::PermissionDenied(message)
    } else {
        CallError::DeviceUnavailable(message)
    }
}

fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| {
            frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
        })
        .collect()
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: Arc<dyn Pushable<AudioFrame>>,
) -> Result<cpal::Stream, CallError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if let Ok(frame) = AudioFrame::new(sample_rate, downmix(data, channels)) {
                    sink.push(frame);
                }
            },
            |err| error!("An error occurred on the input audio stream: {}", err),
            None,
        )
        .map_err(|e| classify_device_error(e.to_string()))
}

fn build_output_stream<T>(
    device: &Device,
    config: &StreamConfig,
    source: Arc<dyn Pullable<AudioFrame>>,
    mut converter: OutputResampler,
) -> Result<cpal::Stream, CallError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mono = converter.render(data.len() / channels, &*source);
                for (slots, sample) in data.chunks_mut(channels).zip(mono) {
                    for slot in slots {
                        *slot = T::from_sample(sample);
                    }
                }
            },
            |err| error!("An error occurred on the output audio stream: {}", err),
            None,
        )
        .map_err(|e| classify_device_error(e.to_string()))
}

fn pull_exact(source: &dyn Pullable<AudioFrame>, len: usize) -> Vec<f32> {
    let mut samples = source
        .pull(len)
        .map(AudioFrame::into_inner)
        .unwrap_or_default();
    samples.resize(len, 0.0);
    samples
}

/// Input frames handed to the resampler per call.
const RESAMPLER_CHUNK: usize = 1024;

/// Converts the playback timeline to the device rate. The timeline is pulled
/// in whole resampler chunks; output beyond what the device asked for waits
/// in `pending` for the next callback.
struct OutputResampler {
    resampler: Option<FftFixedIn<f32>>,
    pending: VecDeque<f32>,
}

impl OutputResampler {
    fn new(source_rate: u32, device_rate: u32) -> Result<Self, CallError> {
        let resampler = if source_rate == device_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                source_rate as usize,
                device_rate as usize,
                RESAMPLER_CHUNK,
                1,
                1,
            )
            .map_err(|e| CallError::DeviceUnavailable(format!("Failed to create resampler: {e}")))?;
            info!("Created resampler {}Hz -> {}Hz", source_rate, device_rate);
            Some(resampler)
        };
        Ok(Self {
            resampler,
            pending: VecDeque::new(),
        })
    }

    fn render(&mut self, frames: usize, source: &dyn Pullable<AudioFrame>) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return pull_exact(source, frames);
        };

        while self.pending.len() < frames {
            let input = pull_exact(source, resampler.input_frames_next());
            match resampler.process(&[input], None) {
                Ok(mut output) => self.pending.extend(output.swap_remove(0)),
                Err(e) => {
                    error!("Failed to resample playback audio: {}", e);
                    break;
                }
            }
        }

        let available = frames.min(self.pending.len());
        let mut out: Vec<f32> = self.pending.drain(..available).collect();
        out.resize(frames, 0.0);
        out
    }
}
