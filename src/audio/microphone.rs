//! CPAL-backed microphone
//!
//! The CPAL stream is created and owned by a dedicated audio thread, because
//! `cpal::Stream` is not `Send` on every platform. The thread reports the
//! negotiated sample rate back once the stream is playing, then parks until the
//! [`DeviceStream`] releases it.
//!
//! ```text
//! Audio Thread (sync)                 Tokio Runtime (async)
//! ┌──────────────────┐                ┌──────────────────────┐
//! │ CPAL Callback    │──channel──▶    │ CaptureSession       │
//! │ try_send(chunk)  │                │   └─ SampleBuffer    │
//! │ err_fn           │──watch───▶     │ (device loss)        │
//! └──────────────────┘                └──────────────────────┘
//! ```

use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};

use super::device::{AudioDevice, DeviceEvent, DeviceStream, DisconnectSignal};
use super::AudioError;

/// Default bound on chunks queued between the audio callback and the consumer
pub const DEFAULT_CHUNK_QUEUE_CAPACITY: usize = 256;

/// Microphone input via CPAL.
#[derive(Debug, Clone)]
pub struct Microphone {
    device_name: Option<String>,
    chunk_queue_capacity: usize,
}

impl Default for Microphone {
    fn default() -> Self {
        Self {
            device_name: None,
            chunk_queue_capacity: DEFAULT_CHUNK_QUEUE_CAPACITY,
        }
    }
}

impl Microphone {
    /// Use the named input device instead of the host default.
    pub fn with_device(mut self, name: Option<String>) -> Self {
        self.device_name = name;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.chunk_queue_capacity = capacity.max(1);
        self
    }
}

impl AudioDevice for Microphone {
    async fn request_access(&self) -> Result<DeviceStream, AudioError> {
        let (event_tx, event_rx) = mpsc::channel(self.chunk_queue_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (signal, lost) = DisconnectSignal::new();
        let device_name = self.device_name.clone();

        let audio_thread = thread::Builder::new()
            .name("voice-verify-audio".to_string())
            .spawn(move || run_audio_thread(device_name, event_tx, signal, ready_tx, stop_rx))
            .map_err(|e| {
                AudioError::StreamCreationFailed(format!("Failed to spawn audio thread: {}", e))
            })?;

        let sample_rate = match ready_rx.await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = audio_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = audio_thread.join();
                return Err(AudioError::StreamCreationFailed(
                    "audio thread exited before the stream started".to_string(),
                ));
            }
        };

        Ok(DeviceStream::new(sample_rate, event_rx, move || {
            let _ = stop_tx.send(());
            if audio_thread.join().is_err() {
                log::error!("Audio thread panicked during shutdown");
            }
            log::info!("Microphone released");
        })
        .with_disconnect_signal(lost))
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn run_audio_thread(
    device_name: Option<String>,
    event_tx: mpsc::Sender<DeviceEvent>,
    signal: DisconnectSignal,
    ready_tx: oneshot::Sender<Result<u32, AudioError>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let stream = match open_stream(device_name.as_deref(), event_tx, signal) {
        Ok((stream, sample_rate)) => {
            let _ = ready_tx.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            log::error!("Failed to open microphone: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Blocks until release sends, or the DeviceStream is gone entirely
    let _ = stop_rx.recv();
    drop(stream);
}

fn open_stream(
    device_name: Option<&str>,
    event_tx: mpsc::Sender<DeviceEvent>,
    signal: DisconnectSignal,
) -> Result<(Stream, u32), AudioError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)?;

    log::info!("Using audio input device: {:?}", device.name());

    let supported_config = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::NoDevice,
        cpal::DefaultStreamConfigError::BackendSpecific { err } => {
            classify_backend_error(&err.description)
        }
        _ => AudioError::NoSupportedConfig,
    })?;

    log::info!(
        "Audio config: {} Hz, {} channels, {:?}",
        supported_config.sample_rate().0,
        supported_config.channels(),
        supported_config.sample_format()
    );

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();
    let sample_rate = config.sample_rate.0;

    let stream = match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(&device, &config, event_tx, signal),
        SampleFormat::U16 => build_stream_typed::<u16>(&device, &config, event_tx, signal),
        SampleFormat::F32 => build_stream_typed::<f32>(&device, &config, event_tx, signal),
        _ => Err(AudioError::NoSupportedConfig),
    }?;

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::DeviceNotAvailable => AudioError::NoDevice,
        cpal::PlayStreamError::BackendSpecific { err } => classify_backend_error(&err.description),
    })?;

    Ok((stream, sample_rate))
}

fn select_device(host: &cpal::Host, device_name: Option<&str>) -> Result<Device, AudioError> {
    match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(AudioError::NoDevice),
        None => host.default_input_device().ok_or(AudioError::NoDevice),
    }
}

fn build_stream_typed<T>(
    device: &Device,
    config: &StreamConfig,
    event_tx: mpsc::Sender<DeviceEvent>,
    signal: DisconnectSignal,
) -> Result<Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    // Loss goes around the chunk queue so a full queue cannot swallow it
    let err_fn = move |err: cpal::StreamError| match err {
        cpal::StreamError::DeviceNotAvailable => {
            log::warn!("Audio device no longer available");
            signal.notify("device no longer available");
        }
        other => log::error!("Audio stream error: {}", other),
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk = first_channel(data, channels);
                match event_tx.try_send(DeviceEvent::Chunk(chunk)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!("Sample queue full, dropping {} frames", data.len() / channels);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoDevice,
            cpal::BuildStreamError::StreamConfigNotSupported => AudioError::NoSupportedConfig,
            cpal::BuildStreamError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
            other => AudioError::StreamCreationFailed(other.to_string()),
        })
}

/// Keep only channel 0 of interleaved frames, as f32.
fn first_channel<T: cpal::Sample>(data: &[T], channels: usize) -> Vec<f32>
where
    f32: cpal::FromSample<T>,
{
    data.iter()
        .step_by(channels.max(1))
        .map(|&s| s.to_sample::<f32>())
        .collect()
}

/// CPAL reports OS permission refusals as backend errors.
fn classify_backend_error(description: &str) -> AudioError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        AudioError::PermissionDenied
    } else {
        AudioError::StreamCreationFailed(description.to_string())
    }
}
