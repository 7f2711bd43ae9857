//! Audio capture and encoding for voice-verify
//!
//! Microphone input comes in through the [`AudioDevice`] seam (CPAL in
//! production), is accumulated in a [`SampleBuffer`] and encoded as 16-bit
//! PCM WAV by [`encode_wav`].

mod device;
mod microphone;
mod sample_buffer;
mod wav;

pub use device::{AudioDevice, DeviceEvent, DeviceStream, DisconnectSignal};
pub use microphone::{list_input_devices, Microphone};
pub use sample_buffer::{SampleBuffer, SampleChunk};
pub use wav::{encode_wav, inspect_wav, sample_to_i16, WavInfo, WAV_HEADER_LEN};

/// Errors that can occur while acquiring, capturing or encoding audio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    #[error("Microphone access was denied")]
    PermissionDenied,
    #[error("No audio input device found")]
    NoDevice,
    #[error("No supported audio configuration")]
    NoSupportedConfig,
    #[error("Failed to create audio stream: {0}")]
    StreamCreationFailed(String),
    #[error("Audio device disconnected during capture: {0}")]
    DeviceDisconnected(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid WAV container: {0}")]
    InvalidContainer(String),
}
