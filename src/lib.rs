//! voice-verify: record a microphone sample, encode it as 16-bit PCM WAV and
//! submit it to a voice verification service for enrollment or verification.
//!
//! ```text
//! AudioDevice ──chunks──▶ SampleBuffer ──merge──▶ encode_wav ──▶ UploadClient
//!                                                                   │
//!                                      StatusSink / Navigator ◀─────┘
//! ```

pub mod audio;
pub mod capture;
pub mod flow;
pub mod session;
pub mod settings;
pub mod upload;

pub use audio::{encode_wav, AudioDevice, AudioError, Microphone, SampleBuffer};
pub use capture::{CaptureConfig, CaptureSession, CaptureState, CapturedAudio, DisconnectPolicy};
pub use flow::{FlowConfig, FlowError, StatusSink, StatusUpdate, VoiceFlow};
pub use session::{Navigator, Page, SessionContext};
pub use upload::{Endpoint, UploadClient, UploadError, UploadResult};
