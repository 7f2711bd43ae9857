//! Capture session: device access → buffered samples → WAV container
//!
//! A session is single use. It moves through
//! `Idle → AwaitingPermission → Capturing → Encoding → Done`, or ends in
//! `Failed`. All transitions go through the pure [`reduce`] function and are
//! published on a watch channel for observers.

use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{
    encode_wav, AudioDevice, AudioError, DeviceEvent, DeviceStream, SampleBuffer,
};

/// Longest capture accepted unless configured otherwise
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(120);

/// What to do when the device disappears mid-capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    /// Encode whatever arrived before the disconnect, once the timer expires
    #[default]
    Truncate,
    /// Fail the session at once with [`AudioError::DeviceDisconnected`]
    Fail,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub max_duration: Duration,
    pub disconnect_policy: DisconnectPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION,
            disconnect_policy: DisconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingPermission,
    Capturing,
    Encoding,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    Start,
    AccessGranted,
    AccessFailed,
    /// Timer expired, teardown requested, or device lost under `Truncate`
    WindowClosed,
    Encoded,
    Aborted,
}

/// Reducer: (state, event) -> next state, or `None` for an invalid transition.
pub fn reduce(state: CaptureState, event: CaptureEvent) -> Option<CaptureState> {
    use CaptureEvent::*;
    use CaptureState::*;

    match (state, event) {
        (Idle, Start) => Some(AwaitingPermission),
        (AwaitingPermission, AccessGranted) => Some(Capturing),
        (AwaitingPermission, AccessFailed) => Some(Failed),
        (Capturing, WindowClosed) => Some(Encoding),
        (Capturing, Aborted) => Some(Failed),
        (Encoding, Encoded) => Some(Done),
        (Encoding, Aborted) => Some(Failed),
        _ => None,
    }
}

/// Result of a finished capture
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    /// Encoded 16-bit mono PCM WAV container
    pub wav: Vec<u8>,
    /// Rate reported by the device, as declared in the container
    pub sample_rate: u32,
    pub sample_count: usize,
    pub chunk_count: usize,
    /// The device disconnected before the window closed
    pub truncated: bool,
}

impl CapturedAudio {
    pub fn into_bytes(self) -> Vec<u8> {
        self.wav
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.sample_count as u64 * 1000) / self.sample_rate as u64
    }
}

/// How the capture window ended
#[derive(Debug)]
enum WindowEnd {
    Elapsed,
    Stopped,
    Disconnected(String),
}

/// One run of device acquisition → buffering → encoding.
pub struct CaptureSession<'a, D: AudioDevice> {
    id: Uuid,
    device: &'a D,
    config: CaptureConfig,
    state: watch::Sender<CaptureState>,
}

impl<'a, D: AudioDevice> CaptureSession<'a, D> {
    pub fn new(device: &'a D, config: CaptureConfig) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        Self {
            id: Uuid::new_v4(),
            device,
            config,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Follow state transitions from another task.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    /// Record for exactly `duration` and return the encoded container.
    pub async fn capture(self, duration: Duration) -> Result<CapturedAudio, AudioError> {
        self.capture_until(duration, CancellationToken::new()).await
    }

    /// Like [`CaptureSession::capture`], but `stop` closes the window early.
    pub async fn capture_until(
        self,
        duration: Duration,
        stop: CancellationToken,
    ) -> Result<CapturedAudio, AudioError> {
        if duration > self.config.max_duration {
            return Err(AudioError::InvalidParameter(format!(
                "capture duration {:?} exceeds maximum {:?}",
                duration, self.config.max_duration
            )));
        }

        self.advance(CaptureEvent::Start);
        log::info!("Capture {}: requesting microphone access", self.id);

        let mut stream = match self.device.request_access().await {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Capture {}: device access failed: {}", self.id, e);
                self.advance(CaptureEvent::AccessFailed);
                return Err(e);
            }
        };

        self.advance(CaptureEvent::AccessGranted);
        let sample_rate = stream.sample_rate();
        log::info!(
            "Capture {}: recording {:?} at {} Hz",
            self.id,
            duration,
            sample_rate
        );

        let mut buffer = SampleBuffer::new();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let window_end = collect_window(&mut stream, &mut buffer, deadline.as_mut(), &stop).await;

        // Release before any further work; Drop covers the paths that never get here.
        // Chunks the device queued before it stopped still belong to the window.
        stream.release();
        let late = stream.drain_ready(&mut buffer);
        drop(stream);
        if late > 0 {
            log::debug!("Capture {}: drained {} queued chunks", self.id, late);
        }

        let truncated = match window_end {
            WindowEnd::Elapsed => false,
            WindowEnd::Stopped => {
                log::info!("Capture {}: stopped before timer expiry", self.id);
                false
            }
            WindowEnd::Disconnected(reason) => match self.config.disconnect_policy {
                DisconnectPolicy::Truncate => {
                    log::warn!(
                        "Capture {}: device lost ({}), keeping {} ms of audio",
                        self.id,
                        reason,
                        buffer.duration_ms(sample_rate)
                    );
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => {}
                        _ = deadline => {}
                    }
                    true
                }
                DisconnectPolicy::Fail => {
                    log::error!("Capture {}: device lost ({})", self.id, reason);
                    self.advance(CaptureEvent::Aborted);
                    return Err(AudioError::DeviceDisconnected(reason));
                }
            },
        };

        self.advance(CaptureEvent::WindowClosed);

        let chunk_count = buffer.len();
        let samples = buffer.merge();
        let sample_count = samples.len();

        match encode_wav(&samples, sample_rate) {
            Ok(wav) => {
                self.advance(CaptureEvent::Encoded);
                log::info!(
                    "Capture {}: encoded {} samples from {} chunks ({} bytes)",
                    self.id,
                    sample_count,
                    chunk_count,
                    wav.len()
                );
                Ok(CapturedAudio {
                    wav,
                    sample_rate,
                    sample_count,
                    chunk_count,
                    truncated,
                })
            }
            Err(e) => {
                log::error!("Capture {}: encoding failed: {}", self.id, e);
                self.advance(CaptureEvent::Aborted);
                Err(e)
            }
        }
    }

    fn advance(&self, event: CaptureEvent) {
        let current = self.state();
        match reduce(current, event) {
            Some(next) => {
                log::debug!(
                    "Capture {}: state transition {:?} -> {:?}",
                    self.id,
                    current,
                    next
                );
                self.state.send_replace(next);
            }
            None => log::warn!(
                "Capture {}: ignoring {:?} in state {:?}",
                self.id,
                event,
                current
            ),
        }
    }
}

/// Push device chunks into `buffer` until the timer fires, `stop` is
/// cancelled, or the device goes away.
async fn collect_window(
    stream: &mut DeviceStream,
    buffer: &mut SampleBuffer,
    mut deadline: Pin<&mut Sleep>,
    stop: &CancellationToken,
) -> WindowEnd {
    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => return WindowEnd::Stopped,

            _ = deadline.as_mut() => return WindowEnd::Elapsed,

            event = stream.next_event() => match event {
                DeviceEvent::Chunk(samples) => {
                    buffer.push(samples);
                }
                DeviceEvent::Disconnected(reason) => return WindowEnd::Disconnected(reason),
            },
        }
    }
}
