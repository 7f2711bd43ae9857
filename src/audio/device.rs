//! Device capability seam between capture sessions and audio hardware
//!
//! A device grants (or refuses) access and then delivers sample chunks over a
//! bounded channel. The returned [`DeviceStream`] owns the device for the
//! lifetime of the capture and releases it exactly once, on drop at the latest.
//!
//! Device loss can also be reported out of band through a [`DisconnectSignal`],
//! so it is seen even when the chunk queue is full.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{AudioError, SampleBuffer};

/// Something the audio device reports while a stream is live.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// One device-sized batch of mono samples
    Chunk(Vec<f32>),
    /// The device went away; no further chunks will arrive
    Disconnected(String),
}

/// Producer half of an out-of-band device loss report.
///
/// Cheap to clone and safe to call from a realtime audio callback. Only the
/// first reported reason is kept.
#[derive(Debug, Clone)]
pub struct DisconnectSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl DisconnectSignal {
    /// Create a signal and the receiver to hand to [`DeviceStream::with_disconnect_signal`].
    pub fn new() -> (Self, watch::Receiver<Option<String>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn notify(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// Live connection to an input device.
pub struct DeviceStream {
    sample_rate: u32,
    events: mpsc::Receiver<DeviceEvent>,
    lost: Option<watch::Receiver<Option<String>>>,
    release: Option<ReleaseFn>,
}

impl DeviceStream {
    /// Wrap a device's event channel.
    ///
    /// `release` tears down the device and anything between it and the
    /// channel. It runs once, either from [`DeviceStream::release`] or on drop.
    pub fn new(
        sample_rate: u32,
        events: mpsc::Receiver<DeviceEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            sample_rate,
            events,
            lost: None,
            release: Some(Box::new(release)),
        }
    }

    /// Also watch `lost` for device loss reported outside the chunk queue.
    pub fn with_disconnect_signal(mut self, lost: watch::Receiver<Option<String>>) -> Self {
        self.lost = Some(lost);
        self
    }

    /// Rate the device actually produces samples at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Wait for the next device event.
    ///
    /// Queued chunks come first. A closed channel or a raised
    /// [`DisconnectSignal`] is reported as a disconnect once the queue is empty.
    pub async fn next_event(&mut self) -> DeviceEvent {
        let events = &mut self.events;
        let lost = &mut self.lost;

        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(event) => event,
                None => DeviceEvent::Disconnected("sample stream closed".to_string()),
            },

            reason = wait_for_loss(lost) => DeviceEvent::Disconnected(reason),
        }
    }

    /// Stop accepting chunks and move the ones still queued into `buffer`.
    ///
    /// Returns how many chunks were moved. Disconnect events are skipped.
    pub fn drain_ready(&mut self, buffer: &mut SampleBuffer) -> usize {
        self.events.close();

        let mut drained = 0;
        while let Ok(event) = self.events.try_recv() {
            if let DeviceEvent::Chunk(samples) = event {
                buffer.push(samples);
                drained += 1;
            }
        }
        drained
    }

    /// Stop the device and close the sample channel. Idempotent.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            self.events.close();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

async fn wait_for_loss(lost: &mut Option<watch::Receiver<Option<String>>>) -> String {
    if let Some(rx) = lost {
        if let Ok(reason) = rx.wait_for(Option::is_some).await {
            return (*reason).clone().unwrap_or_default();
        }
    }
    std::future::pending().await
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("sample_rate", &self.sample_rate)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Provider of microphone access.
///
/// Awaiting `request_access` is where permission prompts happen; it fails with
/// [`AudioError::PermissionDenied`] or [`AudioError::NoDevice`] before any
/// audio is produced.
pub trait AudioDevice: Send + Sync {
    fn request_access(&self) -> impl Future<Output = Result<DeviceStream, AudioError>> + Send;
}
