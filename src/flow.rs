//! Enrollment and verification workflows
//!
//! Drives one capture and one upload per call and reports progress to the UI
//! layer through a [`StatusSink`]. Every outcome ends with exactly one final
//! status update; only the sink decides how text is rendered.

use std::time::Duration;

use crate::audio::{inspect_wav, AudioDevice, AudioError};
use crate::capture::{CaptureConfig, CaptureSession};
use crate::session::{Navigator, Page, SessionContext};
use crate::upload::{Endpoint, UploadClient, UploadError, UploadResult};

pub const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(7);
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// One status line for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub message: String,
    pub success: bool,
}

impl StatusUpdate {
    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

/// Receiver of status updates (the UI layer).
pub trait StatusSink: Send + Sync {
    fn set_status(&self, update: StatusUpdate);
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("An identifier is required")]
    MissingIdentifier,
    #[error(transparent)]
    Capture(#[from] AudioError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// The service answered `success: false`; carries its message verbatim
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub record_duration: Duration,
    /// Pause between a successful verification and the page transition
    pub redirect_delay: Duration,
    pub capture: CaptureConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            record_duration: DEFAULT_RECORD_DURATION,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            capture: CaptureConfig::default(),
        }
    }
}

pub struct VoiceFlow<D: AudioDevice> {
    device: D,
    client: UploadClient,
    config: FlowConfig,
}

impl<D: AudioDevice> VoiceFlow<D> {
    pub fn new(device: D, client: UploadClient, config: FlowConfig) -> Self {
        Self {
            device,
            client,
            config,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Record a sample and enroll it for `identifier`.
    pub async fn enroll(
        &self,
        identifier: &str,
        status: &dyn StatusSink,
    ) -> Result<UploadResult, FlowError> {
        self.record_and_upload(Endpoint::Register, identifier, status)
            .await
    }

    /// Record a sample and verify it against `identifier`.
    ///
    /// On success, waits the redirect delay, stores the identifier in
    /// `session` and navigates to the exam page.
    pub async fn verify(
        &self,
        identifier: &str,
        status: &dyn StatusSink,
        session: &mut SessionContext,
        navigator: &dyn Navigator,
    ) -> Result<UploadResult, FlowError> {
        let result = self
            .record_and_upload(Endpoint::Verify, identifier, status)
            .await?;

        tokio::time::sleep(self.config.redirect_delay).await;
        session.establish(identifier.trim());
        log::info!("Verified {:?}, opening exam page", identifier.trim());
        navigator.navigate(Page::Exam);

        Ok(result)
    }

    async fn record_and_upload(
        &self,
        endpoint: Endpoint,
        identifier: &str,
        status: &dyn StatusSink,
    ) -> Result<UploadResult, FlowError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            status.set_status(StatusUpdate::failure("Please enter an identifier"));
            return Err(FlowError::MissingIdentifier);
        }

        let purpose = match endpoint {
            Endpoint::Register => "registration",
            Endpoint::Verify => "verification",
        };
        status.set_status(StatusUpdate::progress(format!(
            "Recording voice for {}...",
            purpose
        )));

        match self.run_pipeline(endpoint, identifier, status).await {
            Ok(result) => {
                status.set_status(StatusUpdate {
                    message: result.message.clone(),
                    success: result.success,
                });
                if result.success {
                    Ok(result)
                } else {
                    Err(FlowError::Rejected(result.message))
                }
            }
            Err(e) => {
                log::error!("{} for {:?} failed: {}", endpoint, identifier, e);
                status.set_status(StatusUpdate::failure(format!(
                    "Recording or upload failed: {}",
                    e
                )));
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        endpoint: Endpoint,
        identifier: &str,
        status: &dyn StatusSink,
    ) -> Result<UploadResult, FlowError> {
        let session = CaptureSession::new(&self.device, self.config.capture.clone());
        let captured = session.capture(self.config.record_duration).await?;

        if captured.truncated {
            log::warn!(
                "Uploading truncated recording ({} ms of {:?})",
                captured.duration_ms(),
                self.config.record_duration
            );
        }
        match inspect_wav(&captured.wav) {
            Ok(info) => log::debug!(
                "Container: {} Hz, {} ch, {} bit, {:?}",
                info.sample_rate,
                info.channels,
                info.bits_per_sample,
                info.duration()
            ),
            Err(e) => log::warn!("Could not read back encoded container: {}", e),
        }

        status.set_status(StatusUpdate::progress("Uploading voice..."));
        let result = self
            .client
            .upload(endpoint, identifier, captured.into_bytes())
            .await?;
        Ok(result)
    }
}
