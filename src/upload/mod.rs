//! Upload of encoded recordings to the voice verification service.

mod client;

pub use client::{Endpoint, UploadClient, UploadResult, AUDIO_FILE_NAME};

/// Errors that can occur while talking to the verification service.
///
/// A service that answers with `success: false` is not an error here; that
/// verdict comes back as an [`UploadResult`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    /// No response was received (connect failure, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),
    /// The service responded, but not with a verdict
    #[error("Invalid response from server ({status}): {message}")]
    InvalidResponse { status: u16, message: String },
    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
