//! HTTP client for the voice verification service
//!
//! Uploads a WAV container with the subject's identifier as a multipart form.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::UploadError;

/// Filename the service expects for the audio attachment
pub const AUDIO_FILE_NAME: &str = "voice.wav";

const IDENTIFIER_FIELD: &str = "student_id";
const AUDIO_FIELD: &str = "audio";

/// Longest response body echoed back in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Remote operation to submit a recording to.
///
/// Uploads accept any `AsRef<str>` path segment, so routes the service adds
/// later can be passed as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Enroll a new voiceprint
    Register,
    /// Check a recording against the enrolled voiceprint
    Verify,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Register => "register",
            Endpoint::Verify => "verify",
        }
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service verdict. `success` is authoritative regardless of HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: String,
}

/// Client for one verification service.
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    http: Client,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(UploadError::InvalidRequest(
                "base URL must not be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::ClientBuild(e.to_string()))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: impl AsRef<str>) -> String {
        format!(
            "{}/{}",
            self.base_url,
            endpoint.as_ref().trim_start_matches('/')
        )
    }

    /// Submit a WAV container for `identifier` to `endpoint`.
    ///
    /// # Returns
    /// * `Ok(UploadResult)` - The service answered with a well-formed verdict,
    ///   whatever the HTTP status
    /// * `Err(UploadError::Network)` - No response was received
    /// * `Err(UploadError::InvalidResponse)` - The body was not a verdict
    pub async fn upload(
        &self,
        endpoint: impl AsRef<str>,
        identifier: &str,
        wav: Vec<u8>,
    ) -> Result<UploadResult, UploadError> {
        let endpoint = endpoint.as_ref();
        if endpoint.trim_matches('/').is_empty() {
            return Err(UploadError::InvalidRequest(
                "endpoint must not be empty".to_string(),
            ));
        }
        let url = self.endpoint_url(endpoint);
        log::info!(
            "Uploading {} bytes to {} for identifier {:?}",
            wav.len(),
            url,
            identifier
        );

        let audio_part = Part::bytes(wav)
            .file_name(AUDIO_FILE_NAME)
            .mime_str("audio/wav")
            .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;

        let form = Form::new()
            .text(IDENTIFIER_FIELD, identifier.to_string())
            .part(AUDIO_FIELD, audio_part);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let result = parse_verdict(status.as_u16(), &body)?;
        if !status.is_success() {
            log::warn!(
                "{} returned HTTP {} (success={}): {}",
                endpoint,
                status.as_u16(),
                result.success,
                result.message
            );
        } else {
            log::info!(
                "{} completed: success={}, message={:?}",
                endpoint,
                result.success,
                result.message
            );
        }

        Ok(result)
    }

    /// Query the service root and return its status message.
    pub async fn health(&self) -> Result<String, UploadError> {
        let url = format!("{}/", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::InvalidResponse {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        serde_json::from_str::<HealthResponse>(&body)
            .map(|h| h.message)
            .map_err(|e| UploadError::InvalidResponse {
                status: status.as_u16(),
                message: e.to_string(),
            })
    }
}

fn parse_verdict(status: u16, body: &str) -> Result<UploadResult, UploadError> {
    serde_json::from_str::<UploadResult>(body).map_err(|e| {
        log::error!("Unparseable response (HTTP {}): {}", status, e);
        UploadError::InvalidResponse {
            status,
            message: truncate_body(body),
        }
    })
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Register.as_str(), "register");
        assert_eq!(Endpoint::Verify.to_string(), "verify");
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let client = UploadClient::new("http://127.0.0.1:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
        assert_eq!(
            client.endpoint_url(Endpoint::Verify),
            "http://127.0.0.1:5000/verify"
        );
    }

    #[test]
    fn test_endpoint_url_accepts_custom_route() {
        let client = UploadClient::new("http://127.0.0.1:5000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint_url("/v2/enroll"),
            "http://127.0.0.1:5000/v2/enroll"
        );
    }

    #[tokio::test]
    async fn test_empty_endpoint_rejected() {
        let client = UploadClient::new("http://127.0.0.1:5000", Duration::from_secs(5)).unwrap();
        let err = client.upload("/", "s-1", Vec::new()).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = UploadClient::new("", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, UploadError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_verdict_ignores_extra_fields() {
        let result = parse_verdict(
            200,
            r#"{"success": true, "message": "ok", "score": 0.91}"#,
        )
        .unwrap();
        assert_eq!(
            result,
            UploadResult {
                success: true,
                message: "ok".to_string()
            }
        );
    }

    #[test]
    fn test_parse_verdict_rejects_non_json() {
        let err = parse_verdict(502, "<html>Bad Gateway</html>").unwrap_err();
        match err {
            UploadError::InvalidResponse { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert_eq!(truncate_body("  short \n"), "short");
    }
}
