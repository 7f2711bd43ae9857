use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{CaptureConfig, DisconnectPolicy};
use crate::flow::FlowConfig;

const APP_DIR_NAME: &str = "voice-verify";
const SETTINGS_FILE_NAME: &str = "settings.json";

pub const BASE_URL_ENV: &str = "VOICE_VERIFY_BASE_URL";
pub const RECORD_SECS_ENV: &str = "VOICE_VERIFY_RECORD_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Root URL of the verification service; endpoints are appended to it.
    pub base_url: String,

    /// Length of each voice sample.
    pub record_secs: u64,

    /// Requests for longer samples are refused before the microphone opens.
    pub max_record_secs: u64,

    /// Whole-request timeout for uploads.
    pub request_timeout_secs: u64,

    /// Delay between a successful verification and opening the exam page.
    pub redirect_delay_ms: u64,

    /// Encode what was captured (`truncate`) or fail (`fail`) when the
    /// microphone disappears mid-recording.
    pub disconnect_policy: DisconnectPolicy,

    /// Input device name; the host default when unset.
    pub input_device: Option<String>,

    /// Chunks that may queue between the audio callback and the session.
    pub chunk_queue_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            record_secs: 7,
            max_record_secs: 120,
            request_timeout_secs: 60,
            redirect_delay_ms: 2000,
            disconnect_policy: DisconnectPolicy::Truncate,
            input_device: None,
            chunk_queue_capacity: 256,
        }
    }
}

impl AppSettings {
    /// Override fields from `VOICE_VERIFY_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                self.base_url = url;
            }
        }

        if let Ok(secs) = std::env::var(RECORD_SECS_ENV) {
            match secs.parse::<u64>() {
                Ok(secs) => self.record_secs = secs,
                Err(e) => log::warn!("Settings: ignoring {}={:?}: {}", RECORD_SECS_ENV, secs, e),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            max_duration: Duration::from_secs(self.max_record_secs),
            disconnect_policy: self.disconnect_policy,
        }
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            record_duration: Duration::from_secs(self.record_secs),
            redirect_delay: Duration::from_millis(self.redirect_delay_ms),
            capture: self.capture_config(),
        }
    }
}

/// `<config_dir>/voice-verify/settings.json`
pub fn settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
    Ok(dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings() -> AppSettings {
    match settings_path() {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            log::warn!("Settings: {}", e);
            AppSettings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(settings: &AppSettings) -> Result<(), String> {
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write to a sibling temp file, then rename over the target.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // rename does not replace an existing file on Windows
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(format!("Remove existing settings file {:?}: {}", path, e));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
    Ok(())
}
