use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::format::DEFAULT_FORMAT_CANDIDATES;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub recording: RecordingConfig,
    pub upload: UploadConfig,
    pub contact: ContactConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Path serving reference pronunciations (`?file_name=<phoneme>.mp3`)
    pub reference_audio_path: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            reference_audio_path: "/audio".to_string(),
            request_timeout_ms: 45_000,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Recording stops on its own after this long
    pub auto_stop_ms: u64,
    /// Slice interval requested from the high-level recorder
    pub timeslice_ms: u64,
    /// Sample rate of the raw-signal fallback tap
    pub fallback_sample_rate: u32,
    /// Upper bound on waiting for trailing data after stop
    pub stop_grace_ms: u64,
    /// Pause before re-recording after a silent fault
    pub restart_delay_ms: u64,
    /// Container formats in priority order
    pub format_candidates: Vec<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            auto_stop_ms: 5_000,
            timeslice_ms: 100,
            fallback_sample_rate: 44_100,
            stop_grace_ms: 2_000,
            restart_delay_ms: 500,
            format_candidates: DEFAULT_FORMAT_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RecordingConfig {
    pub fn auto_stop(&self) -> Duration {
        Duration::from_millis(self.auto_stop_ms)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Device class used by the upload mode heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
    /// Mobile browsers with tight memory/request limits (iOS Safari)
    ConstrainedMobile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub device_class: DeviceClass,
    pub constrained_threshold_bytes: u64,
    pub mobile_threshold_bytes: u64,
    /// Multipart framing estimate added per item
    pub per_item_overhead_bytes: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub item_timeout_ms: u64,
    pub bulk_timeout_ms: u64,
    pub inter_item_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            device_class: DeviceClass::Desktop,
            constrained_threshold_bytes: 25 * 1024 * 1024,
            mobile_threshold_bytes: 50 * 1024 * 1024,
            per_item_overhead_bytes: 1024,
            max_attempts: 2,
            retry_backoff_ms: 1_000,
            item_timeout_ms: 30_000,
            bulk_timeout_ms: 45_000,
            inter_item_delay_ms: 250,
        }
    }
}

impl UploadConfig {
    /// Size above which bulk uploads are avoided, if any applies to this device class
    pub fn bulk_threshold(&self) -> Option<u64> {
        match self.device_class {
            DeviceClass::Desktop => None,
            DeviceClass::Mobile => Some(self.mobile_threshold_bytes),
            DeviceClass::ConstrainedMobile => Some(self.constrained_threshold_bytes),
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

impl ContactConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub pending_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pending_path: "~/.phoneme-survey/pending-contacts.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn pending_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.pending_path).into_owned())
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SURVEY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
