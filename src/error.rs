//! Error types shared across capture, upload and storage

use std::time::Duration;

/// Microphone acquisition and capture failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No microphone available")]
    NotFound,

    #[error("Microphone stream is inactive or has no audio tracks")]
    StreamInactive,

    #[error("Capture is already running")]
    AlreadyCapturing,

    #[error("Capture facility error: {0}")]
    Facility(String),
}

/// Errors surfaced by the recording controller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordingError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Recording produced no audio on the fallback method")]
    SilentRecording,

    #[error("Cannot record while an upload is in progress")]
    UploadInProgress,

    #[error("No survey item is active")]
    NoActiveItem,
}

/// Failures talking to the survey backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server returned {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the failure looks like lost connectivity rather than a server answer
    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::Network(_) | BackendError::Timeout(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Durable storage failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt pending queue: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Contact identifier submission failures
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("Invalid email address: {0}")]
    Invalid(String),

    #[error("Server rejected contact: {0}")]
    Rejected(String),

    #[error("Failed to persist contact locally: {0}")]
    Storage(#[from] StorageError),
}
