use serde::{Deserialize, Serialize};

use crate::audio::AudioArtifact;

/// Explicit error code for an already-registered contact
pub const DUPLICATE_CODE: &str = "duplicate";

/// Detail substring older backends use for duplicates
const DUPLICATE_DETAIL_MARKER: &str = "already exists";

/// Body of `POST /users`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRequest {
    pub email: String,
}

/// Error body returned on non-success statuses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Plain message, or a list of validation errors
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match &self.detail {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.code.as_deref() == Some(DUPLICATE_CODE)
            || self
                .detail_text()
                .is_some_and(|d| d.contains(DUPLICATE_DETAIL_MARKER))
    }
}

/// Body of a 207 from `POST /upload_bulk`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUploadReport {
    /// Items the server did not store
    #[serde(default)]
    pub rejected: Vec<String>,
}

/// Server answer to a bulk upload that was not a hard failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkResponse {
    /// 200: every item stored
    Stored,
    /// 207: some items rejected; report is `None` if the body was unreadable
    Partial(Option<BulkUploadReport>),
}

/// Server answer to a contact registration that was not a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactResponse {
    Registered,
    Duplicate,
}

/// One artifact ready to send
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub phoneme: String,
    pub file_name: String,
    pub artifact: AudioArtifact,
}

impl UploadItem {
    /// Name uploads `<phoneme>_<unix-millis>.<ext>`
    pub fn new(phoneme: String, artifact: AudioArtifact) -> Self {
        let file_name = format!(
            "{}_{}.{}",
            phoneme,
            chrono::Utc::now().timestamp_millis(),
            artifact.format().file_extension()
        );

        Self {
            phoneme,
            file_name,
            artifact,
        }
    }
}
