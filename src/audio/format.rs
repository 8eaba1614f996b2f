// Container/codec negotiation for the high-level recorder

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Default priority: uncompressed first, then broadly supported compressed
/// formats, then narrower ones.
pub const DEFAULT_FORMAT_CANDIDATES: [&str; 5] = [
    "audio/wav",
    "audio/mp4",
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
];

/// MIME-like container/codec identifier, e.g. `audio/webm;codecs=opus`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatId(String);

impl FormatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Tag used by the raw-signal fallback encoder
    pub fn wav() -> Self {
        Self::new("audio/wav")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container part without codec parameters (`audio/webm;codecs=opus` -> `audio/webm`)
    pub fn container(&self) -> &str {
        self.0.split(';').next().unwrap_or("").trim()
    }

    /// File extension used when naming uploads
    pub fn file_extension(&self) -> &'static str {
        match self.container() {
            "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
            "audio/mp4" | "audio/aac" => "m4a",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            _ => "webm",
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormatId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Capability query answered by the platform's recording facility
pub trait FormatProbe {
    fn is_type_supported(&self, format: &FormatId) -> bool;
}

/// Return the first candidate the probe supports, in priority order
pub fn select_format<P>(candidates: &[FormatId], probe: &P) -> Option<FormatId>
where
    P: FormatProbe + ?Sized,
{
    for candidate in candidates {
        if probe.is_type_supported(candidate) {
            info!("Supported recording format found: {}", candidate);
            return Some(candidate.clone());
        }
        debug!("Recording format not supported: {}", candidate);
    }

    info!("No high-level recording format supported ({} candidates)", candidates.len());
    None
}

/// Parse configured candidate strings, preserving order
pub fn candidates_from<S: AsRef<str>>(ids: &[S]) -> Vec<FormatId> {
    ids.iter().map(|id| FormatId::new(id.as_ref())).collect()
}
