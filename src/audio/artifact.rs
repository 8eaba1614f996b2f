use std::fmt;
use std::sync::Arc;

use super::format::FormatId;

/// A finished recording: immutable bytes plus their container format.
///
/// Cloning shares the underlying buffer, so moving an artifact between the
/// staging slot and the recordings map never re-encodes or copies it.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    bytes: Arc<[u8]>,
    format: FormatId,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, format: FormatId) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// Zero-length artifact, what a silent capture resolves to
    pub fn empty(format: FormatId) -> Self {
        Self::new(Vec::new(), format)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> &FormatId {
        &self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when both handles point at the same buffer
    pub fn same_buffer(&self, other: &AudioArtifact) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Outcome of inspecting an artifact after a capture stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCheck {
    Ok,
    /// Capture finished but produced no bytes
    SilentRecordingFault,
}

/// Single check applied after every strategy's `stop()`
pub fn validate_artifact(artifact: &AudioArtifact) -> ArtifactCheck {
    if artifact.is_empty() {
        ArtifactCheck::SilentRecordingFault
    } else {
        ArtifactCheck::Ok
    }
}
