use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::stats::SessionStats;
use crate::audio::{AudioArtifact, DeviceStream};
use crate::error::RecordingError;

/// Session handle shared by the controller, the upload pipeline and the UI glue
pub type SharedSession = Arc<Mutex<Session>>;

/// All mutable survey state for one pass through the item list.
///
/// Invariants:
/// - `is_recording` and `is_uploading` are never both set
/// - `has_submitted` only goes back to false through [`Session::reset_for_restart`]
/// - stored artifacts are shared, never rebuilt
pub struct Session {
    session_id: String,
    started_at: DateTime<Utc>,
    phonemes: Vec<String>,
    current_index: usize,
    recordings: HashMap<String, AudioArtifact>,
    /// Artifact for the current item: freshly recorded or restored
    active_artifact: Option<AudioArtifact>,
    microphone: Option<Box<dyn DeviceStream>>,
    /// Set after a silent recording; the stream is re-acquired before reuse
    microphone_faulty: bool,
    is_recording: bool,
    is_uploading: bool,
    has_submitted: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: new_session_id(),
            started_at: Utc::now(),
            phonemes: Vec::new(),
            current_index: 0,
            recordings: HashMap::new(),
            active_artifact: None,
            microphone: None,
            microphone_faulty: false,
            is_recording: false,
            is_uploading: false,
            has_submitted: false,
        }
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ------------------------------------------------------------------
    // Survey items
    // ------------------------------------------------------------------

    /// Install the item list fetched at startup
    pub fn set_phonemes(&mut self, phonemes: Vec<String>) {
        info!("Session {}: {} survey items loaded", self.session_id, phonemes.len());
        self.phonemes = phonemes;
        self.current_index = 0;
        self.active_artifact = None;
    }

    pub fn phonemes(&self) -> &[String] {
        &self.phonemes
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_phoneme(&self) -> Option<&str> {
        self.phonemes.get(self.current_index).map(String::as_str)
    }

    pub fn is_last_item(&self) -> bool {
        !self.phonemes.is_empty() && self.current_index == self.phonemes.len() - 1
    }

    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    pub fn recordings(&self) -> &HashMap<String, AudioArtifact> {
        &self.recordings
    }

    pub fn recording(&self, phoneme: &str) -> Option<&AudioArtifact> {
        self.recordings.get(phoneme)
    }

    pub fn active_artifact(&self) -> Option<&AudioArtifact> {
        self.active_artifact.as_ref()
    }

    /// Put a freshly recorded artifact into the current item's slot
    pub fn stage_artifact(&mut self, artifact: AudioArtifact) {
        self.active_artifact = Some(artifact);
    }

    /// Store the staged artifact under the current item, if there is one
    pub fn commit_active(&mut self) -> bool {
        let (Some(phoneme), Some(artifact)) = (
            self.phonemes.get(self.current_index),
            self.active_artifact.as_ref(),
        ) else {
            return false;
        };

        debug!("Storing {} bytes for '{}'", artifact.len(), phoneme);
        self.recordings.insert(phoneme.clone(), artifact.clone());
        true
    }

    /// Snapshot of stored artifacts in survey order
    pub fn upload_batch(&self) -> Vec<(String, AudioArtifact)> {
        self.phonemes
            .iter()
            .filter_map(|p| self.recordings.get(p).map(|a| (p.clone(), a.clone())))
            .collect()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move to the next item. No-op on the last item or while recording.
    pub fn advance(&mut self) -> bool {
        if self.is_recording || self.current_index + 1 >= self.phonemes.len() {
            return false;
        }
        self.navigate_to(self.current_index + 1);
        true
    }

    /// Move to the previous item. No-op on the first item or while recording.
    pub fn retreat(&mut self) -> bool {
        if self.is_recording || self.current_index == 0 || self.phonemes.is_empty() {
            return false;
        }
        self.navigate_to(self.current_index - 1);
        true
    }

    fn navigate_to(&mut self, index: usize) {
        self.commit_active();
        self.current_index = index;
        self.active_artifact = None;

        let phoneme = &self.phonemes[index];
        match self.recordings.get(phoneme) {
            Some(existing) if !existing.is_empty() => {
                debug!("Restoring recording for '{}' ({} bytes)", phoneme, existing.len());
                self.active_artifact = Some(existing.clone());
            }
            Some(_) => warn!("Stored recording for '{}' is empty, not restoring", phoneme),
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_uploading(&self) -> bool {
        self.is_uploading
    }

    pub fn has_submitted(&self) -> bool {
        self.has_submitted
    }

    /// Claim the microphone side of the recording/upload exclusion
    pub fn begin_recording(&mut self) -> Result<(), RecordingError> {
        if self.is_uploading {
            return Err(RecordingError::UploadInProgress);
        }
        self.is_recording = true;
        Ok(())
    }

    pub fn end_recording(&mut self) {
        self.is_recording = false;
    }

    /// Claim the network side. False if an upload is running, the batch was
    /// already submitted, or a recording is active.
    pub fn begin_upload(&mut self) -> bool {
        if self.is_uploading || self.has_submitted || self.is_recording {
            return false;
        }
        self.is_uploading = true;
        true
    }

    /// Release the network side. `pass_id` is the session id captured when
    /// the upload began; a success only closes that same pass.
    pub fn finish_upload(&mut self, pass_id: &str, success: bool) {
        self.is_uploading = false;

        if pass_id != self.session_id {
            warn!(
                "Upload for pass {} finished after the session moved to {}, ignoring result",
                pass_id, self.session_id
            );
            return;
        }
        if success {
            self.has_submitted = true;
        }
    }

    // ------------------------------------------------------------------
    // Microphone
    // ------------------------------------------------------------------

    /// The held stream, if it is still live and not flagged faulty
    pub fn usable_microphone(&self) -> Option<&dyn DeviceStream> {
        match &self.microphone {
            Some(stream)
                if !self.microphone_faulty && stream.is_active() && stream.track_count() > 0 =>
            {
                Some(stream.as_ref())
            }
            _ => None,
        }
    }

    pub fn has_microphone(&self) -> bool {
        self.microphone.is_some()
    }

    pub fn set_microphone(&mut self, stream: Box<dyn DeviceStream>) {
        self.release_microphone();
        self.microphone = Some(stream);
        self.microphone_faulty = false;
    }

    /// Stop and drop the held stream
    pub fn release_microphone(&mut self) {
        if let Some(mut stream) = self.microphone.take() {
            debug!("Releasing microphone stream");
            stream.stop_tracks();
        }
        self.microphone_faulty = false;
    }

    pub fn mark_microphone_faulty(&mut self) {
        if self.microphone.is_some() {
            self.microphone_faulty = true;
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Reset progress for a new pass; the item list and microphone survive.
    ///
    /// Refused while an upload is in flight: it cannot be cancelled and its
    /// result belongs to the current pass.
    pub fn reset_for_restart(&mut self) -> Result<(), RecordingError> {
        if self.is_uploading {
            return Err(RecordingError::UploadInProgress);
        }

        info!("Session {} restarting", self.session_id);
        self.recordings.clear();
        self.current_index = 0;
        self.active_artifact = None;
        self.is_recording = false;
        self.has_submitted = false;
        self.session_id = new_session_id();
        self.started_at = Utc::now();

        Ok(())
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            total_items: self.phonemes.len(),
            current_index: self.current_index,
            recorded_items: self.recordings.len(),
            recorded_bytes: self.recordings.values().map(|a| a.len() as u64).sum(),
            is_recording: self.is_recording,
            is_uploading: self.is_uploading,
            has_submitted: self.has_submitted,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
