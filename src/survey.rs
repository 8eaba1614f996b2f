use anyhow::{bail, Context, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::audio::{AudioArtifact, DeviceCapture, RecorderFacility};
use crate::backend::SurveyBackend;
use crate::config::Config;
use crate::contact::{ContactOutcome, ContactSubmitter, PendingReport, PendingStore};
use crate::error::{ContactError, RecordingError};
use crate::recording::{RecordingController, RecordingEvent, ToggleOutcome};
use crate::reference::ReferenceCache;
use crate::session::{Session, SessionStats, SharedSession};
use crate::upload::{UploadEvent, UploadOutcome, UploadPipeline};

/// Wires the session, recording controller, upload pipeline and contact
/// submitter together behind the operations the UI calls.
pub struct SurveyClient {
    session: SharedSession,
    backend: Arc<dyn SurveyBackend>,
    controller: Arc<RecordingController>,
    pipeline: UploadPipeline,
    contacts: ContactSubmitter,
    references: ReferenceCache,
    permission_watch: Mutex<Option<JoinHandle<()>>>,
}

/// Event receivers handed to the UI glue
pub struct SurveyEvents {
    pub recording: mpsc::UnboundedReceiver<RecordingEvent>,
    pub upload: mpsc::UnboundedReceiver<UploadEvent>,
}

impl SurveyClient {
    pub fn new(
        config: &Config,
        backend: Arc<dyn SurveyBackend>,
        device: Arc<dyn DeviceCapture>,
        facility: Arc<dyn RecorderFacility>,
        store: Arc<dyn PendingStore>,
    ) -> (Self, SurveyEvents) {
        let session = Session::shared();
        let (recording_tx, recording_rx) = mpsc::unbounded_channel();
        let (upload_tx, upload_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(
            RecordingController::new(
                Arc::clone(&session),
                device,
                facility,
                config.recording.clone(),
            )
            .with_events(recording_tx),
        );
        let pipeline = UploadPipeline::new(
            Arc::clone(&session),
            Arc::clone(&backend),
            config.upload.clone(),
        )
        .with_events(upload_tx);
        let contacts = ContactSubmitter::new(Arc::clone(&backend), store, config.contact.clone());
        let references = ReferenceCache::new(Arc::clone(&backend));

        let client = Self {
            session,
            backend,
            controller,
            pipeline,
            contacts,
            references,
            permission_watch: Mutex::new(None),
        };
        let events = SurveyEvents {
            recording: recording_rx,
            upload: upload_rx,
        };

        (client, events)
    }

    /// Fetch the item list, install it and preload reference pronunciations
    pub async fn load(&self) -> Result<usize> {
        let phonemes = self
            .backend
            .fetch_phonemes()
            .await
            .context("Failed to fetch phonemes")?;

        if phonemes.is_empty() {
            bail!("Backend returned no phonemes");
        }

        let count = phonemes.len();
        self.session.lock().await.set_phonemes(phonemes.clone());
        self.references.preload(&phonemes).await;

        self.rearm_permission_watch();

        Ok(count)
    }

    /// Replace the permission watcher. Loading again must not leave the
    /// previous one running.
    fn rearm_permission_watch(&self) {
        let watcher = self.controller.watch_permissions();
        let mut slot = self
            .permission_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, watcher) {
            previous.abort();
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn controller(&self) -> &Arc<RecordingController> {
        &self.controller
    }

    pub fn references(&self) -> &ReferenceCache {
        &self.references
    }

    pub async fn toggle_recording(&self) -> Result<ToggleOutcome, RecordingError> {
        self.controller.toggle_recording().await
    }

    pub async fn advance(&self) -> bool {
        self.session.lock().await.advance()
    }

    pub async fn retreat(&self) -> bool {
        self.session.lock().await.retreat()
    }

    /// Artifact staged for the current item, for playback
    pub async fn active_artifact(&self) -> Option<AudioArtifact> {
        self.session.lock().await.active_artifact().cloned()
    }

    pub async fn submit(&self) -> Option<UploadOutcome> {
        self.pipeline.submit().await
    }

    pub async fn submit_contact(&self, email: &str) -> Result<ContactOutcome, ContactError> {
        self.contacts.submit_contact(email).await
    }

    pub async fn submit_pending(&self) -> Result<PendingReport, ContactError> {
        self.contacts.submit_pending().await
    }

    /// Start a new pass over the same items. Refused while an upload is in
    /// flight, since that upload still belongs to the current pass.
    pub async fn restart(&self) -> Result<(), RecordingError> {
        if self.session.lock().await.is_uploading() {
            return Err(RecordingError::UploadInProgress);
        }

        self.controller.reset().await;
        self.session.lock().await.reset_for_restart()?;
        info!("Survey restarted");
        Ok(())
    }

    pub async fn stats(&self) -> SessionStats {
        self.session.lock().await.stats()
    }
}

impl Drop for SurveyClient {
    fn drop(&mut self) {
        let slot = self
            .permission_watch
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(watcher) = slot.take() {
            watcher.abort();
        }
    }
}
