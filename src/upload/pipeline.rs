use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::backend::{BulkResponse, SurveyBackend, UploadItem};
use crate::config::UploadConfig;
use crate::error::BackendError;
use crate::session::SharedSession;

/// How a batch is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// One multipart request carrying every item
    Bulk,
    /// One request per item, with retry
    Sequential,
}

/// Terminal result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { uploaded: usize },
    /// `succeeded + failed` equals the batch size
    PartialFailure { succeeded: usize, failed: usize },
    Failure { reason: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

/// Progress notifications for the UI glue
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    ModeSelected { mode: UploadMode, estimated_bytes: u64 },
    DowngradedToSequential { reason: String },
    Retrying { phoneme: String, attempt: u32 },
    ItemUploaded { phoneme: String, done: usize, total: usize },
    ItemFailed { phoneme: String, error: String },
    Finished(UploadOutcome),
}

/// Estimated serialized size: artifact bytes plus fixed per-item framing
pub fn estimate_batch_size(items: &[UploadItem], per_item_overhead: u64) -> u64 {
    items
        .iter()
        .map(|item| item.artifact.len() as u64 + per_item_overhead)
        .sum()
}

/// Sequential on mobile device classes once the batch exceeds their threshold
pub fn select_mode(estimated_bytes: u64, config: &UploadConfig) -> UploadMode {
    match config.bulk_threshold() {
        Some(threshold) if estimated_bytes > threshold => UploadMode::Sequential,
        _ => UploadMode::Bulk,
    }
}

enum AttemptResult {
    Finished(UploadOutcome),
    /// Network failure; the next mode in the plan should take over
    Downgrade(String),
}

/// Sends the session's recordings to the backend, at most one submission at a time.
///
/// Strategies are tried in order (bulk, then sequential) with a uniform
/// attempt contract; only a network failure moves on to the next one.
pub struct UploadPipeline {
    session: SharedSession,
    backend: Arc<dyn SurveyBackend>,
    config: UploadConfig,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl UploadPipeline {
    pub fn new(session: SharedSession, backend: Arc<dyn SurveyBackend>, config: UploadConfig) -> Self {
        Self {
            session,
            backend,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Submit every stored recording.
    ///
    /// Returns `None` without doing anything if a submission is already in
    /// flight, the batch was already submitted, or a recording is running.
    pub async fn submit(&self) -> Option<UploadOutcome> {
        let (items, expected, pass_id) = {
            let mut session = self.session.lock().await;
            if !session.begin_upload() {
                info!("Submit ignored: upload in progress, already submitted, or recording");
                return None;
            }

            let items: Vec<UploadItem> = session
                .upload_batch()
                .into_iter()
                .map(|(phoneme, artifact)| UploadItem::new(phoneme, artifact))
                .collect();

            info!(
                "Session {}: submitting {} recordings",
                session.session_id(),
                items.len()
            );
            (
                items,
                session.phonemes().len(),
                session.session_id().to_string(),
            )
        };

        if items.len() != expected {
            warn!(
                "Submitting {} of {} items; batch is incomplete",
                items.len(),
                expected
            );
        }

        let outcome = self.run(&items).await;

        self.session
            .lock()
            .await
            .finish_upload(&pass_id, outcome.is_success());

        match &outcome {
            UploadOutcome::Success { uploaded } => {
                info!("Upload complete ({}/{})", uploaded, uploaded)
            }
            UploadOutcome::PartialFailure { succeeded, failed } => warn!(
                "Upload partially failed: {} succeeded, {} failed",
                succeeded, failed
            ),
            UploadOutcome::Failure { reason } => error!("Upload failed: {}", reason),
        }
        self.emit(UploadEvent::Finished(outcome.clone()));

        Some(outcome)
    }

    async fn run(&self, items: &[UploadItem]) -> UploadOutcome {
        if items.is_empty() {
            return UploadOutcome::Failure {
                reason: "No recordings to upload".to_string(),
            };
        }

        let estimated_bytes = estimate_batch_size(items, self.config.per_item_overhead_bytes);
        let mode = select_mode(estimated_bytes, &self.config);

        info!(
            "Upload mode {:?} ({} items, ~{} bytes, {:?})",
            mode,
            items.len(),
            estimated_bytes,
            self.config.device_class
        );
        self.emit(UploadEvent::ModeSelected {
            mode,
            estimated_bytes,
        });

        let plan: &[UploadMode] = match mode {
            UploadMode::Bulk => &[UploadMode::Bulk, UploadMode::Sequential],
            UploadMode::Sequential => &[UploadMode::Sequential],
        };

        let mut last_reason = String::new();
        for mode in plan {
            match self.attempt(*mode, items).await {
                AttemptResult::Finished(outcome) => return outcome,
                AttemptResult::Downgrade(reason) => {
                    warn!("{:?} upload hit a network error ({}), retrying sequentially", mode, reason);
                    self.emit(UploadEvent::DowngradedToSequential {
                        reason: reason.clone(),
                    });
                    last_reason = reason;
                }
            }
        }

        UploadOutcome::Failure {
            reason: last_reason,
        }
    }

    async fn attempt(&self, mode: UploadMode, items: &[UploadItem]) -> AttemptResult {
        match mode {
            UploadMode::Bulk => self.attempt_bulk(items).await,
            UploadMode::Sequential => AttemptResult::Finished(self.attempt_sequential(items).await),
        }
    }

    async fn attempt_bulk(&self, items: &[UploadItem]) -> AttemptResult {
        let total = items.len();
        let timeout = self.config.bulk_timeout();

        let result = match tokio::time::timeout(timeout, self.backend.upload_bulk(items)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout)),
        };

        match result {
            Ok(BulkResponse::Stored) => {
                for (done, item) in items.iter().enumerate() {
                    self.emit(UploadEvent::ItemUploaded {
                        phoneme: item.phoneme.clone(),
                        done: done + 1,
                        total,
                    });
                }
                AttemptResult::Finished(UploadOutcome::Success { uploaded: total })
            }
            Ok(BulkResponse::Partial(report)) => {
                let failed = match report {
                    Some(report) => items
                        .iter()
                        .filter(|item| report.rejected.contains(&item.phoneme))
                        .count(),
                    None => total,
                };

                if failed == 0 {
                    AttemptResult::Finished(UploadOutcome::Success { uploaded: total })
                } else {
                    AttemptResult::Finished(UploadOutcome::PartialFailure {
                        succeeded: total - failed,
                        failed,
                    })
                }
            }
            Err(e) if e.is_network() => AttemptResult::Downgrade(e.to_string()),
            Err(e) => AttemptResult::Finished(UploadOutcome::Failure {
                reason: e.to_string(),
            }),
        }
    }

    async fn attempt_sequential(&self, items: &[UploadItem]) -> UploadOutcome {
        let total = items.len();
        let mut succeeded = 0;
        let mut failed = 0;

        for (index, item) in items.iter().enumerate() {
            match self.upload_with_retry(item).await {
                Ok(()) => {
                    succeeded += 1;
                    self.emit(UploadEvent::ItemUploaded {
                        phoneme: item.phoneme.clone(),
                        done: succeeded,
                        total,
                    });
                }
                Err(e) => {
                    failed += 1;
                    error!("Giving up on '{}': {}", item.phoneme, e);
                    self.emit(UploadEvent::ItemFailed {
                        phoneme: item.phoneme.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.config.inter_item_delay()).await;
            }
        }

        if failed == 0 {
            UploadOutcome::Success {
                uploaded: succeeded,
            }
        } else {
            UploadOutcome::PartialFailure { succeeded, failed }
        }
    }

    async fn upload_with_retry(&self, item: &UploadItem) -> Result<(), BackendError> {
        let max_attempts = self.config.max_attempts.max(1);
        let timeout = self.config.item_timeout();
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(timeout, self.backend.upload_one(item)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(timeout)),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Upload of '{}' failed (attempt {}/{}): {}",
                        item.phoneme, attempt, max_attempts, e
                    );
                    attempt += 1;
                    self.emit(UploadEvent::Retrying {
                        phoneme: item.phoneme.clone(),
                        attempt,
                    });
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
