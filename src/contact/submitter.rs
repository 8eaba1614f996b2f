use std::sync::Arc;
use tracing::{error, info, warn};

use super::pending::{PendingContact, PendingStore};
use crate::backend::{ContactResponse, SurveyBackend};
use crate::config::ContactConfig;
use crate::error::{BackendError, ContactError};

/// What happened to a submitted contact identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Registered,
    AlreadyRegistered,
    /// Server unreachable after every attempt; kept locally for later
    Queued,
}

/// Result of flushing the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingReport {
    pub resubmitted: usize,
    pub remaining: usize,
}

/// Submits the participant's email with bounded retry and local durability
pub struct ContactSubmitter {
    backend: Arc<dyn SurveyBackend>,
    store: Arc<dyn PendingStore>,
    config: ContactConfig,
}

impl ContactSubmitter {
    pub fn new(
        backend: Arc<dyn SurveyBackend>,
        store: Arc<dyn PendingStore>,
        config: ContactConfig,
    ) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    pub async fn submit_contact(&self, email: &str) -> Result<ContactOutcome, ContactError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ContactError::Invalid(email.to_string()));
        }

        match self.register_with_retry(email).await {
            Ok(ContactResponse::Registered) => {
                info!("Contact registered");
                Ok(ContactOutcome::Registered)
            }
            Ok(ContactResponse::Duplicate) => {
                info!("Contact was already registered");
                Ok(ContactOutcome::AlreadyRegistered)
            }
            Err(e) if e.is_network() => {
                warn!("Contact submission failed after retries ({}), queueing locally", e);
                self.store.append(PendingContact::new(email))?;
                Ok(ContactOutcome::Queued)
            }
            Err(e) => {
                error!("Contact rejected: {}", e);
                Err(ContactError::Rejected(rejection_message(&e)))
            }
        }
    }

    /// Try every queued identifier once; entries leave the queue only when
    /// the server accepts them (or already has them)
    pub async fn submit_pending(&self) -> Result<PendingReport, ContactError> {
        let records = self.store.list()?;
        let mut report = PendingReport::default();

        if records.is_empty() {
            return Ok(report);
        }

        info!("Resubmitting {} pending contacts", records.len());

        for record in records {
            match self.backend.register_contact(&record.identifier).await {
                Ok(_) => {
                    self.store.remove(&record)?;
                    report.resubmitted += 1;
                }
                Err(e) => {
                    warn!("Pending contact from {} still not accepted: {}", record.timestamp, e);
                    report.remaining += 1;
                }
            }
        }

        info!(
            "Pending contacts: {} resubmitted, {} remaining",
            report.resubmitted, report.remaining
        );

        Ok(report)
    }

    pub fn pending(&self) -> Result<Vec<PendingContact>, ContactError> {
        Ok(self.store.list()?)
    }

    async fn register_with_retry(&self, email: &str) -> Result<ContactResponse, BackendError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.backend.register_contact(email).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_network() && attempt < max_attempts => {
                    warn!(
                        "Contact submission failed (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn rejection_message(err: &BackendError) -> String {
    match err {
        BackendError::Status {
            detail: Some(detail),
            ..
        } => detail.clone(),
        other => other.to_string(),
    }
}
