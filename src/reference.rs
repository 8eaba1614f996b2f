// Reference pronunciation cache

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::SurveyBackend;
use crate::error::BackendError;

/// Reference recordings keyed by phoneme, fetched up front or on demand
pub struct ReferenceCache {
    backend: Arc<dyn SurveyBackend>,
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl ReferenceCache {
    pub fn new(backend: Arc<dyn SurveyBackend>) -> Self {
        Self {
            backend,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch every reference; failures are logged and skipped. Returns how many were cached.
    pub async fn preload(&self, phonemes: &[String]) -> usize {
        let mut loaded = 0;

        for phoneme in phonemes {
            match self.backend.fetch_reference_audio(phoneme).await {
                Ok(bytes) => {
                    self.entries.lock().await.insert(phoneme.clone(), bytes.into());
                    loaded += 1;
                }
                Err(e) => warn!("Failed to preload reference audio for '{}': {}", phoneme, e),
            }
        }

        info!("Preloaded {}/{} reference recordings", loaded, phonemes.len());
        loaded
    }

    pub async fn get(&self, phoneme: &str) -> Result<Arc<[u8]>, BackendError> {
        if let Some(bytes) = self.entries.lock().await.get(phoneme) {
            return Ok(Arc::clone(bytes));
        }

        let bytes: Arc<[u8]> = self.backend.fetch_reference_audio(phoneme).await?.into();
        self.entries
            .lock()
            .await
            .insert(phoneme.to_string(), Arc::clone(&bytes));

        Ok(bytes)
    }

    pub async fn is_cached(&self, phoneme: &str) -> bool {
        self.entries.lock().await.contains_key(phoneme)
    }
}
