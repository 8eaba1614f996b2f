//! Capture strategies
//!
//! Two interchangeable ways of turning a microphone stream into an
//! [`AudioArtifact`]:
//! - [`HighLevelRecorder`]: the platform's chunked recorder in a negotiated format
//! - [`RawSignalFallback`]: raw samples from the audio graph, encoded as WAV here

mod raw;
mod recorder;

pub use raw::RawSignalFallback;
pub use recorder::HighLevelRecorder;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::audio::{AudioArtifact, DeviceStream};
use crate::error::DeviceError;

/// Which capture path produced (or will produce) an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    HighLevelRecorder,
    RawSignalFallback,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::HighLevelRecorder => "high-level recorder",
            StrategyKind::RawSignalFallback => "raw signal fallback",
        }
    }
}

/// Per-attempt recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
    Complete,
}

/// Invoked once with the artifact at the end of a start/stop cycle
pub type CompletionCallback = Box<dyn FnOnce(&AudioArtifact) + Send>;

/// Shared contract of both capture paths
#[async_trait::async_trait]
pub trait CaptureStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Begin capturing from `stream`
    ///
    /// Fails with [`DeviceError::StreamInactive`] if the stream is not live.
    async fn start(&mut self, stream: &dyn DeviceStream) -> Result<(), DeviceError>;

    /// Stop capturing and release device resources.
    ///
    /// Always resolves, within the configured grace period, to an artifact
    /// that may be empty.
    async fn stop(&mut self) -> AudioArtifact;

    /// Register the completion callback for the current cycle
    fn on_complete(&mut self, callback: CompletionCallback);

    fn is_capturing(&self) -> bool;
}

/// Drains a channel into a shared buffer so whatever arrived is still
/// available if the producer never closes cleanly.
pub(crate) struct Collector<T> {
    buffer: Arc<Mutex<Vec<T>>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Collector<T> {
    pub(crate) fn spawn(mut rx: mpsc::Receiver<T>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let task = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                sink.lock().unwrap_or_else(PoisonError::into_inner).push(item);
            }
        });

        Self {
            buffer,
            task: Some(task),
        }
    }

    /// Wait up to `grace` for the channel to close, then take everything buffered
    pub(crate) async fn finish(&mut self, grace: Duration) -> Vec<T> {
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(grace, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Capture collector task failed: {}", e),
                Err(_) => {
                    warn!("Capture did not close within {:?}, keeping partial data", grace);
                    task.abort();
                }
            }
        }

        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for Collector<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
