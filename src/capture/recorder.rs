use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{CaptureStrategy, Collector, CompletionCallback, StrategyKind};
use crate::audio::{AudioArtifact, DeviceStream, FormatId, RecorderControl, RecorderFacility};
use crate::error::DeviceError;

/// Records through the platform's chunked recorder.
///
/// Slices arrive every `timeslice` so a recording that never reaches a clean
/// stop still leaves its data behind; on stop they are concatenated in
/// arrival order into one artifact tagged with the negotiated format.
pub struct HighLevelRecorder {
    facility: Arc<dyn RecorderFacility>,
    format: FormatId,
    timeslice: Duration,
    stop_grace: Duration,
    control: Option<Box<dyn RecorderControl>>,
    collector: Option<Collector<Vec<u8>>>,
    on_complete: Option<CompletionCallback>,
}

impl HighLevelRecorder {
    pub fn new(
        facility: Arc<dyn RecorderFacility>,
        format: FormatId,
        timeslice: Duration,
        stop_grace: Duration,
    ) -> Self {
        Self {
            facility,
            format,
            timeslice,
            stop_grace,
            control: None,
            collector: None,
            on_complete: None,
        }
    }

    pub fn format(&self) -> &FormatId {
        &self.format
    }
}

#[async_trait::async_trait]
impl CaptureStrategy for HighLevelRecorder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HighLevelRecorder
    }

    async fn start(&mut self, stream: &dyn DeviceStream) -> Result<(), DeviceError> {
        if self.control.is_some() {
            return Err(DeviceError::AlreadyCapturing);
        }
        if !stream.is_active() || stream.track_count() == 0 {
            return Err(DeviceError::StreamInactive);
        }

        let feed = self.facility.open(stream, &self.format, self.timeslice)?;

        self.collector = Some(Collector::spawn(feed.chunks));
        self.control = Some(feed.control);

        info!(
            "High-level recorder started ({}, {:?} slices)",
            self.format, self.timeslice
        );

        Ok(())
    }

    async fn stop(&mut self) -> AudioArtifact {
        if let Some(mut control) = self.control.take() {
            control.stop();
        }

        let chunks = match self.collector.take() {
            Some(mut collector) => collector.finish(self.stop_grace).await,
            None => {
                warn!("High-level recorder stopped without being started");
                Vec::new()
            }
        };

        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        let artifact = AudioArtifact::new(chunks.concat(), self.format.clone());

        info!(
            "High-level recorder stopped: {} chunks {:?}, {} bytes",
            sizes.len(),
            sizes,
            artifact.len()
        );

        if let Some(callback) = self.on_complete.take() {
            callback(&artifact);
        }

        artifact
    }

    fn on_complete(&mut self, callback: CompletionCallback) {
        self.on_complete = Some(callback);
    }

    fn is_capturing(&self) -> bool {
        self.control.is_some()
    }
}

impl Drop for HighLevelRecorder {
    fn drop(&mut self) {
        if let Some(mut control) = self.control.take() {
            warn!("High-level recorder abandoned while capturing, stopping platform recorder");
            control.stop();
        }
        if let Some(mut collector) = self.collector.take() {
            collector.abort();
        }
    }
}
