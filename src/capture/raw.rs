use std::time::Duration;
use tracing::{error, info, warn};

use super::{CaptureStrategy, Collector, CompletionCallback, StrategyKind};
use crate::audio::{wav, AudioArtifact, DeviceStream, FormatId, TapNode};
use crate::error::DeviceError;

/// Records raw samples straight from the audio graph and encodes them as
/// 16-bit mono WAV on stop. Never touches the platform recorder.
pub struct RawSignalFallback {
    sample_rate: u32,
    stop_grace: Duration,
    node: Option<Box<dyn TapNode>>,
    collector: Option<Collector<Vec<f32>>>,
    on_complete: Option<CompletionCallback>,
}

impl RawSignalFallback {
    pub fn new(sample_rate: u32, stop_grace: Duration) -> Self {
        Self {
            sample_rate,
            stop_grace,
            node: None,
            collector: None,
            on_complete: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[async_trait::async_trait]
impl CaptureStrategy for RawSignalFallback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawSignalFallback
    }

    async fn start(&mut self, stream: &dyn DeviceStream) -> Result<(), DeviceError> {
        if self.node.is_some() {
            return Err(DeviceError::AlreadyCapturing);
        }
        if !stream.is_active() || stream.track_count() == 0 {
            return Err(DeviceError::StreamInactive);
        }

        let tap = stream.open_tap(self.sample_rate)?;

        self.collector = Some(Collector::spawn(tap.samples));
        self.node = Some(tap.node);

        info!("Raw signal fallback started ({}Hz mono)", self.sample_rate);

        Ok(())
    }

    async fn stop(&mut self) -> AudioArtifact {
        if let Some(mut node) = self.node.take() {
            node.disconnect();
        }

        let buffers = match self.collector.take() {
            Some(mut collector) => collector.finish(self.stop_grace).await,
            None => {
                warn!("Raw signal fallback stopped without being started");
                Vec::new()
            }
        };

        let samples: Vec<f32> = buffers.into_iter().flatten().collect();
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

        info!(
            "Raw signal fallback stopped: {} samples, peak {:.4}",
            samples.len(),
            peak
        );

        let bytes = match wav::encode_pcm16_mono(&samples, self.sample_rate) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode WAV: {:#}", e);
                Vec::new()
            }
        };

        let artifact = AudioArtifact::new(bytes, FormatId::wav());

        if let Some(callback) = self.on_complete.take() {
            callback(&artifact);
        }

        artifact
    }

    fn on_complete(&mut self, callback: CompletionCallback) {
        self.on_complete = Some(callback);
    }

    fn is_capturing(&self) -> bool {
        self.node.is_some()
    }
}

impl Drop for RawSignalFallback {
    fn drop(&mut self) {
        if let Some(mut node) = self.node.take() {
            warn!("Raw signal fallback abandoned while capturing, disconnecting tap");
            node.disconnect();
        }
        if let Some(mut collector) = self.collector.take() {
            collector.abort();
        }
    }
}
