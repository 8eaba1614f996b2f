use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::format::{FormatId, FormatProbe};
use crate::error::DeviceError;

/// Constraints passed when requesting a microphone stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Audio only; video is never requested
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self { audio: true }
    }
}

/// Microphone permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
}

/// Platform microphone access
///
/// Implementations:
/// - Browser: `getUserMedia` plus the Permissions API
/// - Tests: in-memory fakes feeding canned chunks/samples
#[async_trait::async_trait]
pub trait DeviceCapture: Send + Sync {
    /// Request a live microphone stream, prompting for permission if needed
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn DeviceStream>, DeviceError>;

    /// Push channel of permission changes, if the platform exposes one
    fn permission_changes(&self) -> Option<watch::Receiver<PermissionState>> {
        None
    }
}

/// A live microphone stream
pub trait DeviceStream: Send + Sync {
    /// Whether the stream is active and its audio track has not ended
    fn is_active(&self) -> bool;

    /// Number of live audio tracks
    fn track_count(&self) -> usize;

    /// Open a raw sample tap at a fixed sample rate (mono f32)
    fn open_tap(&self, sample_rate: u32) -> Result<SignalTap, DeviceError>;

    /// Stop every track; the stream is unusable afterwards
    fn stop_tracks(&mut self);
}

/// Raw sample feed: one array per processing callback
pub struct SignalTap {
    pub samples: mpsc::Receiver<Vec<f32>>,
    pub node: Box<dyn TapNode>,
}

/// Processing-graph node behind a [`SignalTap`]
pub trait TapNode: Send {
    /// Disconnect the node and close its audio context. Closes the sample channel.
    fn disconnect(&mut self);
}

/// Platform chunked recorder (MediaRecorder in browsers)
pub trait RecorderFacility: FormatProbe + Send + Sync {
    /// Start recording `stream` in `format`, delivering a slice every `timeslice`
    fn open(
        &self,
        stream: &dyn DeviceStream,
        format: &FormatId,
        timeslice: Duration,
    ) -> Result<ChunkFeed, DeviceError>;
}

/// Encoded chunks in arrival order
pub struct ChunkFeed {
    pub chunks: mpsc::Receiver<Vec<u8>>,
    pub control: Box<dyn RecorderControl>,
}

/// Control handle for a running platform recorder
pub trait RecorderControl: Send {
    /// Ask the recorder to flush its last slice and close the chunk channel
    fn stop(&mut self);
}
