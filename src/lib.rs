pub mod audio;
pub mod backend;
pub mod capture;
pub mod config;
pub mod contact;
pub mod error;
pub mod recording;
pub mod reference;
pub mod session;
pub mod survey;
pub mod upload;

pub use audio::{
    validate_artifact, ArtifactCheck, AudioArtifact, AudioFile, DeviceCapture, DeviceStream,
    FormatId, FormatProbe, RecorderFacility,
};
pub use backend::{HttpBackend, SurveyBackend};
pub use capture::{CapturePhase, CaptureStrategy, HighLevelRecorder, RawSignalFallback, StrategyKind};
pub use config::Config;
pub use contact::{ContactOutcome, ContactSubmitter, JsonFileStore, PendingStore};
pub use error::{BackendError, ContactError, DeviceError, RecordingError, StorageError};
pub use recording::{RecordingController, RecordingEvent, ToggleOutcome};
pub use reference::ReferenceCache;
pub use session::{Session, SessionStats, SharedSession};
pub use survey::{SurveyClient, SurveyEvents};
pub use upload::{UploadEvent, UploadMode, UploadOutcome, UploadPipeline};
