pub mod artifact;
pub mod device;
pub mod file;
pub mod format;
pub mod wav;

pub use artifact::{validate_artifact, ArtifactCheck, AudioArtifact};
pub use device::{
    ChunkFeed, DeviceCapture, DeviceStream, PermissionState, RecorderControl, RecorderFacility,
    SignalTap, StreamConstraints, TapNode,
};
pub use file::AudioFile;
pub use format::{select_format, FormatId, FormatProbe, DEFAULT_FORMAT_CANDIDATES};
