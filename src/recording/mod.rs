//! Recording control: strategy selection, auto-stop and silent-fault recovery

mod controller;
mod timer;

pub use controller::{RecordingController, RecordingEvent, ToggleOutcome};
pub use timer::AutoStopTimer;
