//! Survey session state
//!
//! This module provides the `Session` store that holds:
//! - The ordered survey item list and the current position
//! - Stored per-item artifacts and the staged artifact for the current item
//! - The microphone stream handle
//! - The recording/uploading/submitted flags

mod session;
mod stats;

pub use session::{Session, SharedSession};
pub use stats::SessionStats;
