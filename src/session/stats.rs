use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a survey session, for the UI glue and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Correlation id, regenerated on restart
    pub session_id: String,

    /// When this pass started
    pub started_at: DateTime<Utc>,

    /// Seconds since `started_at`
    pub duration_secs: f64,

    /// Number of survey items
    pub total_items: usize,

    /// Index of the item on screen
    pub current_index: usize,

    /// Items with a stored artifact
    pub recorded_items: usize,

    /// Sum of stored artifact sizes
    pub recorded_bytes: u64,

    pub is_recording: bool,
    pub is_uploading: bool,
    pub has_submitted: bool,
}

impl SessionStats {
    /// Completed fraction in [0, 1]
    pub fn progress(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.recorded_items as f64 / self.total_items as f64
        }
    }
}
