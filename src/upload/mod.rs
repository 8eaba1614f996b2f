//! Batch submission of recordings: bulk, per-item fallback and retry

mod pipeline;

pub use pipeline::{
    estimate_batch_size, select_mode, UploadEvent, UploadMode, UploadOutcome, UploadPipeline,
};
