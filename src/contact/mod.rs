//! Contact identifier submission with a durable local fallback queue

mod pending;
mod submitter;

pub use pending::{JsonFileStore, MemoryStore, PendingContact, PendingStore};
pub use submitter::{is_valid_email, ContactOutcome, ContactSubmitter, PendingReport};
