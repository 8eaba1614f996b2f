pub mod client;
pub mod messages;

pub use client::{HttpBackend, SurveyBackend};
pub use messages::{
    BulkResponse, BulkUploadReport, ContactRequest, ContactResponse, ErrorBody, UploadItem,
};
