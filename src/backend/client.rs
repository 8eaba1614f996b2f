use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, warn};

use super::messages::{
    BulkResponse, BulkUploadReport, ContactRequest, ContactResponse, ErrorBody, UploadItem,
};
use crate::config::BackendConfig;
use crate::error::BackendError;

/// REST surface of the survey backend
#[async_trait::async_trait]
pub trait SurveyBackend: Send + Sync {
    /// `GET /phonemes`
    async fn fetch_phonemes(&self) -> Result<Vec<String>, BackendError>;

    /// Reference pronunciation for one item (`<phoneme>.mp3`)
    async fn fetch_reference_audio(&self, phoneme: &str) -> Result<Vec<u8>, BackendError>;

    /// `POST /upload` with one artifact
    async fn upload_one(&self, item: &UploadItem) -> Result<(), BackendError>;

    /// `POST /upload_bulk` with every artifact
    async fn upload_bulk(&self, items: &[UploadItem]) -> Result<BulkResponse, BackendError>;

    /// `POST /users`
    async fn register_contact(&self, email: &str) -> Result<ContactResponse, BackendError>;
}

/// [`SurveyBackend`] over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
    reference_audio_path: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        info!("Survey backend at {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            reference_audio_path: config.reference_audio_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl SurveyBackend for HttpBackend {
    async fn fetch_phonemes(&self) -> Result<Vec<String>, BackendError> {
        let response = self.client.get(self.url("/phonemes")).send().await?;
        let response = ensure_success(response).await?;

        let phonemes: Vec<String> = response.json().await?;
        info!("Fetched {} phonemes", phonemes.len());

        Ok(phonemes)
    }

    async fn fetch_reference_audio(&self, phoneme: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(self.url(&self.reference_audio_path))
            .query(&[("file_name", format!("{}.mp3", phoneme))])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let bytes = response.bytes().await?;
        debug!("Fetched reference audio for '{}' ({} bytes)", phoneme, bytes.len());

        Ok(bytes.to_vec())
    }

    async fn upload_one(&self, item: &UploadItem) -> Result<(), BackendError> {
        let form = Form::new()
            .part("audio", artifact_part(item))
            .text("phoneme", item.phoneme.clone());

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        ensure_success(response).await?;

        debug!("Uploaded '{}' ({} bytes)", item.phoneme, item.artifact.len());

        Ok(())
    }

    async fn upload_bulk(&self, items: &[UploadItem]) -> Result<BulkResponse, BackendError> {
        let mut form = Form::new();
        for item in items {
            form = form
                .part("audios[]", artifact_part(item))
                .text("phonemes[]", item.phoneme.clone());
        }

        let response = self
            .client
            .post(self.url("/upload_bulk"))
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(BulkResponse::Stored),
            StatusCode::MULTI_STATUS => {
                let report = match response.json::<BulkUploadReport>().await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        warn!("Unreadable partial upload report: {}", e);
                        None
                    }
                };
                Ok(BulkResponse::Partial(report))
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn register_contact(&self, email: &str) -> Result<ContactResponse, BackendError> {
        let response = self
            .client
            .post(self.url("/users"))
            .json(&ContactRequest {
                email: email.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(ContactResponse::Registered);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        if status.is_client_error() && body.is_duplicate() {
            return Ok(ContactResponse::Duplicate);
        }

        Err(BackendError::Status {
            status: status.as_u16(),
            detail: body.detail_text(),
        })
    }
}

fn artifact_part(item: &UploadItem) -> Part {
    let bytes = item.artifact.bytes().to_vec();
    let mime = item.artifact.format().container().to_string();

    match Part::bytes(bytes.clone())
        .file_name(item.file_name.clone())
        .mime_str(&mime)
    {
        Ok(part) => part,
        Err(e) => {
            warn!("Invalid MIME type '{}' for upload: {}", mime, e);
            Part::bytes(bytes).file_name(item.file_name.clone())
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.detail_text())
        .or_else(|| (!text.is_empty()).then_some(text));

    BackendError::Status { status, detail }
}
