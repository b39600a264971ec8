use anyhow::Result;
use davisx_core::{UploadRecord, Uploader};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Rapid-fire endpoint, used when realtime updates are enabled
pub const REALTIME_URL: &str =
    "https://rtupdate.wunderground.com/weatherstation/updateweatherstation.php";
pub const STANDARD_URL: &str =
    "https://weatherstation.wunderground.com/weatherstation/updateweatherstation.php";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Invalid upload endpoint {0}")]
    InvalidEndpoint(String),
}

/// Weather Underground personal weather station uploader
pub struct WundergroundUploader {
    client: Client,
    endpoint: Url,
}

impl WundergroundUploader {
    /// Uploader for the standard or realtime endpoint
    pub fn new(realtime: bool) -> Result<Self, UploadError> {
        Self::with_endpoint(if realtime { REALTIME_URL } else { STANDARD_URL })
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self, UploadError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| UploadError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full GET url carrying the record's parameters
    pub fn request_url(&self, record: &UploadRecord) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(record.to_params());
        url
    }

    pub async fn send(&self, record: &UploadRecord) -> Result<(), UploadError> {
        let resp = self.client.get(self.request_url(record)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }
        tracing::debug!("Upload accepted for {}", record.station_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Uploader for WundergroundUploader {
    async fn upload(&self, record: &UploadRecord) -> Result<()> {
        self.send(record).await?;
        Ok(())
    }
}
