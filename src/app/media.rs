use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::ports::MediaHostPort;
use crate::common::constants::DEFAULT_UPLOAD_ATTEMPTS;
use crate::common::error::{CatalogError, Result};
use crate::domain::{MediaFile, MediaInput};
use crate::observability::metrics;

/// Resolves media inputs to durable URLs, uploading files through the media host.
#[derive(Clone)]
pub struct MediaUploader {
    host: Arc<dyn MediaHostPort>,
    attempts: u32,
}

impl MediaUploader {
    pub fn new(host: Arc<dyn MediaHostPort>) -> Self {
        Self {
            host,
            attempts: DEFAULT_UPLOAD_ATTEMPTS,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Transport-safe form handed to the media host: a base64 data URI.
    pub fn encode(file: &MediaFile) -> String {
        format!(
            "data:{};base64,{}",
            file.content_type,
            STANDARD.encode(&file.bytes)
        )
    }

    pub async fn upload(&self, field: &str, file: &MediaFile, folder: &str) -> Result<String> {
        let encoded = Self::encode(file);
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.host.upload(&encoded, folder).await {
                Ok(url) => {
                    debug!(field, file = %file.file_name, %url, "Uploaded media");
                    metrics::media::uploaded(folder);
                    return Ok(url);
                }
                Err(e) => {
                    warn!(field, file = %file.file_name, attempt, "Media upload failed: {}", e);
                    last_error = e;
                    if attempt < self.attempts {
                        metrics::media::retried();
                    }
                }
            }
        }

        metrics::media::failed();
        Err(CatalogError::Upload {
            field: field.to_string(),
            message: last_error,
        })
    }

    /// URLs pass through untouched; files are uploaded.
    pub async fn resolve(&self, field: &str, item: &MediaInput, folder: &str) -> Result<String> {
        match item {
            MediaInput::Url(url) => Ok(url.trim().to_string()),
            MediaInput::File(file) => self.upload(field, file, folder).await,
        }
    }
}
