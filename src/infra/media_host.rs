use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::MediaHostPort;

#[derive(Serialize)]
struct UploadRequest<'a> {
    file: &'a str,
    folder: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(alias = "secure_url")]
    url: String,
}

/// Remote media host taking a base64 data URI and answering with the durable URL.
pub struct HttpMediaHost {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMediaHost {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl MediaHostPort for HttpMediaHost {
    async fn upload(&self, encoded: &str, folder: &str) -> Result<String, String> {
        let mut request = self.client.post(&self.endpoint).json(&UploadRequest {
            file: encoded,
            folder,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("media host returned {}: {}", status.as_u16(), text));
        }
        let body: UploadResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.url)
    }
}

/// Local stand-in for the media host: writes files under `root` and serves them
/// from `public_base` (the server mounts `root` at `/media`).
pub struct DevMediaHost {
    root: PathBuf,
    public_base: String,
}

impl DevMediaHost {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Split `data:<type>;base64,<payload>` into content type and bytes.
fn decode_data_uri(encoded: &str) -> Result<(String, Vec<u8>), String> {
    let rest = encoded
        .strip_prefix("data:")
        .ok_or_else(|| "payload is not a data URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| "data URI is not base64".to_string())?;
    let bytes = STANDARD.decode(payload).map_err(|e| e.to_string())?;
    Ok((content_type.to_string(), bytes))
}

#[async_trait]
impl MediaHostPort for DevMediaHost {
    async fn upload(&self, encoded: &str, folder: &str) -> Result<String, String> {
        let (content_type, bytes) = decode_data_uri(encoded)?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&content_type));
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| e.to_string())?;
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(|e| e.to_string())?;
        debug!(folder, %file_name, size = bytes.len(), "Stored media locally");
        Ok(format!("{}/{}/{}", self.public_base, folder, file_name))
    }
}
