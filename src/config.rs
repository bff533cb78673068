use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::constants::{
    DEFAULT_API_URL, DEFAULT_BODY_LIMIT_BYTES, DEFAULT_CACHE_TTL_MINUTES,
    DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_NAME_CHECK_DEBOUNCE_MS, DEFAULT_PORT,
    DEFAULT_UPLOAD_ATTEMPTS, MAX_CACHE_TTL_MINUTES,
};
use crate::common::error::{CatalogError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "catalog.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub notifier: NotifierConfig,
    pub client: ClientConfig,
    pub names: NamesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
        }
    }
}

/// Where uploads go. With no `upload_url` files are kept under `local_dir`
/// and served by this server at `/media`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub upload_url: Option<String>,
    pub api_key: Option<String>,
    pub local_dir: PathBuf,
    pub public_base: Option<String>,
    pub upload_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_url: None,
            api_key: None,
            local_dir: PathBuf::from("media"),
            public_base: None,
            upload_attempts: DEFAULT_UPLOAD_ATTEMPTS,
            timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS,
        }
    }
}

impl MediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token to subject, e.g. `"s3cret" = "ops@example.com"`.
    pub admin_tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub admin_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            admin_token: None,
            timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    pub debounce_ms: u64,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_NAME_CHECK_DEBOUNCE_MS,
        }
    }
}

impl NamesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CatalogError::Config(format!("{key}='{raw}' is invalid: {e}")))
}

impl Config {
    /// Read `.env`, then the TOML file if present, then `CATALOG_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CATALOG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CATALOG_PORT") {
            self.server.port = parse_env("CATALOG_PORT", &port)?;
        }
        if let Some(ttl) = lookup("CATALOG_CACHE_TTL_MINUTES") {
            self.cache.ttl_minutes = parse_env("CATALOG_CACHE_TTL_MINUTES", &ttl)?;
        }
        // comma-separated `token` or `token=subject` pairs
        if let Some(tokens) = lookup("CATALOG_ADMIN_TOKENS") {
            for entry in tokens.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let (token, subject) = entry.split_once('=').unwrap_or((entry, "admin"));
                self.auth
                    .admin_tokens
                    .insert(token.trim().to_string(), subject.trim().to_string());
            }
        }
        if let Some(url) = lookup("CATALOG_MEDIA_URL") {
            self.media.upload_url = Some(url);
        }
        if let Some(key) = lookup("CATALOG_MEDIA_API_KEY") {
            self.media.api_key = Some(key);
        }
        if let Some(url) = lookup("CATALOG_NOTIFY_WEBHOOK") {
            self.notifier.webhook_url = Some(url);
        }
        if let Some(url) = lookup("CATALOG_API_URL") {
            self.client.api_url = url;
        }
        if let Some(token) = lookup("CATALOG_ADMIN_TOKEN") {
            self.client.admin_token = Some(token);
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.cache.ttl_minutes <= 0 || self.cache.ttl_minutes > MAX_CACHE_TTL_MINUTES {
            return Err(CatalogError::Config(format!(
                "cache.ttl_minutes must be between 1 and {MAX_CACHE_TTL_MINUTES}"
            )));
        }
        if self.media.upload_attempts == 0 {
            return Err(CatalogError::Config(
                "media.upload_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL the dev media host hands out for locally stored files.
    pub fn media_public_base(&self) -> String {
        self.media.public_base.clone().unwrap_or_else(|| {
            let host = if self.server.host == "0.0.0.0" {
                "127.0.0.1"
            } else {
                self.server.host.as_str()
            };
            format!("http://{}:{}/media", host, self.server.port)
        })
    }
}
