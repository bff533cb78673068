use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::error::{CatalogError, FieldError, Result};

pub mod enquiry;
pub mod wire;

pub use enquiry::{Enquiry, EnquiryNotification, EnquiryReceipt, Interest, QueryAnswer};

/// The two catalog variants. Names are unique within a kind, not across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Service,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Product, EntityKind::Service];

    /// Path segment used on the wire and as the listing cache key.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Service => "services",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Service => "service",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "products" | "product" => Ok(EntityKind::Product),
            "services" | "service" => Ok(EntityKind::Service),
            other => Err(CatalogError::InvalidKind(other.to_string())),
        }
    }
}

/// Opaque document id: 4 bytes of creation seconds followed by 8 random bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp() as u32;
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        rand::thread_rng().fill(&mut bytes[4..]);
        Self(hex::encode(bytes))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.len() == 24 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(CatalogError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub title: String,
    pub value: String,
}

impl Specification {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Number,
    String,
}

/// A piece of information an interested visitor must supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub title: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
}

impl Query {
    pub fn new(title: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            title: title.into(),
            query_type,
        }
    }
}

/// Long-form markdown block, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSection {
    pub title: String,
    pub content: String,
}

/// Scalar fields shared by stage 1 and the full update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFields {
    pub name: String,
    pub display_title: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(default)]
    pub custom_sections: Vec<CustomSection>,
}

impl EntityFields {
    pub fn new(
        name: impl Into<String>,
        display_title: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_title: display_title.into(),
            group: group.into(),
            ..Default::default()
        }
    }

    /// Trim required fields and collapse blank optional ones to `None`.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.name = self.name.trim().to_string();
        self.display_title = self.display_title.trim().to_string();
        self.group = self.group.trim().to_string();
        self.price_label = blank_to_none(self.price_label);
        self.description = blank_to_none(self.description);
        self.applications = blank_to_none(self.applications);
        self.seo_keywords = blank_to_none(self.seo_keywords);
        self.video = blank_to_none(self.video);
        self.pdf = blank_to_none(self.pdf);
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("name", &self.name),
            ("displayTitle", &self.display_title),
            ("group", &self.group),
        ] {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, "is required"));
            }
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                errors.push(FieldError::new("price", "must be a non-negative number"));
            }
        }
        for (field, value) in [("video", &self.video), ("pdf", &self.pdf)] {
            if let Some(url) = value {
                if !is_http_url(url) {
                    errors.push(FieldError::new(field, "must be an absolute http(s) URL"));
                }
            }
        }
        for (index, section) in self.custom_sections.iter().enumerate() {
            if section.title.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("customSections[{index}].title"),
                    "is required",
                ));
            }
        }
        errors
    }
}

/// A newly chosen file or an already-hosted image passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    File(MediaFile),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaInput {
    pub fn file(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        MediaInput::File(MediaFile {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        })
    }

    pub fn url(url: impl Into<String>) -> Self {
        MediaInput::Url(url.into())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, MediaInput::File(_))
    }
}

/// Scalars plus media, as sent by stage 1 and by the full update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySubmission {
    pub fields: EntityFields,
    pub display_image: Option<MediaInput>,
    pub additional_images: Vec<MediaInput>,
}

impl EntitySubmission {
    pub fn new(fields: EntityFields, display_image: MediaInput) -> Self {
        Self {
            fields,
            display_image: Some(display_image),
            additional_images: Vec::new(),
        }
    }

    pub fn with_additional_images(mut self, images: Vec<MediaInput>) -> Self {
        self.additional_images = images;
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = self.fields.validate();
        match &self.display_image {
            None => errors.push(FieldError::new("displayImage", "is required")),
            Some(MediaInput::Url(url)) if !is_http_url(url) => errors.push(FieldError::new(
                "displayImage",
                "must be an uploaded file or an absolute http(s) URL",
            )),
            Some(MediaInput::File(file)) if file.bytes.is_empty() => {
                errors.push(FieldError::new("displayImage", "file is empty"))
            }
            _ => {}
        }
        for (index, item) in self.additional_images.iter().enumerate() {
            match item {
                MediaInput::Url(url) if !is_http_url(url) => errors.push(FieldError::new(
                    format!("additionalImages[{index}]"),
                    "must be an uploaded file or an absolute http(s) URL",
                )),
                MediaInput::File(file) if file.bytes.is_empty() => errors.push(FieldError::new(
                    format!("additionalImages[{index}]"),
                    "file is empty",
                )),
                _ => {}
            }
        }
        errors
    }
}

/// How far the create wizard has committed. Stage 2 and stage 3 may commit empty lists,
/// so progress is recorded rather than inferred from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Draft,
    Specified,
    Complete,
}

/// A Product or Service catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(flatten)]
    pub fields: EntityFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_image: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    /// Persisted but not yet through stages 2 and 3. A valid, queryable state.
    pub fn is_draft(&self) -> bool {
        self.status != EntityStatus::Complete
    }

    pub fn slug(&self) -> String {
        slugify(&self.fields.name)
    }
}

/// Everything the store needs to create an entity; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
    pub kind: EntityKind,
    pub fields: EntityFields,
    pub display_image: String,
    pub additional_images: Vec<String>,
}

pub fn validate_specifications(specifications: &[Specification]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (index, spec) in specifications.iter().enumerate() {
        if spec.title.trim().is_empty() {
            errors.push(FieldError::new(
                format!("specifications[{index}].title"),
                "is required",
            ));
        }
        if spec.value.trim().is_empty() {
            errors.push(FieldError::new(
                format!("specifications[{index}].value"),
                "is required",
            ));
        }
    }
    errors
}

pub fn validate_queries(queries: &[Query]) -> Vec<FieldError> {
    queries
        .iter()
        .enumerate()
        .filter(|(_, query)| query.title.trim().is_empty())
        .map(|(index, _)| FieldError::new(format!("queries[{index}].title"), "is required"))
        .collect()
}

/// Case-insensitive, whitespace-tolerant name comparison used for uniqueness.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

pub fn slugify(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    NON_ALNUM.replace_all(&lower, "-").trim_matches('-').to_string()
}

pub fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}
