//! Decoding of the multipart body used by stage 1 and the full update.
//!
//! A media part that carries a filename is a newly chosen file; a plain text
//! part under the same name is an already-hosted URL passed through as is.

use axum::extract::multipart::{Field, Multipart};
use tracing::debug;

use crate::common::constants::{ADDITIONAL_IMAGES_FIELD, CUSTOM_SECTIONS_FIELD, DISPLAY_IMAGE_FIELD};
use crate::common::error::{CatalogError, FieldError, Result};
use crate::domain::{CustomSection, EntitySubmission, MediaInput};

fn malformed(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::BadRequest(format!("invalid multipart body: {e}"))
}

async fn read_media(field: Field<'_>) -> Result<Option<MediaInput>> {
    match field.file_name().map(str::to_string) {
        Some(file_name) => {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(malformed)?;
            // an untouched file input arrives as an unnamed, empty part
            if file_name.is_empty() && bytes.is_empty() {
                return Ok(None);
            }
            Ok(Some(MediaInput::file(file_name, content_type, bytes.to_vec())))
        }
        None => {
            let url = field.text().await.map_err(malformed)?;
            let url = url.trim();
            Ok((!url.is_empty()).then(|| MediaInput::url(url)))
        }
    }
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub async fn read_submission(mut multipart: Multipart) -> Result<EntitySubmission> {
    let mut submission = EntitySubmission::default();
    let mut errors = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            DISPLAY_IMAGE_FIELD => submission.display_image = read_media(field).await?,
            ADDITIONAL_IMAGES_FIELD => {
                if let Some(item) = read_media(field).await? {
                    submission.additional_images.push(item);
                }
            }
            _ => {
                let value = field.text().await.map_err(malformed)?;
                let fields = &mut submission.fields;
                match name.as_str() {
                    "name" => fields.name = value,
                    "displayTitle" => fields.display_title = value,
                    "group" => fields.group = value,
                    "price" => match optional(value) {
                        None => fields.price = None,
                        Some(raw) => match raw.parse::<f64>() {
                            Ok(price) => fields.price = Some(price),
                            Err(_) => errors.push(FieldError::new("price", "must be a number")),
                        },
                    },
                    "priceLabel" => fields.price_label = optional(value),
                    "description" => fields.description = optional(value),
                    "applications" => fields.applications = optional(value),
                    "seoKeywords" => fields.seo_keywords = optional(value),
                    "video" => fields.video = optional(value),
                    "pdf" => fields.pdf = optional(value),
                    CUSTOM_SECTIONS_FIELD => match optional(value) {
                        None => fields.custom_sections = Vec::new(),
                        Some(raw) => match serde_json::from_str::<Vec<CustomSection>>(&raw) {
                            Ok(sections) => fields.custom_sections = sections,
                            Err(e) => errors.push(FieldError::new(
                                CUSTOM_SECTIONS_FIELD,
                                format!("must be a JSON array of sections: {e}"),
                            )),
                        },
                    },
                    other => debug!(field = other, "Ignoring unknown multipart field"),
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(submission)
    } else {
        Err(CatalogError::validation(errors))
    }
}
