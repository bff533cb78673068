use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{Entity, EntityKind};

/// A single field-level validation failure, surfaced next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("validation failed: {}", join_fields(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("a {kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("name availability not confirmed: {0}")]
    NameNotConfirmed(String),

    #[error("invalid id '{0}'")]
    InvalidId(String),

    #[error("unknown catalog kind '{0}'")]
    InvalidKind(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("upload of {field} failed: {message}")]
    Upload { field: String, message: String },

    #[error("record saved but image uploads failed for: {}", .failed.join(", "))]
    PartialUpload {
        entity: Box<Entity>,
        failed: Vec<String>,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("session is still being established")]
    SessionLoading,

    #[error("cannot {action} while the wizard is at {stage}")]
    InvalidTransition { action: &'static str, stage: String },

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        CatalogError::Validation { errors }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation { .. } => "validation",
            CatalogError::DuplicateName { .. } => "duplicate_name",
            CatalogError::NameNotConfirmed(_) => "name_not_confirmed",
            CatalogError::InvalidId(_) => "invalid_id",
            CatalogError::InvalidKind(_) => "invalid_kind",
            CatalogError::NotFound { .. } => "not_found",
            CatalogError::Upload { .. } => "upload_failed",
            CatalogError::PartialUpload { .. } => "partial_upload",
            CatalogError::Storage(_) => "storage",
            CatalogError::Notify(_) => "notify_failed",
            CatalogError::Unauthorized => "unauthorized",
            CatalogError::SessionLoading => "session_loading",
            CatalogError::InvalidTransition { .. } => "invalid_transition",
            CatalogError::BadRequest(_) => "bad_request",
            CatalogError::Api { .. } => "api",
            CatalogError::Http(_) => "http",
            CatalogError::Json(_) => "json",
            CatalogError::Toml(_) => "toml",
            CatalogError::Io(_) => "io",
            CatalogError::Config(_) => "config",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            CatalogError::Validation { errors } => errors,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// The round-trip a wizard or update submission was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BasicInfo,
    Specifications,
    Queries,
    MainRecord,
    Delete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BasicInfo => "basic_info",
            Stage::Specifications => "specifications",
            Stage::Queries => "queries",
            Stage::MainRecord => "main_record",
            Stage::Delete => "delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::BasicInfo => "basic info",
            Stage::Specifications => "specifications",
            Stage::Queries => "queries",
            Stage::MainRecord => "main record",
            Stage::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// A failure tagged with the stage that produced it, so the admin knows what to fix.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: CatalogError,
}

impl StageError {
    pub fn new(stage: Stage, error: CatalogError) -> Self {
        Self { stage, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = CatalogError::validation(vec![
            FieldError::new("name", "is required"),
            FieldError::new("group", "is required"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: name: is required; group: is required"
        );
        assert_eq!(err.code(), "validation");
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn stage_error_names_the_stage() {
        let err = StageError::new(
            Stage::Specifications,
            CatalogError::NotFound {
                kind: EntityKind::Product,
                id: "abc".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "specifications stage failed: product abc not found"
        );
        assert!(err.error.is_not_found());
    }
}
