use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use crate::common::error::{CatalogError, FieldError};
use crate::domain::wire::ApiErrorBody;

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::Validation { .. }
            | CatalogError::DuplicateName { .. }
            | CatalogError::NameNotConfirmed(_)
            | CatalogError::InvalidId(_)
            | CatalogError::InvalidKind(_)
            | CatalogError::BadRequest(_)
            | CatalogError::Json(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::Unauthorized => StatusCode::UNAUTHORIZED,
            CatalogError::SessionLoading => StatusCode::SERVICE_UNAVAILABLE,
            CatalogError::Api { .. } | CatalogError::Http(_) => StatusCode::BAD_GATEWAY,
            CatalogError::Upload { .. }
            | CatalogError::PartialUpload { .. }
            | CatalogError::Storage(_)
            | CatalogError::Notify(_)
            | CatalogError::InvalidTransition { .. }
            | CatalogError::Toml(_)
            | CatalogError::Io(_)
            | CatalogError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let mut body = ApiErrorBody {
            error: self.to_string(),
            kind: self.code().to_string(),
            fields: self.field_errors().to_vec(),
            failed: Vec::new(),
            entity: None,
        };
        let retry_after = matches!(self, CatalogError::SessionLoading);
        match self {
            CatalogError::Upload { field, message } => {
                body.fields = vec![FieldError::new(field, message)];
            }
            CatalogError::PartialUpload { entity, failed } => {
                body.failed = failed;
                body.entity = Some(*entity);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
