use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::app::ports::{CatalogApiPort, ListingPort, NameCheckPort};
use crate::common::constants::{ADDITIONAL_IMAGES_FIELD, CUSTOM_SECTIONS_FIELD, DISPLAY_IMAGE_FIELD};
use crate::common::error::{CatalogError, Result};
use crate::domain::wire::{
    ApiErrorBody, CreatedResponse, DeletedResponse, NameCheckResponse, QueriesBody,
    SpecificationsBody,
};
use crate::domain::{Entity, EntityId, EntityKind, EntitySubmission, MediaInput, Query, Specification};

/// Catalog API client used by the admin controllers and the CLI.
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    admin_token: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token: None,
        })
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    fn url(&self, kind: EntityKind, rest: &str) -> String {
        if rest.is_empty() {
            format!("{}/{}", self.base_url, kind.path_segment())
        } else {
            format!("{}/{}/{}", self.base_url, kind.path_segment(), rest)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: EntityKind,
        subject: &str,
    ) -> Result<T> {
        let response = self.authorize(request).send().await?;
        decode(response, kind, subject).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, kind: EntityKind, subject: &str) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await?;
    debug!(status = status.as_u16(), "Catalog API error: {}", text);
    Err(match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => error_from_body(status.as_u16(), body, kind, subject),
        Err(_) => CatalogError::Api {
            status: status.as_u16(),
            message: text,
        },
    })
}

/// Rebuild the typed error the server reported, so callers can match on it.
fn error_from_body(status: u16, body: ApiErrorBody, kind: EntityKind, subject: &str) -> CatalogError {
    match body.kind.as_str() {
        "validation" => CatalogError::Validation {
            errors: body.fields,
        },
        "duplicate_name" => CatalogError::DuplicateName {
            kind,
            name: subject.to_string(),
        },
        "not_found" => CatalogError::NotFound {
            kind,
            id: subject.to_string(),
        },
        "invalid_id" => CatalogError::InvalidId(subject.to_string()),
        "unauthorized" => CatalogError::Unauthorized,
        "session_loading" => CatalogError::SessionLoading,
        "upload_failed" => match body.fields.into_iter().next() {
            Some(field) => CatalogError::Upload {
                field: field.field,
                message: field.message,
            },
            None => CatalogError::Api {
                status,
                message: body.error,
            },
        },
        "partial_upload" => match body.entity {
            Some(entity) => CatalogError::PartialUpload {
                entity: Box::new(entity),
                failed: body.failed,
            },
            None => CatalogError::Api {
                status,
                message: body.error,
            },
        },
        _ => CatalogError::Api {
            status,
            message: body.error,
        },
    }
}

fn media_part(item: &MediaInput) -> Result<Part> {
    match item {
        MediaInput::File(file) => Ok(Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?),
        MediaInput::Url(url) => Ok(Part::text(url.clone())),
    }
}

/// Multipart body shared by stage 1 and the full update.
fn submission_form(submission: &EntitySubmission) -> Result<Form> {
    let fields = &submission.fields;
    let mut form = Form::new()
        .text("name", fields.name.clone())
        .text("displayTitle", fields.display_title.clone())
        .text("group", fields.group.clone());

    let optional = [
        ("priceLabel", &fields.price_label),
        ("description", &fields.description),
        ("applications", &fields.applications),
        ("seoKeywords", &fields.seo_keywords),
        ("video", &fields.video),
        ("pdf", &fields.pdf),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            form = form.text(name, value.clone());
        }
    }
    if let Some(price) = fields.price {
        form = form.text("price", price.to_string());
    }
    if !fields.custom_sections.is_empty() {
        form = form.text(
            CUSTOM_SECTIONS_FIELD,
            serde_json::to_string(&fields.custom_sections)?,
        );
    }

    if let Some(display) = &submission.display_image {
        form = form.part(DISPLAY_IMAGE_FIELD, media_part(display)?);
    }
    for item in &submission.additional_images {
        form = form.part(ADDITIONAL_IMAGES_FIELD, media_part(item)?);
    }
    Ok(form)
}

#[async_trait]
impl ListingPort for HttpCatalogClient {
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.send(self.client.get(self.url(kind, "")), kind, kind.path_segment())
            .await
    }
}

#[async_trait]
impl NameCheckPort for HttpCatalogClient {
    async fn name_exists(
        &self,
        kind: EntityKind,
        name: &str,
        exclude: Option<&EntityId>,
    ) -> Result<bool> {
        let mut query = vec![("name", name.to_string())];
        if let Some(id) = exclude {
            query.push(("excludeId", id.to_string()));
        }
        let request = self.client.get(self.url(kind, "check-name")).query(&query);
        let response: NameCheckResponse = self.send(request, kind, name).await?;
        Ok(response.exists)
    }
}

#[async_trait]
impl CatalogApiPort for HttpCatalogClient {
    async fn create_stage1(
        &self,
        kind: EntityKind,
        submission: &EntitySubmission,
    ) -> Result<EntityId> {
        let request = self
            .client
            .post(self.url(kind, "step1"))
            .multipart(submission_form(submission)?);
        let created: CreatedResponse = self
            .send(request, kind, submission.fields.name.trim())
            .await?;
        Ok(created.id)
    }

    async fn merge_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: &[Specification],
    ) -> Result<Entity> {
        let body = SpecificationsBody {
            specifications: specifications.to_vec(),
        };
        let request = self
            .client
            .put(self.url(kind, &format!("step2/{id}")))
            .json(&body);
        self.send(request, kind, id.as_str()).await
    }

    async fn merge_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: &[Query],
    ) -> Result<Entity> {
        let body = QueriesBody {
            queries: queries.to_vec(),
        };
        let request = self
            .client
            .put(self.url(kind, &format!("step3/{id}")))
            .json(&body);
        self.send(request, kind, id.as_str()).await
    }

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &EntityId,
        submission: &EntitySubmission,
    ) -> Result<Entity> {
        let request = self
            .client
            .put(self.url(kind, id.as_str()))
            .multipart(submission_form(submission)?);
        self.send(request, kind, id.as_str()).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId> {
        let request = self.client.delete(self.url(kind, id.as_str()));
        let deleted: DeletedResponse = self.send(request, kind, id.as_str()).await?;
        Ok(deleted.id)
    }

    async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Entity> {
        self.send(self.client.get(self.url(kind, id.as_str())), kind, id.as_str())
            .await
    }
}
