use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use crate::app::storefront::Listing;
use crate::common::error::{CatalogError, Result};
use crate::domain::wire::{
    CreatedResponse, DeletedResponse, HealthResponse, NameCheckParams, NameCheckResponse,
    QueriesBody, SpecificationsBody, StorefrontPage,
};
use crate::domain::{Enquiry, EnquiryReceipt, Entity, EntityId, EntityKind};
use crate::observability::metrics;
use crate::server::multipart::read_submission;
use crate::server::AppState;

fn kind_and_id(kind: &str, id: &str) -> Result<(EntityKind, EntityId)> {
    Ok((kind.parse()?, EntityId::parse(id)?))
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| CatalogError::BadRequest(e.body_text()))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn metrics_text() -> Response {
    match metrics::render() {
        Some(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

pub async fn create_step1(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let kind: EntityKind = kind.parse()?;
    let submission = read_submission(multipart).await?;
    let id = state.catalog.create_stage1(kind, submission).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn merge_specifications(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: std::result::Result<Json<SpecificationsBody>, JsonRejection>,
) -> Result<Json<Entity>> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    let body = json_body(body)?;
    let entity = state
        .catalog
        .merge_specifications(kind, &id, body.specifications)
        .await?;
    Ok(Json(entity))
}

pub async fn merge_queries(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: std::result::Result<Json<QueriesBody>, JsonRejection>,
) -> Result<Json<Entity>> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    let body = json_body(body)?;
    let entity = state.catalog.merge_queries(kind, &id, body.queries).await?;
    Ok(Json(entity))
}

pub async fn update_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<Entity>> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    let submission = read_submission(multipart).await?;
    let entity = state.catalog.full_update(kind, &id, submission).await?;
    Ok(Json(entity))
}

pub async fn delete_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<DeletedResponse>> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    let id = state.catalog.delete(kind, &id).await?;
    Ok(Json(DeletedResponse {
        message: format!("{kind} deleted"),
        id,
    }))
}

pub async fn check_name(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    params: std::result::Result<Query<NameCheckParams>, QueryRejection>,
) -> Result<Json<NameCheckResponse>> {
    let kind: EntityKind = kind.parse()?;
    let Query(params) = params.map_err(|e| CatalogError::BadRequest(e.body_text()))?;
    let exclude = match params.exclude_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(EntityId::parse(raw)?),
        _ => None,
    };
    let exists = state
        .catalog
        .name_exists(kind, params.name.trim(), exclude.as_ref())
        .await?;
    debug!(%kind, name = %params.name, exists, "Name check");
    Ok(Json(NameCheckResponse { exists }))
}

pub async fn list_entities(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Entity>>> {
    let kind: EntityKind = kind.parse()?;
    Ok(Json(state.catalog.list(kind).await?))
}

pub async fn get_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Entity>> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    Ok(Json(state.catalog.get(kind, &id).await?))
}

pub async fn submit_enquiry(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: std::result::Result<Json<Enquiry>, JsonRejection>,
) -> Result<(StatusCode, Json<EnquiryReceipt>)> {
    let (kind, id) = kind_and_id(&kind, &id)?;
    let enquiry = json_body(body)?;
    let receipt = state.enquiries.submit(kind, &id, enquiry).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn storefront_listing(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<StorefrontPage>> {
    let kind: EntityKind = kind.parse()?;
    let page = match state.storefront.listing(kind).await {
        Listing::Ready(items) => StorefrontPage {
            items: items.as_ref().clone(),
            unavailable: None,
        },
        Listing::Unavailable(message) => StorefrontPage {
            items: Vec::new(),
            unavailable: Some(message),
        },
    };
    Ok(Json(page))
}

pub async fn storefront_detail(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
) -> Result<Json<Entity>> {
    let kind: EntityKind = kind.parse()?;
    Ok(Json(state.storefront.detail(kind, &slug).await?))
}
