use async_trait::async_trait;
use std::sync::Arc;

use crate::app::catalog_service::CatalogService;
use crate::app::ports::{CatalogApiPort, ListingPort, NameCheckPort};
use crate::common::error::Result;
use crate::domain::{Entity, EntityId, EntityKind, EntitySubmission, Query, Specification};

/// Catalog port served directly by a `CatalogService`, for the CLI's local mode
/// and for driving the controllers without a network hop.
#[derive(Clone)]
pub struct InProcessCatalog {
    service: Arc<CatalogService>,
}

impl InProcessCatalog {
    pub fn new(service: Arc<CatalogService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ListingPort for InProcessCatalog {
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.service.list(kind).await
    }
}

#[async_trait]
impl NameCheckPort for InProcessCatalog {
    async fn name_exists(
        &self,
        kind: EntityKind,
        name: &str,
        exclude: Option<&EntityId>,
    ) -> Result<bool> {
        self.service.name_exists(kind, name, exclude).await
    }
}

#[async_trait]
impl CatalogApiPort for InProcessCatalog {
    async fn create_stage1(
        &self,
        kind: EntityKind,
        submission: &EntitySubmission,
    ) -> Result<EntityId> {
        self.service.create_stage1(kind, submission.clone()).await
    }

    async fn merge_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: &[Specification],
    ) -> Result<Entity> {
        self.service
            .merge_specifications(kind, id, specifications.to_vec())
            .await
    }

    async fn merge_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: &[Query],
    ) -> Result<Entity> {
        self.service.merge_queries(kind, id, queries.to_vec()).await
    }

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &EntityId,
        submission: &EntitySubmission,
    ) -> Result<Entity> {
        self.service.full_update(kind, id, submission.clone()).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId> {
        self.service.delete(kind, id).await
    }

    async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Entity> {
        self.service.get(kind, id).await
    }
}
