use async_trait::async_trait;

use crate::common::error::Result;
use crate::domain::{
    Entity, EntityId, EntityKind, EntitySubmission, EnquiryNotification, Query, Specification,
};

// Collaborator ports: the media host, notifier and session provider live
// outside this system and report failures as plain messages.

#[async_trait]
pub trait MediaHostPort: Send + Sync {
    /// Upload a base64 data URI into `folder`, returning a durable URL.
    async fn upload(&self, encoded: &str, folder: &str) -> std::result::Result<String, String>;
}

#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn notify(&self, notification: &EnquiryNotification) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated { subject: String },
    Unauthenticated,
    Loading,
}

#[async_trait]
pub trait SessionPort: Send + Sync {
    async fn session(&self, bearer_token: Option<&str>) -> SessionState;
}

// Catalog ports: the wire contract as seen by the admin controllers and the
// storefront. Implemented over HTTP and in-process.

#[async_trait]
pub trait NameCheckPort: Send + Sync {
    async fn name_exists(
        &self,
        kind: EntityKind,
        name: &str,
        exclude: Option<&EntityId>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ListingPort: Send + Sync {
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>>;
}

#[async_trait]
pub trait CatalogApiPort: ListingPort {
    async fn create_stage1(&self, kind: EntityKind, submission: &EntitySubmission)
        -> Result<EntityId>;
    async fn merge_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: &[Specification],
    ) -> Result<Entity>;
    async fn merge_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: &[Query],
    ) -> Result<Entity>;
    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &EntityId,
        submission: &EntitySubmission,
    ) -> Result<Entity>;
    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId>;
    async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Entity>;
}
