use crate::common::error::Result;
use crate::domain::{Entity, EntityId, EntityKind, NewEntity, Query, Specification};
use async_trait::async_trait;

/// Document store for catalog entities, partitioned by kind.
///
/// Implementations enforce case-insensitive name uniqueness per kind on
/// `create_entity` and `replace_entity`, and never change an entity's id.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new entity, assigning its id and timestamps.
    async fn create_entity(&self, entity: NewEntity) -> Result<Entity>;
    async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Option<Entity>>;
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    /// Entities of `kind` whose name matches `name`, ignoring case and surrounding whitespace.
    async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Vec<Entity>>;

    /// Overwrite the stored record. Returns false when the id is unknown.
    async fn replace_entity(&self, entity: &Entity) -> Result<bool>;

    // Sub-list merges touch nothing but the named list and `updated_at`
    async fn set_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: Vec<Specification>,
    ) -> Result<Option<Entity>>;
    async fn set_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: Vec<Query>,
    ) -> Result<Option<Entity>>;

    /// Hard delete. Returns false when the id is unknown.
    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<bool>;
}
