use super::traits::Storage;
use crate::common::error::{CatalogError, Result};
use crate::domain::{
    names_match, Entity, EntityId, EntityKind, EntityStatus, NewEntity, Query, Specification,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Collection = HashMap<EntityId, Entity>;

/// In-memory document store used by the server and by tests
pub struct InMemoryStorage {
    collections: Arc<RwLock<HashMap<EntityKind, Collection>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn name_taken(collection: &Collection, name: &str, exclude: Option<&EntityId>) -> bool {
    collection
        .values()
        .any(|e| Some(&e.id) != exclude && names_match(&e.fields.name, name))
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_entity(&self, entity: NewEntity) -> Result<Entity> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(entity.kind).or_default();

        if name_taken(collection, &entity.fields.name, None) {
            return Err(CatalogError::DuplicateName {
                kind: entity.kind,
                name: entity.fields.name,
            });
        }

        let mut id = EntityId::generate();
        while collection.contains_key(&id) {
            id = EntityId::generate();
        }

        let now = Utc::now();
        let created = Entity {
            id: id.clone(),
            kind: entity.kind,
            fields: entity.fields,
            display_image: Some(entity.display_image),
            additional_images: entity.additional_images,
            specifications: Vec::new(),
            queries: Vec::new(),
            status: EntityStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        collection.insert(id.clone(), created.clone());

        debug!("Created {}: {} with id {}", created.kind, created.fields.name, id);
        Ok(created)
    }

    async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Option<Entity>> {
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).and_then(|c| c.get(id)).cloned())
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let collections = self.collections.read().await;
        let mut entities: Vec<Entity> = collections
            .get(&kind)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();

        // Oldest first, id as a tie-breaker so listings are stable
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entities)
    }

    async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Vec<Entity>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&kind)
            .map(|c| {
                c.values()
                    .filter(|e| names_match(&e.fields.name, name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace_entity(&self, entity: &Entity) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(&entity.kind) else {
            return Ok(false);
        };
        if !collection.contains_key(&entity.id) {
            return Ok(false);
        }
        if name_taken(collection, &entity.fields.name, Some(&entity.id)) {
            return Err(CatalogError::DuplicateName {
                kind: entity.kind,
                name: entity.fields.name.clone(),
            });
        }

        collection.insert(entity.id.clone(), entity.clone());

        debug!("Replaced {}: {} with id {}", entity.kind, entity.fields.name, entity.id);
        Ok(true)
    }

    async fn set_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: Vec<Specification>,
    ) -> Result<Option<Entity>> {
        let mut collections = self.collections.write().await;
        let Some(entity) = collections.get_mut(&kind).and_then(|c| c.get_mut(id)) else {
            return Ok(None);
        };
        entity.specifications = specifications;
        entity.status = entity.status.max(EntityStatus::Specified);
        entity.updated_at = Utc::now();

        debug!("Set {} specifications on {} {}", entity.specifications.len(), kind, id);
        Ok(Some(entity.clone()))
    }

    async fn set_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: Vec<Query>,
    ) -> Result<Option<Entity>> {
        let mut collections = self.collections.write().await;
        let Some(entity) = collections.get_mut(&kind).and_then(|c| c.get_mut(id)) else {
            return Ok(None);
        };
        entity.queries = queries;
        entity.status = EntityStatus::Complete;
        entity.updated_at = Utc::now();

        debug!("Set {} queries on {} {}", entity.queries.len(), kind, id);
        Ok(Some(entity.clone()))
    }

    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(&kind)
            .and_then(|c| c.remove(id))
            .is_some();
        if removed {
            debug!("Deleted {} {}", kind, id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityFields, QueryType};

    fn new_entity(kind: EntityKind, name: &str) -> NewEntity {
        NewEntity {
            kind,
            fields: EntityFields::new(name, name, "Tanks"),
            display_image: "https://cdn.example.com/a.png".to_string(),
            additional_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_starts_as_draft() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create_entity(new_entity(EntityKind::Product, "Tank A"))
            .await
            .unwrap();

        assert_eq!(created.id.as_str().len(), 24);
        assert!(created.is_draft());
        let fetched = storage
            .get_entity(EntityKind::Product, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn names_are_unique_per_kind_ignoring_case() {
        let storage = InMemoryStorage::new();
        storage
            .create_entity(new_entity(EntityKind::Product, "Tank A"))
            .await
            .unwrap();

        let dup = storage
            .create_entity(new_entity(EntityKind::Product, "tank a "))
            .await;
        assert!(matches!(dup, Err(CatalogError::DuplicateName { .. })));

        // Same name under the other kind is fine
        storage
            .create_entity(new_entity(EntityKind::Service, "Tank A"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_specifications_is_idempotent_and_leaves_other_fields() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create_entity(new_entity(EntityKind::Product, "Tank A"))
            .await
            .unwrap();
        let specs = vec![Specification::new("Capacity", "500L")];

        let first = storage
            .set_specifications(EntityKind::Product, &created.id, specs.clone())
            .await
            .unwrap()
            .unwrap();
        let second = storage
            .set_specifications(EntityKind::Product, &created.id, specs.clone())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.specifications, specs);
        assert_eq!(second.specifications, specs);
        assert_eq!(second.fields, created.fields);
        assert_eq!(second.id, created.id);
        assert!(second.queries.is_empty());
    }

    #[tokio::test]
    async fn status_follows_committed_stages_not_list_contents() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create_entity(new_entity(EntityKind::Service, "Install"))
            .await
            .unwrap();
        assert_eq!(created.status, EntityStatus::Draft);

        let specified = storage
            .set_specifications(EntityKind::Service, &created.id, Vec::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(specified.status, EntityStatus::Specified);

        let complete = storage
            .set_queries(EntityKind::Service, &created.id, Vec::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(complete.status, EntityStatus::Complete);
        assert!(!complete.is_draft());

        // editing specifications later does not reopen the wizard
        let edited = storage
            .set_specifications(
                EntityKind::Service,
                &created.id,
                vec![Specification::new("Duration", "2h")],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.status, EntityStatus::Complete);
    }

    #[tokio::test]
    async fn merges_on_unknown_ids_return_none() {
        let storage = InMemoryStorage::new();
        let id = EntityId::generate();
        let result = storage
            .set_queries(
                EntityKind::Service,
                &id,
                vec![Query::new("Hours", QueryType::Number)],
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!storage.delete_entity(EntityKind::Service, &id).await.unwrap());
    }

    #[tokio::test]
    async fn replace_rejects_taking_another_entitys_name() {
        let storage = InMemoryStorage::new();
        storage
            .create_entity(new_entity(EntityKind::Product, "Tank A"))
            .await
            .unwrap();
        let mut b = storage
            .create_entity(new_entity(EntityKind::Product, "Tank B"))
            .await
            .unwrap();

        b.fields.name = "TANK A".to_string();
        let result = storage.replace_entity(&b).await;
        assert!(matches!(result, Err(CatalogError::DuplicateName { .. })));

        // Renaming to its own name in another case is allowed
        b.fields.name = "tank b".to_string();
        assert!(storage.replace_entity(&b).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_entity_from_listing() {
        let storage = InMemoryStorage::new();
        let a = storage
            .create_entity(new_entity(EntityKind::Product, "Tank A"))
            .await
            .unwrap();
        storage
            .create_entity(new_entity(EntityKind::Product, "Tank B"))
            .await
            .unwrap();

        assert!(storage.delete_entity(EntityKind::Product, &a.id).await.unwrap());
        let remaining = storage.list_entities(EntityKind::Product).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].fields.name, "Tank B");
    }
}
