use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::media::MediaUploader;
use crate::app::ports::ListingPort;
use crate::common::constants::{ADDITIONAL_IMAGES_FIELD, DISPLAY_IMAGE_FIELD};
use crate::common::error::{CatalogError, Result};
use crate::domain::{
    names_match, validate_queries, validate_specifications, Entity, EntityId, EntityKind,
    EntitySubmission, MediaInput, NewEntity, Query, Specification,
};
use crate::observability::metrics;
use crate::storage::Storage;

/// Server-side persistence contract for catalog entities: stage 1 create, the
/// two list merges, the full update, delete, and the read paths.
///
/// There is no transaction across stages. An entity created by stage 1 stays
/// persisted whatever happens to later stages.
pub struct CatalogService {
    storage: Arc<dyn Storage>,
    uploader: MediaUploader,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn Storage>, uploader: MediaUploader) -> Self {
        Self { storage, uploader }
    }

    /// Stage 1: validate, upload media, persist a draft with empty lists.
    ///
    /// Any upload that still fails after its retry aborts the stage before
    /// anything is written.
    pub async fn create_stage1(
        &self,
        kind: EntityKind,
        submission: EntitySubmission,
    ) -> Result<EntityId> {
        let errors = submission.validate();
        if !errors.is_empty() {
            return Err(CatalogError::validation(errors));
        }
        let fields = submission.fields.normalized();

        if self.name_exists(kind, &fields.name, None).await? {
            return Err(CatalogError::DuplicateName {
                kind,
                name: fields.name,
            });
        }

        let folder = kind.path_segment();
        let display_image = match &submission.display_image {
            Some(item) => self.uploader.resolve(DISPLAY_IMAGE_FIELD, item, folder).await?,
            None => return Err(CatalogError::field(DISPLAY_IMAGE_FIELD, "is required")),
        };
        let mut additional_images = Vec::with_capacity(submission.additional_images.len());
        for (index, item) in submission.additional_images.iter().enumerate() {
            let field = format!("{ADDITIONAL_IMAGES_FIELD}[{index}]");
            additional_images.push(self.uploader.resolve(&field, item, folder).await?);
        }

        let created = self
            .storage
            .create_entity(NewEntity {
                kind,
                fields,
                display_image,
                additional_images,
            })
            .await?;

        metrics::catalog::created(kind.as_str());
        info!("Stage 1 created {} '{}' with id {}", kind, created.fields.name, created.id);
        Ok(created.id)
    }

    /// Stage 2: replace the specifications list. Idempotent.
    pub async fn merge_specifications(
        &self,
        kind: EntityKind,
        id: &EntityId,
        specifications: Vec<Specification>,
    ) -> Result<Entity> {
        let errors = validate_specifications(&specifications);
        if !errors.is_empty() {
            return Err(CatalogError::validation(errors));
        }
        let updated = self
            .storage
            .set_specifications(kind, id, specifications)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        info!("Stage 2 stored {} specifications on {} {}", updated.specifications.len(), kind, id);
        Ok(updated)
    }

    /// Stage 3: replace the queries list. Idempotent.
    pub async fn merge_queries(
        &self,
        kind: EntityKind,
        id: &EntityId,
        queries: Vec<Query>,
    ) -> Result<Entity> {
        let errors = validate_queries(&queries);
        if !errors.is_empty() {
            return Err(CatalogError::validation(errors));
        }
        let updated = self
            .storage
            .set_queries(kind, id, queries)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        info!("Stage 3 stored {} queries on {} {}", updated.queries.len(), kind, id);
        Ok(updated)
    }

    /// Replace scalars and media of an existing entity, keeping its lists.
    ///
    /// Images whose upload fails twice are left unset; the rest of the record
    /// is still written and the caller gets `PartialUpload` naming them.
    pub async fn full_update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        submission: EntitySubmission,
    ) -> Result<Entity> {
        let errors = submission.validate();
        if !errors.is_empty() {
            return Err(CatalogError::validation(errors));
        }
        let existing = self.get(kind, id).await?;
        let fields = submission.fields.normalized();

        if !names_match(&existing.fields.name, &fields.name)
            && self.name_exists(kind, &fields.name, Some(id)).await?
        {
            return Err(CatalogError::DuplicateName {
                kind,
                name: fields.name,
            });
        }

        let folder = kind.path_segment();
        let mut failed = Vec::new();

        let display_image = match &submission.display_image {
            Some(item) => self
                .resolve_or_record(DISPLAY_IMAGE_FIELD, item, folder, &mut failed)
                .await,
            None => None,
        };
        let mut additional_images = Vec::with_capacity(submission.additional_images.len());
        for (index, item) in submission.additional_images.iter().enumerate() {
            let field = format!("{ADDITIONAL_IMAGES_FIELD}[{index}]");
            if let Some(url) = self.resolve_or_record(&field, item, folder, &mut failed).await {
                additional_images.push(url);
            }
        }

        let updated = Entity {
            fields,
            display_image,
            additional_images,
            updated_at: Utc::now(),
            ..existing
        };
        if !self.storage.replace_entity(&updated).await? {
            return Err(not_found(kind, id));
        }

        if !failed.is_empty() {
            warn!("Updated {} {} with failed uploads: {:?}", kind, id, failed);
            return Err(CatalogError::PartialUpload {
                entity: Box::new(updated),
                failed,
            });
        }

        info!("Updated {} '{}' ({})", kind, updated.fields.name, id);
        Ok(updated)
    }

    pub async fn delete(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId> {
        if !self.storage.delete_entity(kind, id).await? {
            return Err(not_found(kind, id));
        }
        metrics::catalog::deleted(kind.as_str());
        info!("Deleted {} {}", kind, id);
        Ok(id.clone())
    }

    /// Whether another entity of `kind` already uses `name`, ignoring `exclude`.
    pub async fn name_exists(
        &self,
        kind: EntityKind,
        name: &str,
        exclude: Option<&EntityId>,
    ) -> Result<bool> {
        let matches = self.storage.find_by_name(kind, name).await?;
        Ok(matches.iter().any(|e| Some(&e.id) != exclude))
    }

    pub async fn get(&self, kind: EntityKind, id: &EntityId) -> Result<Entity> {
        self.storage
            .get_entity(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))
    }

    pub async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.storage.list_entities(kind).await
    }

    async fn resolve_or_record(
        &self,
        field: &str,
        item: &MediaInput,
        folder: &str,
        failed: &mut Vec<String>,
    ) -> Option<String> {
        match self.uploader.resolve(field, item, folder).await {
            Ok(url) => Some(url),
            Err(_) => {
                failed.push(field.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl ListingPort for CatalogService {
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.list(kind).await
    }
}

fn not_found(kind: EntityKind, id: &EntityId) -> CatalogError {
    CatalogError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::ports::MediaHostPort;
    use crate::domain::{EntityFields, QueryType};
    use crate::storage::InMemoryStorage;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Media host that fails for payloads containing a marker byte sequence.
    pub(crate) struct TestMediaHost {
        pub uploads: AtomicU32,
    }

    impl TestMediaHost {
        pub(crate) fn new() -> Self {
            Self {
                uploads: AtomicU32::new(0),
            }
        }
    }

    // base64 of b"FAIL" marks a payload the host rejects
    const REJECTED: &str = "RkFJTA==";

    #[async_trait]
    impl MediaHostPort for TestMediaHost {
        async fn upload(&self, encoded: &str, folder: &str) -> std::result::Result<String, String> {
            if encoded.ends_with(REJECTED) {
                return Err("unsupported image".to_string());
            }
            let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://media.example.com/{folder}/upload-{n}.png"))
        }
    }

    pub(crate) fn service() -> (CatalogService, Arc<TestMediaHost>) {
        let host = Arc::new(TestMediaHost::new());
        let service = CatalogService::new(
            Arc::new(InMemoryStorage::new()),
            MediaUploader::new(host.clone()),
        );
        (service, host)
    }

    pub(crate) fn png(name: &str) -> MediaInput {
        MediaInput::file(name, "image/png", b"\x89PNG".to_vec())
    }

    fn rejected_png() -> MediaInput {
        MediaInput::file("broken.png", "image/png", b"FAIL".to_vec())
    }

    pub(crate) fn tank_a() -> EntitySubmission {
        EntitySubmission::new(EntityFields::new("Tank A", "Tank A", "Tanks"), png("tank.png"))
    }

    #[tokio::test]
    async fn stage1_uploads_media_and_returns_fresh_id() {
        let (service, host) = service();
        let submission = tank_a().with_additional_images(vec![
            png("side.png"),
            MediaInput::url("https://cdn.example.com/kept.png"),
        ]);

        let id = service.create_stage1(EntityKind::Product, submission).await.unwrap();
        let entity = service.get(EntityKind::Product, &id).await.unwrap();

        assert_eq!(host.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(
            entity.display_image.as_deref(),
            Some("https://media.example.com/products/upload-1.png")
        );
        assert_eq!(
            entity.additional_images,
            vec![
                "https://media.example.com/products/upload-2.png".to_string(),
                "https://cdn.example.com/kept.png".to_string(),
            ]
        );
        assert!(entity.specifications.is_empty());
        assert!(entity.queries.is_empty());
    }

    #[tokio::test]
    async fn stage1_rejects_duplicate_names_before_uploading() {
        let (service, host) = service();
        service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();

        let err = service
            .create_stage1(EntityKind::Product, tank_a())
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::DuplicateName { .. }));
        assert_eq!(host.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stage1_upload_failure_persists_nothing() {
        let (service, _) = service();
        let mut submission = tank_a();
        submission.display_image = Some(rejected_png());

        let err = service
            .create_stage1(EntityKind::Product, submission)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Upload { ref field, .. } if field == "displayImage"));
        assert!(service.list(EntityKind::Product).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merging_the_same_specifications_twice_is_idempotent() {
        let (service, _) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();
        let specs = vec![Specification::new("Capacity", "500L")];

        service
            .merge_specifications(EntityKind::Product, &id, specs.clone())
            .await
            .unwrap();
        let again = service
            .merge_specifications(EntityKind::Product, &id, specs.clone())
            .await
            .unwrap();

        assert_eq!(again.specifications, specs);
        assert_eq!(
            service.get(EntityKind::Product, &id).await.unwrap().specifications,
            specs
        );
    }

    #[tokio::test]
    async fn failed_stage2_leaves_a_retrievable_draft() {
        let (service, _) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();

        let err = service
            .merge_specifications(
                EntityKind::Product,
                &id,
                vec![Specification::new("Capacity", "")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));

        let draft = service.get(EntityKind::Product, &id).await.unwrap();
        assert_eq!(draft.fields.name, "Tank A");
        assert_eq!(draft.fields.group, "Tanks");
        assert!(draft.specifications.is_empty());
        assert!(draft.is_draft());
    }

    #[tokio::test]
    async fn merges_on_missing_entities_are_not_found() {
        let (service, _) = service();
        let id = EntityId::generate();
        let err = service
            .merge_queries(
                EntityKind::Service,
                &id,
                vec![Query::new("Hours", QueryType::Number)],
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn full_update_mixes_new_files_and_passthrough_urls() {
        let (service, host) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();
        let before = service.get(EntityKind::Product, &id).await.unwrap();
        service
            .merge_specifications(
                EntityKind::Product,
                &id,
                vec![Specification::new("Capacity", "500L")],
            )
            .await
            .unwrap();

        let mut submission = tank_a();
        submission.display_image = before.display_image.clone().map(MediaInput::Url);
        submission.additional_images = vec![
            png("new.png"),
            MediaInput::url("https://cdn.example.com/unchanged.png"),
        ];
        submission.fields.description = Some("Now in blue".to_string());

        let updated = service
            .full_update(EntityKind::Product, &id, submission)
            .await
            .unwrap();

        assert_eq!(host.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(updated.additional_images.len(), 2);
        assert_eq!(
            updated.additional_images[0],
            "https://media.example.com/products/upload-2.png"
        );
        assert_eq!(updated.additional_images[1], "https://cdn.example.com/unchanged.png");
        assert_eq!(updated.display_image, before.display_image);
        assert_eq!(updated.specifications.len(), 1);
        assert_eq!(updated.id, id);
    }

    #[tokio::test]
    async fn full_update_with_failed_upload_saves_the_rest() {
        let (service, _) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();

        let mut submission = tank_a();
        submission.display_image = Some(rejected_png());
        submission.fields.price = Some(1200.0);

        let err = service
            .full_update(EntityKind::Product, &id, submission)
            .await
            .unwrap_err();

        match err {
            CatalogError::PartialUpload { entity, failed } => {
                assert_eq!(failed, vec!["displayImage".to_string()]);
                assert_eq!(entity.display_image, None);
            }
            other => panic!("unexpected error: {other}"),
        }
        let stored = service.get(EntityKind::Product, &id).await.unwrap();
        assert_eq!(stored.fields.price, Some(1200.0));
        assert_eq!(stored.display_image, None);
    }

    #[tokio::test]
    async fn name_checks_exclude_the_entity_itself() {
        let (service, _) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();

        assert!(service
            .name_exists(EntityKind::Product, "tank a", None)
            .await
            .unwrap());
        assert!(!service
            .name_exists(EntityKind::Product, "Tank A", Some(&id))
            .await
            .unwrap());
        assert!(!service
            .name_exists(EntityKind::Service, "Tank A", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_then_delete_again_is_not_found() {
        let (service, _) = service();
        let id = service.create_stage1(EntityKind::Product, tank_a()).await.unwrap();

        assert_eq!(service.delete(EntityKind::Product, &id).await.unwrap(), id);
        assert!(service
            .delete(EntityKind::Product, &id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
