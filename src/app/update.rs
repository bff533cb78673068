//! Editing and deleting existing catalog entities from the admin views.

use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::CatalogApiPort;
use crate::app::uniqueness::{NameGate, NameStatus};
use crate::common::error::{CatalogError, Stage, StageError};
use crate::domain::{
    validate_queries, validate_specifications, Entity, EntityFields, EntityId, EntityKind,
    EntitySubmission, MediaInput, Query, Specification,
};
use crate::observability::metrics;

/// Everything an admin can change on one entity, prefilled from the persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateForm {
    pub fields: EntityFields,
    pub display_image: Option<MediaInput>,
    pub additional_images: Vec<MediaInput>,
    pub specifications: Vec<Specification>,
    pub queries: Vec<Query>,
}

impl UpdateForm {
    /// Existing images come back as URLs so they pass through untouched unless replaced.
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            fields: entity.fields.clone(),
            display_image: entity.display_image.clone().map(MediaInput::Url),
            additional_images: entity
                .additional_images
                .iter()
                .cloned()
                .map(MediaInput::Url)
                .collect(),
            specifications: entity.specifications.clone(),
            queries: entity.queries.clone(),
        }
    }

    fn submission(&self) -> EntitySubmission {
        EntitySubmission {
            fields: self.fields.clone(),
            display_image: self.display_image.clone(),
            additional_images: self.additional_images.clone(),
        }
    }
}

pub struct UpdateController {
    api: Arc<dyn CatalogApiPort>,
    original: Entity,
    name_gate: Option<NameGate>,
}

impl UpdateController {
    pub fn new(api: Arc<dyn CatalogApiPort>, original: Entity) -> Self {
        Self {
            api,
            original,
            name_gate: None,
        }
    }

    pub fn with_name_gate(mut self, gate: NameGate) -> Self {
        self.name_gate = Some(gate);
        self
    }

    pub fn original(&self) -> &Entity {
        &self.original
    }

    pub fn form(&self) -> UpdateForm {
        UpdateForm::from_entity(&self.original)
    }

    /// Main record, then specifications, then queries, all on the same id.
    ///
    /// The first failure stops the sequence; whatever already succeeded stays.
    pub async fn submit(&mut self, form: UpdateForm) -> Result<Entity, StageError> {
        let kind = self.original.kind;
        let id = self.original.id.clone();

        // nothing is sent while any part of the form is invalid
        let checks = [
            (Stage::MainRecord, form.submission().validate()),
            (Stage::Specifications, validate_specifications(&form.specifications)),
            (Stage::Queries, validate_queries(&form.queries)),
        ];
        if let Some((stage, errors)) = checks.into_iter().find(|(_, errors)| !errors.is_empty()) {
            return Err(failed(stage, CatalogError::validation(errors)));
        }
        if let Some(gate) = &self.name_gate {
            let status = gate.borrow().clone();
            if !status.allows_submit() {
                let error = match status {
                    NameStatus::Duplicate => CatalogError::DuplicateName {
                        kind,
                        name: form.fields.name.trim().to_string(),
                    },
                    other => CatalogError::NameNotConfirmed(other.describe()),
                };
                return Err(failed(Stage::MainRecord, error));
            }
        }

        let updated = self
            .api
            .update_entity(kind, &id, &form.submission())
            .await
            .map_err(|e| failed(Stage::MainRecord, e))?;
        metrics::stages::submitted(Stage::MainRecord.as_str());
        self.original = updated;

        let updated = self
            .api
            .merge_specifications(kind, &id, &form.specifications)
            .await
            .map_err(|e| failed(Stage::Specifications, e))?;
        metrics::stages::submitted(Stage::Specifications.as_str());
        self.original = updated;

        let updated = self
            .api
            .merge_queries(kind, &id, &form.queries)
            .await
            .map_err(|e| failed(Stage::Queries, e))?;
        metrics::stages::submitted(Stage::Queries.as_str());
        self.original = updated.clone();

        info!("Updated {} '{}' ({})", kind, updated.fields.name, id);
        Ok(updated)
    }

    pub fn request_delete(&self) -> PendingDelete {
        PendingDelete {
            kind: self.original.kind,
            id: self.original.id.clone(),
            name: self.original.fields.name.clone(),
        }
    }
}

fn failed(stage: Stage, error: CatalogError) -> StageError {
    metrics::stages::failed(stage.as_str());
    let failure = StageError::new(stage, error);
    warn!("Update {}", failure);
    failure
}

/// A delete the admin has asked for but not yet confirmed. Nothing is sent until `confirm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    kind: EntityKind,
    id: EntityId,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(EntityId),
    /// Someone else got there first; treated as success.
    AlreadyDeleted(EntityId),
}

impl DeleteOutcome {
    pub fn id(&self) -> &EntityId {
        match self {
            DeleteOutcome::Deleted(id) | DeleteOutcome::AlreadyDeleted(id) => id,
        }
    }
}

impl PendingDelete {
    pub fn for_entity(entity: &Entity) -> Self {
        Self {
            kind: entity.kind,
            id: entity.id.clone(),
            name: entity.fields.name.clone(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Prompt text for the confirmation dialog.
    pub fn prompt(&self) -> String {
        format!("Delete {} '{}'? This cannot be undone.", self.kind, self.name)
    }

    pub async fn confirm(self, api: &dyn CatalogApiPort) -> Result<DeleteOutcome, StageError> {
        match api.delete_entity(self.kind, &self.id).await {
            Ok(id) => {
                metrics::stages::submitted(Stage::Delete.as_str());
                Ok(DeleteOutcome::Deleted(id))
            }
            Err(e) if e.is_not_found() => {
                info!("{} {} was already deleted", self.kind, self.id);
                Ok(DeleteOutcome::AlreadyDeleted(self.id))
            }
            Err(e) => Err(failed(Stage::Delete, e)),
        }
    }
}

/// Admin listing of one kind. Deletes update the local list without refetching.
pub struct AdminListView {
    api: Arc<dyn CatalogApiPort>,
    kind: EntityKind,
    items: Vec<Entity>,
}

impl AdminListView {
    pub fn new(api: Arc<dyn CatalogApiPort>, kind: EntityKind) -> Self {
        Self {
            api,
            kind,
            items: Vec::new(),
        }
    }

    pub async fn refresh(&mut self) -> crate::common::error::Result<&[Entity]> {
        self.items = self.api.list_entities(self.kind).await?;
        Ok(&self.items)
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn request_delete(&self, id: &EntityId) -> Option<PendingDelete> {
        self.items
            .iter()
            .find(|e| &e.id == id)
            .map(PendingDelete::for_entity)
    }

    pub async fn delete(&mut self, pending: PendingDelete) -> Result<DeleteOutcome, StageError> {
        let outcome = pending.confirm(self.api.as_ref()).await?;
        let id = outcome.id().clone();
        self.items.retain(|e| e.id != id);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog_service::tests::{png, service, tank_a};
    use crate::app::uniqueness::fixed_gate;
    use crate::domain::QueryType;
    use crate::app::ports::ListingPort;
    use crate::common::error::Result;
    use crate::infra::in_process::InProcessCatalog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded() -> (Arc<InProcessCatalog>, Entity) {
        let (service, _) = service();
        let service = Arc::new(service);
        let kind = EntityKind::Product;
        let id = service
            .create_stage1(kind, tank_a().with_additional_images(vec![png("side.png")]))
            .await
            .unwrap();
        service
            .merge_specifications(kind, &id, vec![Specification::new("Capacity", "500L")])
            .await
            .unwrap();
        let entity = service
            .merge_queries(kind, &id, vec![Query::new("Quantity", QueryType::Number)])
            .await
            .unwrap();
        (Arc::new(InProcessCatalog::new(service)), entity)
    }

    #[tokio::test]
    async fn update_keeps_untouched_images_and_uploads_new_ones() {
        let (api, original) = seeded().await;
        let mut controller = UpdateController::new(api.clone(), original.clone())
            .with_name_gate(fixed_gate(NameStatus::Unique));

        let mut form = controller.form();
        form.fields.description = Some("Food-grade polyethylene".to_string());
        form.additional_images.push(png("top.png"));
        form.specifications.push(Specification::new("Height", "1.2m"));

        let updated = controller.submit(form).await.unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.display_image, original.display_image);
        assert_eq!(updated.additional_images.len(), 2);
        assert_eq!(updated.additional_images[0], original.additional_images[0]);
        assert_eq!(
            updated.additional_images[1],
            "https://media.example.com/products/upload-3.png"
        );
        assert_eq!(updated.specifications.len(), 2);
        assert_eq!(controller.original(), &updated);
    }

    #[tokio::test]
    async fn keeping_the_same_name_is_not_a_duplicate() {
        let (api, original) = seeded().await;
        let mut controller = UpdateController::new(api, original.clone());

        let mut form = controller.form();
        form.fields.name = " TANK A ".to_string();

        let updated = controller.submit(form).await.unwrap();
        assert_eq!(updated.fields.name, "TANK A");
    }

    /// Delegates to the in-process catalog, counts every call and refuses query merges.
    struct QueriesOutage {
        inner: Arc<InProcessCatalog>,
        calls: AtomicUsize,
    }

    impl QueriesOutage {
        fn new(inner: Arc<InProcessCatalog>) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn count(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ListingPort for QueriesOutage {
        async fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
            self.count();
            self.inner.list_entities(kind).await
        }
    }

    #[async_trait]
    impl CatalogApiPort for QueriesOutage {
        async fn create_stage1(&self, kind: EntityKind, s: &EntitySubmission) -> Result<EntityId> {
            self.count();
            self.inner.create_stage1(kind, s).await
        }
        async fn merge_specifications(
            &self,
            kind: EntityKind,
            id: &EntityId,
            specifications: &[Specification],
        ) -> Result<Entity> {
            self.count();
            self.inner.merge_specifications(kind, id, specifications).await
        }
        async fn merge_queries(&self, _kind: EntityKind, _id: &EntityId, _q: &[Query]) -> Result<Entity> {
            self.count();
            Err(CatalogError::Storage("write conflict".to_string()))
        }
        async fn update_entity(
            &self,
            kind: EntityKind,
            id: &EntityId,
            s: &EntitySubmission,
        ) -> Result<Entity> {
            self.count();
            self.inner.update_entity(kind, id, s).await
        }
        async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId> {
            self.count();
            self.inner.delete_entity(kind, id).await
        }
        async fn get_entity(&self, kind: EntityKind, id: &EntityId) -> Result<Entity> {
            self.count();
            self.inner.get_entity(kind, id).await
        }
    }

    #[tokio::test]
    async fn failure_names_the_stage_and_keeps_earlier_writes() {
        let (inner, original) = seeded().await;
        let api = Arc::new(QueriesOutage::new(inner.clone()));
        let mut controller = UpdateController::new(api.clone(), original.clone());

        let mut form = controller.form();
        form.fields.price = Some(1200.0);
        form.specifications = vec![Specification::new("Capacity", "750L")];

        let err = controller.submit(form).await.unwrap_err();
        assert_eq!(err.stage, Stage::Queries);
        assert!(matches!(err.error, CatalogError::Storage(_)));
        assert_eq!(api.calls(), 3);

        // main record and specifications stay committed; no rollback
        let stored = inner.get_entity(original.kind, &original.id).await.unwrap();
        assert_eq!(stored.fields.price, Some(1200.0));
        assert_eq!(stored.specifications[0].value, "750L");
        assert_eq!(stored.queries, original.queries);
    }

    #[tokio::test]
    async fn invalid_lists_are_refused_before_any_request() {
        let (inner, original) = seeded().await;
        let api = Arc::new(QueriesOutage::new(inner.clone()));
        let mut controller = UpdateController::new(api.clone(), original.clone());

        let mut form = controller.form();
        form.fields.name = "Renamed Tank".to_string();
        form.specifications = Vec::new();
        form.queries = vec![Query::new("", QueryType::String)];

        let err = controller.submit(form).await.unwrap_err();
        assert_eq!(err.stage, Stage::Queries);
        match &err.error {
            CatalogError::Validation { errors } => assert_eq!(errors[0].field, "queries[0].title"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(api.calls(), 0);

        let mut form = controller.form();
        form.specifications = vec![Specification::new("Capacity", " ")];
        let err = controller.submit(form).await.unwrap_err();
        assert_eq!(err.stage, Stage::Specifications);
        assert_eq!(api.calls(), 0);

        let stored = inner.get_entity(original.kind, &original.id).await.unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn blocked_name_gate_sends_nothing() {
        let (api, original) = seeded().await;
        let mut controller = UpdateController::new(api.clone(), original.clone())
            .with_name_gate(fixed_gate(NameStatus::Duplicate));

        let mut form = controller.form();
        form.fields.name = "Tank B".to_string();

        let err = controller.submit(form).await.unwrap_err();
        assert_eq!(err.stage, Stage::MainRecord);
        assert!(matches!(err.error, CatalogError::DuplicateName { .. }));
        let stored = api.get_entity(original.kind, &original.id).await.unwrap();
        assert_eq!(stored.fields.name, "Tank A");
    }

    #[tokio::test]
    async fn delete_requires_confirmation_and_tolerates_races() {
        let (api, original) = seeded().await;
        let mut view = AdminListView::new(api.clone(), EntityKind::Product);
        view.refresh().await.unwrap();
        assert_eq!(view.items().len(), 1);

        let pending = view.request_delete(&original.id).unwrap();
        assert!(pending.prompt().contains("Tank A"));
        // not yet confirmed
        assert!(api.get_entity(original.kind, &original.id).await.is_ok());

        // a second admin deletes it first
        let racing = UpdateController::new(api.clone(), original.clone()).request_delete();
        assert_eq!(
            racing.confirm(api.as_ref()).await.unwrap(),
            DeleteOutcome::Deleted(original.id.clone())
        );

        let outcome = view.delete(pending).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyDeleted(original.id.clone()));
        assert!(view.items().is_empty());
    }
}
