//! Three-stage creation flow for a catalog entity.
//!
//! Stage 1 persists the scalars and media and yields the id; stages 2 and 3
//! replace the specifications and queries lists on that id. Nothing is rolled
//! back: an entity whose later stages never succeed stays persisted as a draft.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::CatalogApiPort;
use crate::app::uniqueness::{NameGate, NameStatus};
use crate::common::error::{CatalogError, Stage, StageError};
use crate::domain::{
    validate_queries, validate_specifications, Entity, EntityId, EntityKind, EntityStatus,
    EntitySubmission, MediaInput, Query, Specification,
};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    BasicInfo,
    Specifications,
    Queries,
    Complete,
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WizardStage::BasicInfo => "basic info",
            WizardStage::Specifications => "specifications",
            WizardStage::Queries => "queries",
            WizardStage::Complete => "complete",
        };
        f.write_str(label)
    }
}

type CompletionHook = Box<dyn FnMut(&Entity) + Send>;

pub struct WizardController {
    api: Arc<dyn CatalogApiPort>,
    kind: EntityKind,
    stage: WizardStage,
    draft: EntitySubmission,
    entity_id: Option<EntityId>,
    name_gate: Option<NameGate>,
    last_error: Option<String>,
    on_complete: Option<CompletionHook>,
}

impl WizardController {
    pub fn new(api: Arc<dyn CatalogApiPort>, kind: EntityKind) -> Self {
        Self {
            api,
            kind,
            stage: WizardStage::BasicInfo,
            draft: EntitySubmission::default(),
            entity_id: None,
            name_gate: None,
            last_error: None,
            on_complete: None,
        }
    }

    /// Re-enter the wizard for a persisted draft at its first unfinished stage.
    pub fn resume(
        api: Arc<dyn CatalogApiPort>,
        entity: &Entity,
    ) -> std::result::Result<Self, CatalogError> {
        let stage = match entity.status {
            EntityStatus::Draft => WizardStage::Specifications,
            EntityStatus::Specified => WizardStage::Queries,
            EntityStatus::Complete => {
                return Err(CatalogError::InvalidTransition {
                    action: "resume",
                    stage: WizardStage::Complete.to_string(),
                })
            }
        };

        let mut wizard = Self::new(api, entity.kind);
        wizard.stage = stage;
        wizard.entity_id = Some(entity.id.clone());
        wizard.draft = EntitySubmission {
            fields: entity.fields.clone(),
            display_image: entity.display_image.clone().map(MediaInput::Url),
            additional_images: entity
                .additional_images
                .iter()
                .cloned()
                .map(MediaInput::Url)
                .collect(),
        };
        info!("Resuming {} {} at {}", entity.kind, entity.id, stage);
        Ok(wizard)
    }

    /// Status source consulted before stage 1; submission is refused unless it reads `Unique`.
    pub fn with_name_gate(mut self, gate: NameGate) -> Self {
        self.name_gate = Some(gate);
        self
    }

    pub fn on_complete(mut self, hook: impl FnMut(&Entity) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn entity_id(&self) -> Option<&EntityId> {
        self.entity_id.as_ref()
    }

    pub fn draft(&self) -> &EntitySubmission {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut EntitySubmission {
        &mut self.draft
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn submit_basic_info(&mut self) -> Result<EntityId, StageError> {
        self.expect_stage(WizardStage::BasicInfo, Stage::BasicInfo, "submit basic info")?;

        let errors = self.draft.validate();
        if !errors.is_empty() {
            return Err(self.fail(Stage::BasicInfo, CatalogError::validation(errors)));
        }
        let gate_status = self.name_gate.as_ref().map(|gate| gate.borrow().clone());
        if let Some(status) = gate_status {
            if !status.allows_submit() {
                let error = match status {
                    NameStatus::Duplicate => CatalogError::DuplicateName {
                        kind: self.kind,
                        name: self.draft.fields.name.trim().to_string(),
                    },
                    other => CatalogError::NameNotConfirmed(other.describe()),
                };
                return Err(self.fail(Stage::BasicInfo, error));
            }
        }

        match self.api.create_stage1(self.kind, &self.draft).await {
            Ok(id) => {
                self.succeed(Stage::BasicInfo, WizardStage::Specifications);
                self.entity_id = Some(id.clone());
                Ok(id)
            }
            Err(e) => Err(self.fail(Stage::BasicInfo, e)),
        }
    }

    pub async fn submit_specifications(
        &mut self,
        specifications: Vec<Specification>,
    ) -> Result<Entity, StageError> {
        let action = "submit specifications";
        self.expect_stage(WizardStage::Specifications, Stage::Specifications, action)?;
        let id = self.created_id(Stage::Specifications, action)?;

        let errors = validate_specifications(&specifications);
        if !errors.is_empty() {
            return Err(self.fail(Stage::Specifications, CatalogError::validation(errors)));
        }

        match self.api.merge_specifications(self.kind, &id, &specifications).await {
            Ok(entity) => {
                self.succeed(Stage::Specifications, WizardStage::Queries);
                Ok(entity)
            }
            Err(e) => Err(self.fail(Stage::Specifications, e)),
        }
    }

    pub async fn submit_queries(&mut self, queries: Vec<Query>) -> Result<Entity, StageError> {
        let action = "submit queries";
        self.expect_stage(WizardStage::Queries, Stage::Queries, action)?;
        let id = self.created_id(Stage::Queries, action)?;

        let errors = validate_queries(&queries);
        if !errors.is_empty() {
            return Err(self.fail(Stage::Queries, CatalogError::validation(errors)));
        }

        match self.api.merge_queries(self.kind, &id, &queries).await {
            Ok(entity) => {
                self.succeed(Stage::Queries, WizardStage::Complete);
                self.draft = EntitySubmission::default();
                info!("Completed {} '{}' ({})", self.kind, entity.fields.name, entity.id);
                if let Some(hook) = self.on_complete.as_mut() {
                    hook(&entity);
                }
                Ok(entity)
            }
            Err(e) => Err(self.fail(Stage::Queries, e)),
        }
    }

    /// Discard the draft and start over. An entity created by stage 1 stays persisted.
    pub fn reset(&mut self) {
        if let Some(id) = self.entity_id.take() {
            if self.stage != WizardStage::Complete {
                warn!("Wizard reset at {}; {} {} remains as a draft", self.stage, self.kind, id);
            }
        }
        self.stage = WizardStage::BasicInfo;
        self.draft = EntitySubmission::default();
        self.last_error = None;
    }

    /// Refuse out-of-order submissions locally, without a round-trip.
    fn expect_stage(
        &self,
        expected: WizardStage,
        stage: Stage,
        action: &'static str,
    ) -> Result<(), StageError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(self.invalid(stage, action))
        }
    }

    fn created_id(&self, stage: Stage, action: &'static str) -> Result<EntityId, StageError> {
        self.entity_id
            .clone()
            .ok_or_else(|| self.invalid(stage, action))
    }

    fn invalid(&self, stage: Stage, action: &'static str) -> StageError {
        StageError::new(
            stage,
            CatalogError::InvalidTransition {
                action,
                stage: self.stage.to_string(),
            },
        )
    }

    fn succeed(&mut self, stage: Stage, next: WizardStage) {
        metrics::stages::submitted(stage.as_str());
        self.last_error = None;
        self.stage = next;
    }

    fn fail(&mut self, stage: Stage, error: CatalogError) -> StageError {
        metrics::stages::failed(stage.as_str());
        let failure = StageError::new(stage, error);
        warn!(kind = %self.kind, "Wizard {}", failure);
        self.last_error = Some(failure.to_string());
        failure
    }
}
