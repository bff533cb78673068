use std::sync::Arc;
use tracing::{error, info};

use crate::app::catalog_service::CatalogService;
use crate::app::ports::NotifierPort;
use crate::common::error::{CatalogError, Result};
use crate::domain::{Enquiry, EnquiryNotification, EnquiryReceipt, EntityId, EntityKind};
use crate::observability::metrics;

/// Public enquiry and purchase-interest submissions, forwarded to the notifier.
pub struct EnquiryUseCase {
    catalog: Arc<CatalogService>,
    notifier: Arc<dyn NotifierPort>,
}

impl EnquiryUseCase {
    pub fn new(catalog: Arc<CatalogService>, notifier: Arc<dyn NotifierPort>) -> Self {
        Self { catalog, notifier }
    }

    pub async fn submit(
        &self,
        kind: EntityKind,
        id: &EntityId,
        enquiry: Enquiry,
    ) -> Result<EnquiryReceipt> {
        let entity = self.catalog.get(kind, id).await?;

        let errors = enquiry.validate_against(&entity.queries);
        if !errors.is_empty() {
            return Err(CatalogError::validation(errors));
        }

        let notification = EnquiryNotification::new(&entity, enquiry);
        if let Err(e) = self.notifier.notify(&notification).await {
            error!(reference = %notification.reference, "Enquiry notification failed: {}", e);
            return Err(CatalogError::Notify(e));
        }

        metrics::catalog::enquiry(kind.as_str());
        info!(
            reference = %notification.reference,
            "Forwarded {:?} enquiry for {} '{}'",
            notification.interest,
            kind,
            entity.fields.name
        );
        Ok(EnquiryReceipt {
            reference: notification.reference,
            entity_id: entity.id,
        })
    }
}
