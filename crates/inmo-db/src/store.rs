use inmo_core::error::AppError;
use inmo_core::models::{Agency, EnrichmentUpdate, Property};
use inmo_core::traits::{EnrichmentStore, PendingScope};

use crate::database::Database;
use crate::error::map_db_err;
use crate::feature_repository::reconcile_in_tx;
use crate::property_repository::update_details_in_tx;
use crate::property_type_repository::resolve_in_tx;

impl EnrichmentStore for Database {
    async fn pending_properties(&self, scope: &PendingScope) -> Result<Vec<Property>, AppError> {
        self.property_repo().pending(scope).await
    }

    async fn agency(&self, id: i64) -> Result<Option<Agency>, AppError> {
        self.agency_repo().get(id).await
    }

    async fn apply_enrichment(
        &self,
        property_id: i64,
        update: &EnrichmentUpdate,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool().begin().await.map_err(map_db_err)?;

        let property_type_id = match &update.property_type {
            Some(canonical) => Some(resolve_in_tx(&mut tx, canonical).await?),
            None => None,
        };
        if !update_details_in_tx(&mut tx, property_id, property_type_id, &update.details).await? {
            // Dropping the transaction rolls back any type created above.
            tracing::debug!(property_id, "Property not pending, enrichment discarded");
            return Ok(false);
        }
        reconcile_in_tx(&mut tx, property_id, &update.details.features).await?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(true)
    }

    async fn mark_not_available(&self, property_id: i64) -> Result<bool, AppError> {
        self.property_repo().mark_not_available(property_id).await
    }
}
