use std::future::Future;

use crate::error::AppError;
use crate::models::{Agency, EnrichmentUpdate, Property, PropertyDetails, PropertyStub};

/// Fetches raw HTML from a URL.
///
/// Fails with [`AppError::NotFound`] when the server answers 404 or 410.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Scrapes one listing source (one CMS family).
pub trait SiteAdapter: Send + Sync {
    /// Fetch the listing summaries published on the agency's search page.
    fn search_properties(
        &self,
    ) -> impl Future<Output = Result<Vec<PropertyStub>, AppError>> + Send;

    /// Fetch the detail attributes of one listing.
    ///
    /// Fails with [`AppError::NotFound`] when the source confirms the listing
    /// is gone and [`AppError::Timeout`] when the source did not answer in time.
    fn property_details(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<PropertyDetails, AppError>> + Send;
}

/// Picks the site adapter for an agency based on its detected system.
///
/// Lets each pipeline worker build adapters lazily, per agency.
pub trait AdapterFactory: Send + Sync + Clone {
    type Adapter: SiteAdapter;

    /// Fails with [`AppError::UnsupportedSystem`] when no adapter handles the agency.
    fn for_agency(&self, agency: &Agency) -> Result<Self::Adapter, AppError>;
}

/// Which pending properties an enrichment run should pick up.
#[derive(Debug, Clone, Default)]
pub struct PendingScope {
    /// Restrict to these agencies; empty means all.
    pub agency_ids: Vec<i64>,
    pub limit: Option<usize>,
}

/// Persistence consumed by the enrichment pipeline.
pub trait EnrichmentStore: Send + Sync + Clone {
    /// Properties with status `pending`, newest first.
    fn pending_properties(
        &self,
        scope: &PendingScope,
    ) -> impl Future<Output = Result<Vec<Property>, AppError>> + Send;

    fn agency(&self, id: i64) -> impl Future<Output = Result<Option<Agency>, AppError>> + Send;

    /// Persist one successful enrichment atomically: detail columns, type,
    /// images, feature relations and the `completed` status, or nothing.
    ///
    /// Only a `pending` property is written. `Ok(false)` means it has left
    /// `pending` since it was queued and was left untouched.
    fn apply_enrichment(
        &self,
        property_id: i64,
        update: &EnrichmentUpdate,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Set status `not_available` without touching detail columns.
    /// Same `pending` guard as [`apply_enrichment`](Self::apply_enrichment).
    fn mark_not_available(
        &self,
        property_id: i64,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}
