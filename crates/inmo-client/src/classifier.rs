use inmo_core::error::AppError;
use inmo_core::fingerprint::FingerprintTable;
use inmo_core::models::UNIDENTIFIED_SYSTEM;
use inmo_core::traits::Fetcher;

/// Detects which CMS an agency site runs by fetching its home page and
/// matching it against a [`FingerprintTable`].
#[derive(Clone)]
pub struct SystemClassifier<F> {
    fetcher: F,
    table: FingerprintTable,
}

impl<F: Fetcher> SystemClassifier<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_table(fetcher, FingerprintTable::default())
    }

    pub fn with_table(fetcher: F, table: FingerprintTable) -> Self {
        Self { fetcher, table }
    }

    /// System label for the site, or [`UNIDENTIFIED_SYSTEM`] when no marker matches.
    ///
    /// Fetch failures are returned as errors so the agency can be retried later.
    pub async fn classify(&self, url: &str) -> Result<String, AppError> {
        let html = self.fetcher.fetch(url).await?;
        let system = self
            .table
            .classify(&html)
            .unwrap_or(UNIDENTIFIED_SYSTEM)
            .to_string();
        tracing::debug!(%url, %system, "Classified site");
        Ok(system)
    }
}
