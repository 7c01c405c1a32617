use inmo_core::error::AppError;
use inmo_core::models::Agency;
use inmo_core::traits::{AdapterFactory, Fetcher};

use crate::fetcher::HttpFetcher;
use crate::tokko::TokkoAdapter;

/// Builds the site adapter matching an agency's detected system.
///
/// Only Tokko Broker sites are supported; any system label containing
/// `tokko` (case-insensitive) selects it.
#[derive(Clone)]
pub struct DefaultAdapterFactory<F = HttpFetcher> {
    fetcher: F,
}

impl<F: Fetcher> DefaultAdapterFactory<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn supports(system: &str) -> bool {
        system.to_lowercase().contains("tokko")
    }
}

impl<F: Fetcher> AdapterFactory for DefaultAdapterFactory<F> {
    type Adapter = TokkoAdapter<F>;

    fn for_agency(&self, agency: &Agency) -> Result<Self::Adapter, AppError> {
        let system = agency.system.as_deref().unwrap_or_default();
        if !Self::supports(system) {
            return Err(AppError::UnsupportedSystem(format!(
                "{} ({})",
                if system.is_empty() { "unclassified" } else { system },
                agency.name
            )));
        }
        TokkoAdapter::new(&agency.url, self.fetcher.clone())
    }
}
