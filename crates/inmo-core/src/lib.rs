pub mod dedup;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod models;
pub mod pipeline;
pub mod property_type;
pub mod retry;
pub mod traits;
pub mod writer;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::AppError;
pub use filter::{CompiledFilter, FilterValue, PropertyFilter, PropertyView};
pub use fingerprint::FingerprintTable;
pub use models::{
    Agency, Currency, EnrichmentUpdate, Feature, FeatureMap, ListValue, NewAgency, Property,
    PropertyDetails, PropertyNote, PropertyRating, PropertyStatus, PropertyStub, PropertyType,
    RatingValue,
};
pub use pipeline::{
    EnrichmentOutcome, EnrichmentPipeline, EnrichmentReporter, PipelineConfig, RunSummary,
    TracingEnrichmentReporter,
};
pub use property_type::{CanonicalType, normalize_property_type};
pub use retry::RetryPolicy;
pub use traits::{AdapterFactory, EnrichmentStore, Fetcher, PendingScope, SiteAdapter};
