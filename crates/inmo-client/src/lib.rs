pub mod classifier;
pub mod factory;
pub mod fetcher;
pub mod parse;
pub mod tokko;

pub use classifier::SystemClassifier;
pub use factory::DefaultAdapterFactory;
pub use fetcher::HttpFetcher;
pub use tokko::TokkoAdapter;
