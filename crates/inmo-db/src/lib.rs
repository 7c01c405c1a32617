pub mod agency_repository;
pub mod config;
pub mod database;
pub mod error;
pub mod feature_repository;
pub mod list_repository;
pub mod note_repository;
pub mod property_repository;
pub mod property_type_repository;
pub mod rating_repository;
pub mod store;

pub use agency_repository::AgencyRepository;
pub use config::DatabaseConfig;
pub use database::Database;
pub use feature_repository::FeatureRepository;
pub use list_repository::ListRepository;
pub use note_repository::NoteRepository;
pub use property_repository::PropertyRepository;
pub use property_type_repository::PropertyTypeRepository;
pub use rating_repository::RatingRepository;
