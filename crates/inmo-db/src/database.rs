use std::str::FromStr;
use std::time::Duration;

use inmo_core::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::agency_repository::AgencyRepository;
use crate::config::DatabaseConfig;
use crate::feature_repository::FeatureRepository;
use crate::list_repository::ListRepository;
use crate::note_repository::NoteRepository;
use crate::property_repository::PropertyRepository;
use crate::property_type_repository::PropertyTypeRepository;
use crate::rating_repository::RatingRepository;

/// How long a connection waits on a locked database before SQLite reports SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::ConfigError(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub fn agency_repo(&self) -> AgencyRepository {
        AgencyRepository::new(self.pool.clone())
    }

    pub fn property_repo(&self) -> PropertyRepository {
        PropertyRepository::new(self.pool.clone())
    }

    pub fn feature_repo(&self) -> FeatureRepository {
        FeatureRepository::new(self.pool.clone())
    }

    pub fn property_type_repo(&self) -> PropertyTypeRepository {
        PropertyTypeRepository::new(self.pool.clone())
    }

    pub fn rating_repo(&self) -> RatingRepository {
        RatingRepository::new(self.pool.clone())
    }

    pub fn note_repo(&self) -> NoteRepository {
        NoteRepository::new(self.pool.clone())
    }

    pub fn list_repo(&self) -> ListRepository {
        ListRepository::new(self.pool.clone())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(crate::error::map_db_err)?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
