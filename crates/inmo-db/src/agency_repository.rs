use chrono::{DateTime, Utc};
use inmo_core::dedup;
use inmo_core::error::AppError;
use inmo_core::models::{Agency, NewAgency, UNIDENTIFIED_SYSTEM};
use sqlx::SqlitePool;

use crate::error::map_db_err;

/// Repository for agencies.
#[derive(Clone)]
pub struct AgencyRepository {
    pool: SqlitePool,
}

impl AgencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, agency: &NewAgency) -> Result<Agency, AppError> {
        let row = sqlx::query_as::<_, AgencyRow>(
            r#"
            INSERT INTO agencies (name, url, zone, address, phone, rating)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(agency.name.trim())
        .bind(agency.url.trim())
        .bind(&agency.zone)
        .bind(&agency.address)
        .bind(&agency.phone)
        .bind(agency.rating)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.into())
    }

    /// Whether an agency with a similar name or address is already stored.
    ///
    /// See [`inmo_core::dedup`] for the matching rules and their limits.
    pub async fn exists(&self, name: &str, address: &str) -> Result<bool, AppError> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT name, address FROM agencies")
                .fetch_all(&self.pool)
                .await
                .map_err(map_db_err)?;

        Ok(rows.iter().any(|(stored_name, stored_address)| {
            dedup::matches(name, address, stored_name, stored_address.as_deref())
        }))
    }

    /// Insert the agency unless [`Self::exists`] reports a match.
    pub async fn create_if_new(&self, agency: &NewAgency) -> Result<Option<Agency>, AppError> {
        let address = agency.address.as_deref().unwrap_or_default();
        if self.exists(&agency.name, address).await? {
            tracing::debug!(name = %agency.name, "Agency already known, skipping");
            return Ok(None);
        }
        self.create(agency).await.map(Some)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Agency>, AppError> {
        let row = sqlx::query_as::<_, AgencyRow>("SELECT * FROM agencies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn list(&self) -> Result<Vec<Agency>, AppError> {
        let rows = sqlx::query_as::<_, AgencyRow>("SELECT * FROM agencies ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Agencies the classifier has not identified yet.
    pub async fn list_without_system(&self) -> Result<Vec<Agency>, AppError> {
        let rows = sqlx::query_as::<_, AgencyRow>(
            r#"
            SELECT * FROM agencies
            WHERE system IS NULL OR system = '' OR system = ?
            ORDER BY name
            "#,
        )
        .bind(UNIDENTIFIED_SYSTEM)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_with_system(&self) -> Result<Vec<Agency>, AppError> {
        let rows = sqlx::query_as::<_, AgencyRow>(
            r#"
            SELECT * FROM agencies
            WHERE system IS NOT NULL AND system != '' AND system != ?
            ORDER BY name
            "#,
        )
        .bind(UNIDENTIFIED_SYSTEM)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Agencies whose name contains `needle`, case-insensitively.
    pub async fn find_by_name(&self, needle: &str) -> Result<Vec<Agency>, AppError> {
        let needle = needle.to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn update_system(&self, id: i64, system: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE agencies SET system = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(system)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("agency {}", id)));
        }
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct AgencyRow {
    id: i64,
    name: String,
    url: String,
    system: Option<String>,
    zone: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    rating: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AgencyRow> for Agency {
    fn from(row: AgencyRow) -> Self {
        Agency {
            id: row.id,
            name: row.name,
            url: row.url,
            system: row.system,
            zone: row.zone,
            address: row.address,
            phone: row.phone,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
