use inmo_core::error::AppError;
use inmo_core::models::PropertyType;
use inmo_core::property_type::CanonicalType;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::map_db_err;

/// Repository for the canonical property type catalog.
#[derive(Clone)]
pub struct PropertyTypeRepository {
    pool: SqlitePool,
}

impl PropertyTypeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<PropertyType>, AppError> {
        let rows = sqlx::query_as::<_, PropertyTypeRow>(
            "SELECT id, code, name FROM property_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn by_code(&self, code: &str) -> Result<Option<PropertyType>, AppError> {
        let row = sqlx::query_as::<_, PropertyTypeRow>(
            "SELECT id, code, name FROM property_types WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }
}

/// Look up the type by code, creating it on first sight. Runs on the caller's transaction.
pub async fn resolve_in_tx(
    conn: &mut SqliteConnection,
    canonical: &CanonicalType,
) -> Result<i64, AppError> {
    if let Some(id) = select_id(conn, &canonical.code).await? {
        return Ok(id);
    }

    sqlx::query("INSERT OR IGNORE INTO property_types (code, name) VALUES (?, ?)")
        .bind(&canonical.code)
        .bind(&canonical.name)
        .execute(&mut *conn)
        .await
        .map_err(map_db_err)?;
    tracing::info!(code = %canonical.code, name = %canonical.name, "Created property type");

    select_id(conn, &canonical.code).await?.ok_or_else(|| {
        AppError::DatabaseError(format!("property type {} missing after insert", canonical.code))
    })
}

async fn select_id(conn: &mut SqliteConnection, code: &str) -> Result<Option<i64>, AppError> {
    let id: Option<(i64,)> = sqlx::query_as("SELECT id FROM property_types WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_err)?;
    Ok(id.map(|(id,)| id))
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct PropertyTypeRow {
    id: i64,
    code: String,
    name: String,
}

impl From<PropertyTypeRow> for PropertyType {
    fn from(row: PropertyTypeRow) -> Self {
        PropertyType {
            id: row.id,
            code: row.code,
            name: row.name,
        }
    }
}
