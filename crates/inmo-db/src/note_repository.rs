use chrono::{DateTime, Utc};
use inmo_core::RetryPolicy;
use inmo_core::error::AppError;
use inmo_core::models::PropertyNote;
use sqlx::SqlitePool;

use crate::error::map_db_err;

/// Repository for free-text notes attached to properties.
#[derive(Clone)]
pub struct NoteRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl NoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Notes for one property, oldest first.
    pub async fn list(&self, property_id: i64) -> Result<Vec<PropertyNote>, AppError> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, property_id, note, created_at, updated_at
            FROM property_notes
            WHERE property_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn add(&self, property_id: i64, text: &str) -> Result<PropertyNote, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::ValidationError("note must not be empty".into()));
        }

        let pool = &self.pool;
        self.retry
            .run("add_note", move || async move {
                let mut tx = pool.begin().await.map_err(map_db_err)?;

                let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM properties WHERE id = ?")
                    .bind(property_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_db_err)?;
                if found.is_none() {
                    return Err(AppError::NotFound(format!("property {}", property_id)));
                }

                let row = sqlx::query_as::<_, NoteRow>(
                    r#"
                    INSERT INTO property_notes (property_id, note)
                    VALUES (?, ?)
                    RETURNING id, property_id, note, created_at, updated_at
                    "#,
                )
                .bind(property_id)
                .bind(text)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_err)?;

                tx.commit().await.map_err(map_db_err)?;
                Ok(row.into())
            })
            .await
    }

    pub async fn delete(&self, note_id: i64) -> Result<(), AppError> {
        let pool = &self.pool;
        let deleted = self
            .retry
            .run("delete_note", move || async move {
                let result = sqlx::query("DELETE FROM property_notes WHERE id = ?")
                    .bind(note_id)
                    .execute(pool)
                    .await
                    .map_err(map_db_err)?;
                Ok(result.rows_affected())
            })
            .await?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("note {}", note_id)));
        }
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: i64,
    property_id: i64,
    note: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for PropertyNote {
    fn from(row: NoteRow) -> Self {
        PropertyNote {
            id: row.id,
            property_id: row.property_id,
            text: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
