use chrono::{DateTime, Utc};
use inmo_core::RetryPolicy;
use inmo_core::error::AppError;
use inmo_core::models::{PropertyRating, RatingValue};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::map_db_err;

/// Repository for like/dislike ratings and the favorite flag.
#[derive(Clone)]
pub struct RatingRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl RatingRepository {
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

    /// Rate a property, replacing any previous rating. A dislike clears the favorite flag.
    pub async fn rate(&self, property_id: i64, rating: RatingValue) -> Result<PropertyRating, AppError> {
        let pool = &self.pool;
        self.retry
            .run("rate_property", move || async move {
                let mut tx = pool.begin().await.map_err(map_db_err)?;
                ensure_property(&mut tx, property_id).await?;

                let row = sqlx::query_as::<_, RatingRow>(
                    r#"
                    INSERT INTO property_ratings (property_id, rating, is_favorite)
                    VALUES (?, ?, 0)
                    ON CONFLICT (property_id) DO UPDATE SET
                        rating = excluded.rating,
                        is_favorite = CASE
                            WHEN excluded.rating = 'dislike' THEN 0
                            ELSE property_ratings.is_favorite
                        END,
                        updated_at = CURRENT_TIMESTAMP
                    RETURNING property_id, rating, is_favorite, created_at, updated_at
                    "#,
                )
                .bind(property_id)
                .bind(rating.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_err)?;

                tx.commit().await.map_err(map_db_err)?;
                Ok(row.into())
            })
            .await
    }

    /// Set the favorite flag. Only a liked property can become a favorite.
    pub async fn set_favorite(&self, property_id: i64, is_favorite: bool) -> Result<PropertyRating, AppError> {
        let pool = &self.pool;
        self.retry
            .run("set_favorite", move || async move {
                let mut tx = pool.begin().await.map_err(map_db_err)?;
                ensure_property(&mut tx, property_id).await?;

                let current = select_rating(&mut tx, property_id).await?.ok_or_else(|| {
                    AppError::NotFound(format!("rating for property {}", property_id))
                })?;
                if is_favorite && current.rating == RatingValue::Dislike.as_str() {
                    return Err(AppError::ValidationError(format!(
                        "property {} is disliked and cannot be a favorite",
                        property_id
                    )));
                }

                let row = sqlx::query_as::<_, RatingRow>(
                    r#"
                    UPDATE property_ratings
                    SET is_favorite = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE property_id = ?
                    RETURNING property_id, rating, is_favorite, created_at, updated_at
                    "#,
                )
                .bind(is_favorite)
                .bind(property_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_err)?;

                tx.commit().await.map_err(map_db_err)?;
                Ok(row.into())
            })
            .await
    }

    pub async fn get(&self, property_id: i64) -> Result<Option<PropertyRating>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(map_db_err)?;
        Ok(select_rating(&mut conn, property_id).await?.map(Into::into))
    }
}

async fn ensure_property(conn: &mut SqliteConnection, property_id: i64) -> Result<(), AppError> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM properties WHERE id = ?")
        .bind(property_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_err)?;

    match found {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("property {}", property_id))),
    }
}

async fn select_rating(conn: &mut SqliteConnection, property_id: i64) -> Result<Option<RatingRow>, AppError> {
    sqlx::query_as::<_, RatingRow>(
        r#"
        SELECT property_id, rating, is_favorite, created_at, updated_at
        FROM property_ratings
        WHERE property_id = ?
        "#,
    )
    .bind(property_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_err)
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct RatingRow {
    property_id: i64,
    rating: String,
    is_favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for PropertyRating {
    fn from(row: RatingRow) -> Self {
        PropertyRating {
            property_id: row.property_id,
            rating: row.rating.parse().unwrap_or(RatingValue::Dislike),
            is_favorite: row.is_favorite,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
