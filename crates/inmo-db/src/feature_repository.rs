use std::collections::BTreeSet;

use inmo_core::RetryPolicy;
use inmo_core::error::AppError;
use inmo_core::models::{Feature, FeatureMap};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::map_db_err;

/// Repository for the feature catalog and property↔feature relations.
#[derive(Clone)]
pub struct FeatureRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl FeatureRepository {
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

    /// Replace a property's feature set in its own transaction.
    ///
    /// For callers outside the enrichment pipeline; retried on lock contention.
    pub async fn save_property_features(
        &self,
        property_id: i64,
        features: &FeatureMap,
    ) -> Result<(), AppError> {
        let pool = &self.pool;
        self.retry
            .run("save_property_features", move || async move {
                let mut tx = pool.begin().await.map_err(map_db_err)?;
                reconcile_in_tx(&mut *tx, property_id, features).await?;
                tx.commit().await.map_err(map_db_err)
            })
            .await
    }

    /// The whole catalog, grouped by category then name.
    pub async fn all(&self) -> Result<Vec<Feature>, AppError> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT id, name, category FROM property_features ORDER BY category, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, category)| Feature { id, name, category })
            .collect())
    }

    pub async fn for_property(&self, property_id: i64) -> Result<FeatureMap, AppError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT f.category, f.name
            FROM property_feature_relations r
            JOIN property_features f ON f.id = r.feature_id
            WHERE r.property_id = ?
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut map = FeatureMap::new();
        for (category, name) in rows {
            map.entry(category).or_insert_with(BTreeSet::new).insert(name);
        }
        Ok(map)
    }
}

/// Make the property's relation set equal to `features`, on the caller's transaction.
///
/// Existing relations are deleted first; missing catalog rows are created with
/// `INSERT OR IGNORE` and re-read, so a row created concurrently is reused.
pub async fn reconcile_in_tx(
    conn: &mut SqliteConnection,
    property_id: i64,
    features: &FeatureMap,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM property_feature_relations WHERE property_id = ?")
        .bind(property_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_err)?;

    for (category, names) in features {
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }

            let feature_id = resolve_feature(conn, name, category).await?;
            sqlx::query(
                "INSERT OR IGNORE INTO property_feature_relations (property_id, feature_id) VALUES (?, ?)",
            )
            .bind(property_id)
            .bind(feature_id)
            .execute(&mut *conn)
            .await
            .map_err(map_db_err)?;
        }
    }

    Ok(())
}

async fn resolve_feature(
    conn: &mut SqliteConnection,
    name: &str,
    category: &str,
) -> Result<i64, AppError> {
    if let Some(id) = select_feature_id(conn, name, category).await? {
        return Ok(id);
    }

    sqlx::query("INSERT OR IGNORE INTO property_features (name, category) VALUES (?, ?)")
        .bind(name)
        .bind(category)
        .execute(&mut *conn)
        .await
        .map_err(map_db_err)?;

    select_feature_id(conn, name, category).await?.ok_or_else(|| {
        AppError::DatabaseError(format!("feature {category}/{name} missing after insert"))
    })
}

async fn select_feature_id(
    conn: &mut SqliteConnection,
    name: &str,
    category: &str,
) -> Result<Option<i64>, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM property_features WHERE name = ? AND category = ?")
            .bind(name)
            .bind(category)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_db_err)?;
    Ok(row.map(|(id,)| id))
}
