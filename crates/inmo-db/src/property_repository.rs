use chrono::{DateTime, Utc};
use inmo_core::error::AppError;
use inmo_core::filter::{FilterValue, PropertyFilter, PropertyView};
use inmo_core::models::{Property, PropertyDetails, PropertyStatus, PropertyStub};
use inmo_core::traits::PendingScope;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::map_db_err;

const SELECT_PROPERTY: &str = r#"
    SELECT p.*, t.name AS property_type_name
    FROM properties p
    LEFT JOIN property_types t ON t.id = p.property_type_id
"#;

/// Repository for property listings.
#[derive(Clone)]
pub struct PropertyRepository {
    pool: SqlitePool,
}

impl PropertyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a listing or refresh its summary fields, keyed by `code`.
    ///
    /// Status and detail columns of an existing row are left untouched.
    pub async fn upsert_stub(&self, agency_id: i64, stub: &PropertyStub) -> Result<i64, AppError> {
        let code = stub.code.trim();
        if code.is_empty() {
            return Err(AppError::ValidationError("property code must not be empty".into()));
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO properties (agency_id, code, title, price, currency, address, url, image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (code) DO UPDATE SET
                agency_id = excluded.agency_id,
                title = excluded.title,
                price = excluded.price,
                currency = excluded.currency,
                address = excluded.address,
                url = excluded.url,
                image_url = excluded.image_url,
                updated_at = CURRENT_TIMESTAMP
            RETURNING id
            "#,
        )
        .bind(agency_id)
        .bind(code)
        .bind(&stub.title)
        .bind(&stub.price)
        .bind(stub.currency.map(|c| c.as_str()))
        .bind(&stub.address)
        .bind(&stub.url)
        .bind(&stub.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Property>, AppError> {
        let sql = format!("{SELECT_PROPERTY} WHERE p.id = ?");
        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Property>, AppError> {
        let sql = format!("{SELECT_PROPERTY} WHERE p.code = ?");
        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM properties WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.is_some())
    }

    /// Pending properties, newest first.
    pub async fn pending(&self, scope: &PendingScope) -> Result<Vec<Property>, AppError> {
        let mut sql = format!("{SELECT_PROPERTY} WHERE p.status = 'pending'");
        if !scope.agency_ids.is_empty() {
            sql.push_str(&format!(
                " AND p.agency_id IN ({})",
                inmo_core::filter::placeholders(scope.agency_ids.len())
            ));
        }
        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");
        if scope.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, PropertyRow>(&sql);
        for id in &scope.agency_ids {
            query = query.bind(*id);
        }
        if let Some(limit) = scope.limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List one view, narrowed by the compiled filter.
    pub async fn list(
        &self,
        view: PropertyView,
        filter: &PropertyFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Property>, AppError> {
        let compiled = filter.compile()?;

        let (join, mut predicates, order) = match view {
            PropertyView::Unrated => (
                "",
                vec!["NOT EXISTS (SELECT 1 FROM property_ratings pr WHERE pr.property_id = p.id)".to_string()],
                "p.created_at DESC, p.id DESC",
            ),
            PropertyView::Liked => (
                "JOIN property_ratings pr ON pr.property_id = p.id",
                vec!["pr.rating = 'like'".to_string()],
                "pr.created_at DESC, p.id DESC",
            ),
            PropertyView::Favorites => (
                "JOIN property_ratings pr ON pr.property_id = p.id",
                vec!["pr.rating = 'like'".to_string(), "pr.is_favorite = 1".to_string()],
                "pr.created_at DESC, p.id DESC",
            ),
        };
        predicates.extend(compiled.predicates.iter().cloned());

        let mut sql = format!(
            r#"
            SELECT p.*, t.name AS property_type_name
            FROM properties p
            LEFT JOIN property_types t ON t.id = p.property_type_id
            {join}
            WHERE {}
            ORDER BY {order}
            "#,
            predicates.join(" AND ")
        );
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, PropertyRow>(&sql);
        for param in &compiled.params {
            query = match param {
                FilterValue::Int(v) => query.bind(*v),
                FilterValue::Float(v) => query.bind(*v),
                FilterValue::Text(v) => query.bind(v.as_str()),
            };
        }
        if let Some(limit) = limit {
            query = query.bind(i64::from(limit));
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_db_err)?;
        tracing::debug!(view = %view, predicates = compiled.predicates.len(), rows = rows.len(), "Listed properties");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Move a pending property to `not_available`.
    ///
    /// Returns `Ok(false)` when the property exists but is no longer pending.
    pub async fn mark_not_available(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE properties SET status = 'not_available', updated_at = CURRENT_TIMESTAMP \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if !self.exists(id).await? {
            return Err(AppError::NotFound(format!("property {}", id)));
        }
        tracing::debug!(property_id = id, "Property not pending, status kept");
        Ok(false)
    }

    pub async fn count_by_status(&self, status: PropertyStatus) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM properties WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(count)
    }
}

/// Write the detail columns of one pending property and mark it completed, on the caller's transaction.
///
/// Images are kept when the update carries none; coordinates are kept unless
/// both are present and non-zero. Returns `Ok(false)` without writing when the
/// property is no longer pending.
pub async fn update_details_in_tx(
    conn: &mut SqliteConnection,
    property_id: i64,
    property_type_id: Option<i64>,
    details: &PropertyDetails,
) -> Result<bool, AppError> {
    let images = if details.images.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&details.images)?)
    };
    let coordinates = details.coordinates();

    let result = sqlx::query(
        r#"
        UPDATE properties SET
            property_type_id = COALESCE(?, property_type_id),
            location = ?,
            description = ?,
            bedrooms = ?,
            bathrooms = ?,
            rooms = ?,
            floors = ?,
            garages = ?,
            age = ?,
            covered_area = ?,
            total_area = ?,
            land_area = ?,
            front = ?,
            back = ?,
            situation = ?,
            expenses = ?,
            operation = ?,
            condition = ?,
            orientation = ?,
            disposition = ?,
            images = COALESCE(?, images),
            latitude = COALESCE(?, latitude),
            longitude = COALESCE(?, longitude),
            status = 'completed',
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(property_type_id)
    .bind(&details.location)
    .bind(&details.description)
    .bind(details.bedrooms)
    .bind(details.bathrooms)
    .bind(details.rooms)
    .bind(details.floors)
    .bind(details.garages)
    .bind(details.age)
    .bind(details.covered_area)
    .bind(details.total_area)
    .bind(details.land_area)
    .bind(details.front)
    .bind(details.back)
    .bind(&details.situation)
    .bind(details.expenses)
    .bind(&details.operation)
    .bind(&details.condition)
    .bind(&details.orientation)
    .bind(&details.disposition)
    .bind(images)
    .bind(coordinates.map(|(lat, _)| lat))
    .bind(coordinates.map(|(_, lng)| lng))
    .bind(property_id)
    .execute(&mut *conn)
    .await
    .map_err(map_db_err)?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM properties WHERE id = ?")
        .bind(property_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_err)?;
    match row {
        Some(_) => Ok(false),
        None => Err(AppError::NotFound(format!("property {}", property_id))),
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: i64,
    agency_id: i64,
    code: String,
    title: String,
    price: String,
    currency: Option<String>,
    address: Option<String>,
    url: String,
    image_url: Option<String>,
    images: String,
    property_type_id: Option<i64>,
    property_type_name: Option<String>,
    location: Option<String>,
    description: Option<String>,
    bedrooms: Option<i32>,
    bathrooms: Option<i32>,
    rooms: Option<i32>,
    floors: Option<i32>,
    garages: Option<i32>,
    age: Option<i32>,
    covered_area: Option<f64>,
    total_area: Option<f64>,
    land_area: Option<f64>,
    front: Option<f64>,
    back: Option<f64>,
    situation: Option<String>,
    expenses: Option<f64>,
    operation: Option<String>,
    condition: Option<String>,
    orientation: Option<String>,
    disposition: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Property {
            id: row.id,
            agency_id: row.agency_id,
            code: row.code,
            title: row.title,
            price: row.price,
            currency: row.currency,
            address: row.address,
            url: row.url,
            image_url: row.image_url,
            images: serde_json::from_str(&row.images).unwrap_or_default(),
            property_type_id: row.property_type_id,
            property_type: row.property_type_name,
            location: row.location,
            description: row.description,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            rooms: row.rooms,
            floors: row.floors,
            garages: row.garages,
            age: row.age,
            covered_area: row.covered_area,
            total_area: row.total_area,
            land_area: row.land_area,
            front: row.front,
            back: row.back,
            situation: row.situation,
            expenses: row.expenses,
            operation: row.operation,
            condition: row.condition,
            orientation: row.orientation,
            disposition: row.disposition,
            latitude: row.latitude,
            longitude: row.longitude,
            status: row.status.parse().unwrap_or(PropertyStatus::Pending),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
