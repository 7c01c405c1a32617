use std::str::FromStr;

use serde::{Deserialize, Serialize};

use inmo_core::error::AppError;
use inmo_core::models::{Currency, FeatureMap, Property, PropertyNote};
use inmo_core::PropertyFilter;

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Listing filter as sent in a query string.
///
/// List criteria are comma separated (`locations=lanus,escalada`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterQuery {
    pub property_type: Option<String>,
    pub property_type_id: Option<i64>,
    pub property_type_ids: Option<String>,
    pub agency_ids: Option<String>,
    pub locations: Option<String>,
    pub features: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub currency: Option<String>,
    pub size_min: Option<f64>,
    pub size_max: Option<f64>,
    pub total_area_min: Option<f64>,
    pub total_area_max: Option<f64>,
    pub covered_area_min: Option<f64>,
    pub covered_area_max: Option<f64>,
    pub land_area_min: Option<f64>,
    pub land_area_max: Option<f64>,
    pub front: Option<f64>,
    pub back: Option<f64>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub antiquity: Option<i32>,
    pub disposition: Option<String>,
    pub orientation: Option<String>,
    pub condition: Option<String>,
    #[serde(alias = "with_notes")]
    pub show_only_with_notes: Option<bool>,
    pub favorites_only: Option<bool>,
    pub limit: Option<u32>,
}

impl TryFrom<FilterQuery> for PropertyFilter {
    type Error = AppError;

    fn try_from(q: FilterQuery) -> Result<Self, Self::Error> {
        let currency = q
            .currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(Currency::from_str)
            .transpose()
            .map_err(AppError::ValidationError)?;

        Ok(PropertyFilter {
            property_type_ids: split_ids("property_type_ids", q.property_type_ids.as_deref())?,
            property_type_id: q.property_type_id,
            property_type: q.property_type,
            agency_ids: split_ids("agency_ids", q.agency_ids.as_deref())?,
            locations: split_list(q.locations.as_deref()),
            features: split_ids("features", q.features.as_deref())?,
            price_min: q.price_min,
            price_max: q.price_max,
            currency,
            size_min: q.size_min,
            size_max: q.size_max,
            total_area_min: q.total_area_min,
            total_area_max: q.total_area_max,
            covered_area_min: q.covered_area_min,
            covered_area_max: q.covered_area_max,
            land_area_min: q.land_area_min,
            land_area_max: q.land_area_max,
            front: q.front,
            back: q.back,
            rooms: q.rooms,
            bathrooms: q.bathrooms,
            antiquity: q.antiquity,
            disposition: split_list(q.disposition.as_deref()),
            orientation: split_list(q.orientation.as_deref()),
            condition: split_list(q.condition.as_deref()),
            with_notes: q.show_only_with_notes.unwrap_or(false),
            favorites_only: q.favorites_only.unwrap_or(false),
        })
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn split_ids(field: &str, raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    split_list(raw)
        .iter()
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::ValidationError(format!("{field}: '{v}' is not an id")))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// A property plus the per-user state the listing views show next to it.
#[derive(Debug, Serialize)]
pub struct PropertyResponse {
    #[serde(flatten)]
    pub property: Property,
    pub has_notes: bool,
    pub is_favorite: bool,
    pub features: FeatureMap,
}

#[derive(Debug, Serialize)]
pub struct PropertyListResponse {
    pub properties: Vec<PropertyResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Ratings & notes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// `like` or `dislike`
    pub rating: String,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<PropertyNote>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct FeatureItem {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct FeatureCategory {
    /// Lowercase category key.
    pub id: String,
    /// Uppercase display label.
    pub name: String,
    pub features: Vec<FeatureItem>,
}

#[derive(Debug, Serialize)]
pub struct FeatureCatalogResponse {
    pub categories: Vec<FeatureCategory>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
