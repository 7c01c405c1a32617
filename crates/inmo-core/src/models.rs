use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::property_type::CanonicalType;

/// Category name → feature names, as scraped from a listing's detail page.
pub type FeatureMap = BTreeMap<String, BTreeSet<String>>;

/// Label stored on agencies whose site matched no known fingerprint.
pub const UNIDENTIFIED_SYSTEM: &str = "No identificado";

/// Lifecycle state of a property with respect to detail enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Pending,
    Completed,
    NotAvailable,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Pending => "pending",
            PropertyStatus::Completed => "completed",
            PropertyStatus::NotAvailable => "not_available",
        }
    }

    /// Terminal states have no outgoing transition in the enrichment pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PropertyStatus::Completed | PropertyStatus::NotAvailable)
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PropertyStatus::Pending),
            "completed" => Ok(PropertyStatus::Completed),
            "not_available" => Ok(PropertyStatus::NotAvailable),
            _ => Err(format!("Unknown property status: {}", s)),
        }
    }
}

/// Price currency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ars,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
            Currency::Usd => "USD",
        }
    }

    /// Infers the currency from free-text price such as `"USD 85.000"` or `"$ 120.000"`.
    pub fn from_price_text(price: &str) -> Option<Self> {
        let upper = price.to_uppercase();
        if upper.contains("USD") || upper.contains("U$S") {
            Some(Currency::Usd)
        } else if upper.contains('$') {
            Some(Currency::Ars)
        } else {
            None
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARS" => Ok(Currency::Ars),
            "USD" => Ok(Currency::Usd),
            _ => Err(format!("Unknown currency: {}", s)),
        }
    }
}

/// A real-estate brokerage whose site is scraped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Detected CMS label, e.g. "tokko".
    pub system: Option<String>,
    pub zone: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    /// True once the classifier stored a real system label.
    pub fn has_system(&self) -> bool {
        match self.system.as_deref() {
            None => false,
            Some(s) => !s.trim().is_empty() && s != UNIDENTIFIED_SYSTEM,
        }
    }
}

/// DTO for inserting a new agency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub url: String,
    pub zone: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
}

/// Lightweight listing summary obtained from a search page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyStub {
    /// Business-unique code; the upsert key.
    pub code: String,
    pub title: String,
    pub price: String,
    pub currency: Option<Currency>,
    pub address: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
}

/// Detail attributes returned by a site adapter for one listing.
///
/// Every attribute is optional: sites publish different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    /// Free-text type as published, e.g. "Depto." or "Casa Quinta".
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub rooms: Option<i32>,
    pub floors: Option<i32>,
    pub garages: Option<i32>,
    /// Age in years; 0 means brand new.
    pub age: Option<i32>,
    pub covered_area: Option<f64>,
    pub total_area: Option<f64>,
    pub land_area: Option<f64>,
    pub front: Option<f64>,
    pub back: Option<f64>,
    pub situation: Option<String>,
    pub expenses: Option<f64>,
    pub operation: Option<String>,
    pub condition: Option<String>,
    pub orientation: Option<String>,
    pub disposition: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
    pub features: FeatureMap,
}

impl PropertyDetails {
    /// Both coordinates present and non-zero.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some((lat, lng)),
            _ => None,
        }
    }
}

/// What the writer hands to the store for one successful enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentUpdate {
    pub property_type: Option<CanonicalType>,
    pub details: PropertyDetails,
}

/// A stored property listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub agency_id: i64,
    pub code: String,
    pub title: String,
    pub price: String,
    pub currency: Option<String>,
    pub address: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub property_type_id: Option<i64>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub rooms: Option<i32>,
    pub floors: Option<i32>,
    pub garages: Option<i32>,
    pub age: Option<i32>,
    pub covered_area: Option<f64>,
    pub total_area: Option<f64>,
    pub land_area: Option<f64>,
    pub front: Option<f64>,
    pub back: Option<f64>,
    pub situation: Option<String>,
    pub expenses: Option<f64>,
    pub operation: Option<String>,
    pub condition: Option<String>,
    pub orientation: Option<String>,
    pub disposition: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical property type row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A categorized amenity from the feature catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: i64,
    pub name: String,
    pub category: String,
}

/// A user's verdict on a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingValue {
    Like,
    Dislike,
}

impl RatingValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingValue::Like => "like",
            RatingValue::Dislike => "dislike",
        }
    }
}

impl FromStr for RatingValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(RatingValue::Like),
            "dislike" => Ok(RatingValue::Dislike),
            _ => Err(format!("Invalid rating: {} (expected like or dislike)", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRating {
    pub property_id: i64,
    pub rating: RatingValue,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyNote {
    pub id: i64,
    pub property_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a named value list (disposition, orientation, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListValue {
    pub id: i64,
    pub value: String,
    pub display_name: String,
    pub sort_order: i64,
}
