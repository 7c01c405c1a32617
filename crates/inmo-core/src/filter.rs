//! Dynamic filter compiler.
//!
//! A [`PropertyFilter`] is a bag of independent optional criteria. Compiling it
//! yields SQL predicates over the `properties` table (aliased `p`) plus the
//! positional parameters they reference, in the exact order the `?`
//! placeholders appear. Absent criteria contribute nothing, so an empty
//! filter compiles to no predicates at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Currency;

/// Price text with currency tokens and thousands separators stripped, cast to a number.
const PRICE_AS_NUMBER: &str = "CAST(TRIM(REPLACE(REPLACE(REPLACE(REPLACE(REPLACE(p.price, 'USD', ''), 'U$S', ''), '$', ''), '.', ''), ',', '')) AS NUMERIC)";

const USD_BUCKET: &str =
    "(p.price LIKE '%USD%' OR p.price LIKE '%U$S%' OR p.currency = 'USD')";

const ARS_BUCKET: &str = "(p.price NOT LIKE '%USD%' AND p.price NOT LIKE '%U$S%' AND (p.currency IS NULL OR p.currency = 'ARS'))";

/// Antiquity buckets with "up to N years, not new" semantics.
const AGE_UPPER_BUCKETS: [i32; 4] = [5, 10, 20, 30];

/// Bucket meaning "older than the largest upper bucket".
const AGE_OLD_BUCKET: i32 = 100;

/// Declarative listing filter. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilter {
    /// Highest-priority type criterion.
    pub property_type_ids: Vec<i64>,
    pub property_type_id: Option<i64>,
    /// Legacy type code; `""` and `"all"` mean no type filter.
    pub property_type: Option<String>,
    pub agency_ids: Vec<i64>,
    /// Any-of substring match on location or address.
    pub locations: Vec<String>,
    /// Any-of feature ids.
    pub features: Vec<i64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    /// Defaults to ARS when a price bound is set.
    pub currency: Option<Currency>,
    /// Legacy bounds matching total OR covered area.
    pub size_min: Option<f64>,
    pub size_max: Option<f64>,
    pub total_area_min: Option<f64>,
    pub total_area_max: Option<f64>,
    pub covered_area_min: Option<f64>,
    pub covered_area_max: Option<f64>,
    pub land_area_min: Option<f64>,
    pub land_area_max: Option<f64>,
    /// Minimum front, in meters.
    pub front: Option<f64>,
    /// Minimum depth, in meters.
    pub back: Option<f64>,
    /// Minimum room count.
    pub rooms: Option<i32>,
    /// Minimum bathroom count.
    pub bathrooms: Option<i32>,
    /// Age bucket: 0, 5, 10, 20, 30, 100, or an exact age.
    pub antiquity: Option<i32>,
    pub disposition: Vec<String>,
    pub orientation: Vec<String>,
    pub condition: Vec<String>,
    #[serde(alias = "show_only_with_notes")]
    pub with_notes: bool,
    pub favorites_only: bool,
}

/// A positional SQL parameter produced by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Output of [`PropertyFilter::compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub predicates: Vec<String>,
    pub params: Vec<FilterValue>,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Predicates joined with `AND`, or an empty string.
    pub fn where_clause(&self) -> String {
        self.predicates.join(" AND ")
    }

    fn push(
        &mut self,
        predicate: impl Into<String>,
        params: impl IntoIterator<Item = FilterValue>,
    ) {
        self.predicates.push(predicate.into());
        self.params.extend(params);
    }

    fn push_bare(&mut self, predicate: impl Into<String>) {
        self.predicates.push(predicate.into());
    }
}

/// Which listing view a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyView {
    /// No rating yet, newest first.
    Unrated,
    /// Rated `like`, most recently rated first.
    Liked,
    /// Rated `like` and flagged favorite.
    Favorites,
}

impl PropertyView {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyView::Unrated => "unrated",
            PropertyView::Liked => "liked",
            PropertyView::Favorites => "favorites",
        }
    }
}

impl fmt::Display for PropertyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unrated" => Ok(PropertyView::Unrated),
            "liked" => Ok(PropertyView::Liked),
            "favorites" | "favorite" => Ok(PropertyView::Favorites),
            _ => Err(format!("Unknown view: {}", s)),
        }
    }
}

/// `?, ?, ?` for `n` parameters.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl PropertyFilter {
    /// Validate the filter and compile it into predicates and parameters.
    pub fn compile(&self) -> Result<CompiledFilter, AppError> {
        self.validate()?;

        let mut out = CompiledFilter::default();
        self.compile_type(&mut out);

        if !self.agency_ids.is_empty() {
            out.push(
                format!("p.agency_id IN ({})", placeholders(self.agency_ids.len())),
                self.agency_ids.iter().map(|id| FilterValue::Int(*id)),
            );
        }

        if !self.locations.is_empty() {
            let clauses = vec!["(p.location LIKE ? OR p.address LIKE ?)"; self.locations.len()];
            out.push(
                format!("({})", clauses.join(" OR ")),
                self.locations.iter().flat_map(|loc| {
                    let pattern = format!("%{}%", loc.trim());
                    [FilterValue::Text(pattern.clone()), FilterValue::Text(pattern)]
                }),
            );
        }

        if !self.features.is_empty() {
            out.push(
                format!(
                    "p.id IN (SELECT DISTINCT pf.property_id FROM property_feature_relations pf WHERE pf.feature_id IN ({}))",
                    placeholders(self.features.len())
                ),
                self.features.iter().map(|id| FilterValue::Int(*id)),
            );
        }

        self.compile_price(&mut out);
        self.compile_areas(&mut out);

        if let Some(rooms) = self.rooms {
            out.push("p.rooms >= ?", [FilterValue::Int(rooms.into())]);
        }
        if let Some(bathrooms) = self.bathrooms {
            out.push("p.bathrooms >= ?", [FilterValue::Int(bathrooms.into())]);
        }

        if let Some(bucket) = self.antiquity {
            compile_antiquity(bucket, &mut out);
        }

        for (column, values) in [
            ("p.disposition", &self.disposition),
            ("p.orientation", &self.orientation),
            ("p.condition", &self.condition),
        ] {
            if !values.is_empty() {
                out.push(
                    format!("{} IN ({})", column, placeholders(values.len())),
                    values.iter().map(|v| FilterValue::Text(v.trim().to_string())),
                );
            }
        }

        if self.with_notes {
            out.push_bare("EXISTS (SELECT 1 FROM property_notes n WHERE n.property_id = p.id)");
        }
        if self.favorites_only {
            out.push_bare("EXISTS (SELECT 1 FROM property_ratings r WHERE r.property_id = p.id AND r.is_favorite = 1)");
        }

        Ok(out)
    }

    fn compile_type(&self, out: &mut CompiledFilter) {
        if !self.property_type_ids.is_empty() {
            out.push(
                format!(
                    "p.property_type_id IN ({})",
                    placeholders(self.property_type_ids.len())
                ),
                self.property_type_ids.iter().map(|id| FilterValue::Int(*id)),
            );
        } else if let Some(id) = self.property_type_id {
            out.push("p.property_type_id = ?", [FilterValue::Int(id)]);
        } else if let Some(code) = self.property_type.as_deref().map(str::trim)
            && !code.is_empty()
            && code != "all"
        {
            out.push(
                "p.property_type_id = (SELECT id FROM property_types WHERE code = ?)",
                [FilterValue::Text(code.to_string())],
            );
        }
    }

    fn compile_price(&self, out: &mut CompiledFilter) {
        let has_bounds = self.price_min.is_some() || self.price_max.is_some();
        let currency = match (self.currency, has_bounds) {
            (Some(c), _) => Some(c),
            (None, true) => Some(Currency::Ars),
            (None, false) => None,
        };

        match currency {
            Some(Currency::Usd) => out.push_bare(USD_BUCKET),
            Some(Currency::Ars) => out.push_bare(ARS_BUCKET),
            None => {}
        }

        if let Some(min) = self.price_min {
            out.push(format!("{} >= ?", PRICE_AS_NUMBER), [FilterValue::Float(min)]);
        }
        if let Some(max) = self.price_max {
            out.push(format!("{} <= ?", PRICE_AS_NUMBER), [FilterValue::Float(max)]);
        }
    }

    fn compile_areas(&self, out: &mut CompiledFilter) {
        if let Some(min) = self.size_min {
            out.push(
                "(p.total_area >= ? OR p.covered_area >= ?)",
                [FilterValue::Float(min), FilterValue::Float(min)],
            );
        }
        if let Some(max) = self.size_max {
            out.push(
                "(p.total_area <= ? OR p.covered_area <= ?)",
                [FilterValue::Float(max), FilterValue::Float(max)],
            );
        }

        let bounds = [
            ("p.total_area >= ?", self.total_area_min),
            ("p.total_area <= ?", self.total_area_max),
            ("p.covered_area >= ?", self.covered_area_min),
            ("p.covered_area <= ?", self.covered_area_max),
            ("p.land_area >= ?", self.land_area_min),
            ("p.land_area <= ?", self.land_area_max),
            ("p.front >= ?", self.front),
            ("p.back >= ?", self.back),
        ];
        for (predicate, value) in bounds {
            if let Some(v) = value {
                out.push(predicate, [FilterValue::Float(v)]);
            }
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let numeric = [
            ("price_min", self.price_min),
            ("price_max", self.price_max),
            ("size_min", self.size_min),
            ("size_max", self.size_max),
            ("total_area_min", self.total_area_min),
            ("total_area_max", self.total_area_max),
            ("covered_area_min", self.covered_area_min),
            ("covered_area_max", self.covered_area_max),
            ("land_area_min", self.land_area_min),
            ("land_area_max", self.land_area_max),
            ("front", self.front),
            ("back", self.back),
        ];
        for (field, value) in numeric {
            if let Some(v) = value
                && (!v.is_finite() || v < 0.0)
            {
                return Err(AppError::ValidationError(format!(
                    "{} must be a non-negative number, got {}",
                    field, v
                )));
            }
        }

        let ranges = [
            ("price", self.price_min, self.price_max),
            ("size", self.size_min, self.size_max),
            ("total_area", self.total_area_min, self.total_area_max),
            ("covered_area", self.covered_area_min, self.covered_area_max),
            ("land_area", self.land_area_min, self.land_area_max),
        ];
        for (field, min, max) in ranges {
            if let (Some(min), Some(max)) = (min, max)
                && min > max
            {
                return Err(AppError::ValidationError(format!(
                    "{}_min ({}) is greater than {}_max ({})",
                    field, min, field, max
                )));
            }
        }

        for (field, value) in [
            ("rooms", self.rooms),
            ("bathrooms", self.bathrooms),
            ("antiquity", self.antiquity),
        ] {
            if let Some(v) = value
                && v < 0
            {
                return Err(AppError::ValidationError(format!(
                    "{} must not be negative, got {}",
                    field, v
                )));
            }
        }

        let mut ids = self
            .property_type_ids
            .iter()
            .map(|id| ("property_type_ids", *id))
            .chain(self.property_type_id.map(|id| ("property_type_id", id)))
            .chain(self.agency_ids.iter().map(|id| ("agency_ids", *id)))
            .chain(self.features.iter().map(|id| ("features", *id)));
        if let Some((field, id)) = ids.find(|(_, id)| *id <= 0) {
            return Err(AppError::ValidationError(format!(
                "{} must contain positive ids, got {}",
                field, id
            )));
        }

        for (field, values) in [
            ("locations", &self.locations),
            ("disposition", &self.disposition),
            ("orientation", &self.orientation),
            ("condition", &self.condition),
        ] {
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(AppError::ValidationError(format!(
                    "{} must not contain empty values",
                    field
                )));
            }
        }

        Ok(())
    }
}

fn compile_antiquity(bucket: i32, out: &mut CompiledFilter) {
    if bucket == 0 {
        out.push_bare("p.age = 0");
    } else if AGE_UPPER_BUCKETS.contains(&bucket) {
        out.push("(p.age > 0 AND p.age <= ?)", [FilterValue::Int(bucket.into())]);
    } else if bucket == AGE_OLD_BUCKET {
        out.push(
            "p.age > ?",
            [FilterValue::Int(AGE_UPPER_BUCKETS[AGE_UPPER_BUCKETS.len() - 1].into())],
        );
    } else {
        out.push("p.age = ?", [FilterValue::Int(bucket.into())]);
    }
}
