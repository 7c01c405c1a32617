//! Free-text property type normalization.
//!
//! Sites publish types like "Depto.", "Casa Quinta" or "GALPÓN". The writer
//! maps them onto a canonical `(code, name)` pair before persisting, so the
//! same kind of property always lands on the same `property_types` row.

use serde::{Deserialize, Serialize};

/// Canonical `(code, name)` pair for a property type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalType {
    pub code: String,
    pub name: String,
}

/// Synonym table: accent-folded lowercase spellings → (code, display name).
const SYNONYMS: &[(&[&str], &str, &str)] = &[
    (
        &["casa", "chalet", "casa chalet", "casa quinta", "quinta"],
        "house",
        "Casa",
    ),
    (
        &[
            "departamento",
            "depto",
            "dpto",
            "dpto.",
            "depto.",
            "departamento con dependencia",
        ],
        "apartment",
        "Departamento",
    ),
    (&["ph", "p.h.", "p.h", "propiedad horizontal"], "ph", "PH"),
    (
        &["local", "local comercial", "fondo de comercio"],
        "local",
        "Local",
    ),
    (&["oficina", "consultorio", "estudio"], "office", "Oficina"),
    (
        &["terreno", "lote", "lote de terreno", "fraccion"],
        "land",
        "Terreno",
    ),
    (
        &["galpon", "deposito", "nave industrial"],
        "warehouse",
        "Galpón",
    ),
];

/// Normalize a scraped type string.
///
/// Returns `None` for blank input. Unknown types keep their trimmed spelling as
/// the name and get a derived code (`"Cochera Doble"` → `cochera_doble`).
pub fn normalize_property_type(raw: &str) -> Option<CanonicalType> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let key = collapse_whitespace(&fold_accents(&trimmed.to_lowercase()));
    for (spellings, code, name) in SYNONYMS {
        if spellings.contains(&key.as_str()) {
            return Some(CanonicalType {
                code: (*code).to_string(),
                name: (*name).to_string(),
            });
        }
    }

    Some(CanonicalType {
        code: key.replace(' ', "_"),
        name: collapse_whitespace(trimmed),
    })
}

/// Replace Spanish diacritics with their base letter.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
