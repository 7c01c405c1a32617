//! Text helpers shared by the site adapters.
//!
//! Listing sites publish numbers in Argentine notation: `.` groups thousands
//! and `,` marks decimals (`1.250,5 m²`).

use std::sync::LazyLock;

use inmo_core::property_type::fold_accents;
use regex::Regex;
use scraper::ElementRef;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d.,]*").unwrap());

static AREA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d.,]*)\s*(?:m²|m2|mts|m\b)").unwrap());

static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Element text with whitespace runs collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<String>())
}

pub fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased, accent-folded form used for label comparisons.
pub fn fold(s: &str) -> String {
    fold_accents(&s.to_lowercase())
}

/// Parse one number token in local notation.
///
/// A lone `.` followed by exactly three digits is a thousands separator;
/// otherwise it is a decimal point.
pub fn parse_decimal(token: &str) -> Option<f64> {
    let token = token.trim_end_matches(['.', ',']);
    if token.is_empty() {
        return None;
    }

    let normalized = if token.contains(',') {
        token.replace('.', "").replace(',', ".")
    } else {
        let groups: Vec<&str> = token.split('.').collect();
        let thousands = groups.len() > 1 && groups[1..].iter().all(|g| g.len() == 3);
        if thousands {
            groups.concat()
        } else {
            token.to_string()
        }
    };
    normalized.parse().ok()
}

/// First number in free text, e.g. `"$ 15.000 mensuales"` → `15000`.
pub fn first_number(text: &str) -> Option<f64> {
    NUMBER_RE.find(text).and_then(|m| parse_decimal(m.as_str()))
}

/// First integer in free text.
pub fn first_int(text: &str) -> Option<i32> {
    INT_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Surface in square meters, e.g. `"120,5 m²"`.
pub fn area(text: &str) -> Option<f64> {
    AREA_RE
        .captures(text)
        .and_then(|c| parse_decimal(&c[1]))
        .or_else(|| first_number(text))
}

/// Age in years. "A estrenar" means brand new.
pub fn age(text: &str) -> Option<i32> {
    if fold(text).contains("estrenar") {
        return Some(0);
    }
    first_int(text)
}

/// The value part of a `"Label: value"` line.
pub fn value_after_colon(text: &str) -> Option<String> {
    let (_, value) = text.split_once(':')?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Operation type guessed from a page title or URL.
pub fn operation(haystack: &str) -> Option<String> {
    let haystack = fold(haystack);
    if haystack.contains("alquiler temp") || haystack.contains("alquiler-temp") {
        Some("Alquiler Temporario".into())
    } else if haystack.contains("alquiler") {
        Some("Alquiler".into())
    } else if haystack.contains("venta") {
        Some("Venta".into())
    } else {
        None
    }
}
