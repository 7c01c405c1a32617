//! Agency deduplication heuristic.
//!
//! Names and addresses are normalized by lowercasing and dropping spaces,
//! periods, commas, hyphens, ampersands and apostrophes; a query matches a
//! stored agency when the normalized query is a substring of its normalized
//! name or of its non-empty normalized address.
//!
//! Substring containment over-matches short generic names and can merge
//! distinct agencies that share a word. That loss of precision is accepted in
//! exchange for catching spelling variants such as "Ruiz & Asociados" vs
//! "ruiz asociados".

/// Characters removed before comparison.
pub const STRIPPED_CHARS: [char; 6] = [' ', '.', ',', '-', '&', '\''];

/// Normalize an agency name or address for comparison.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect()
}

/// In-memory version of the store's `EXISTS` check.
pub fn matches(
    query_name: &str,
    query_address: &str,
    stored_name: &str,
    stored_address: Option<&str>,
) -> bool {
    let name = normalize(query_name);
    if !name.is_empty() && normalize(stored_name).contains(&name) {
        return true;
    }

    let stored_address = normalize(stored_address.unwrap_or_default());
    let address = normalize(query_address);
    !stored_address.is_empty() && !address.is_empty() && stored_address.contains(&address)
}
