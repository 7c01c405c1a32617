//! CMS fingerprint table.
//!
//! Maps a system label to the marker strings that identify it in a site's
//! HTML. The table is an ordinary value: callers build one (or take the
//! default) and pass it to whatever classifies pages.

/// One CMS entry: label plus identifying markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub system: String,
    pub markers: Vec<String>,
}

/// Ordered, immutable list of fingerprints. The first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintTable {
    entries: Vec<Fingerprint>,
}

impl FingerprintTable {
    /// Build a table from `(system, markers)` pairs. Markers are matched case-insensitively.
    pub fn new<S, M, I>(entries: I) -> Self
    where
        S: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
        I: IntoIterator<Item = (S, M)>,
    {
        let entries = entries
            .into_iter()
            .map(|(system, markers)| Fingerprint {
                system: system.into(),
                markers: markers
                    .into_iter()
                    .map(|m| Into::<String>::into(m).to_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Fingerprint] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the first system whose markers appear in `html`.
    pub fn classify(&self, html: &str) -> Option<&str> {
        let haystack = html.to_lowercase();
        self.entries
            .iter()
            .find(|fp| fp.markers.iter().any(|m| haystack.contains(m.as_str())))
            .map(|fp| fp.system.as_str())
    }
}

impl Default for FingerprintTable {
    fn default() -> Self {
        Self::new([
            (
                "tokko",
                vec!["tokkobroker", "tokko broker", "static.tokkobroker.com"],
            ),
            ("wordpress", vec!["wp-content", "wp-includes"]),
            ("wix", vec!["wix.com", "_wixcss"]),
        ])
    }
}
