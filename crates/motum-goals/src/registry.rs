//! [`Registry`] – name → factory tables with fuzzy suggestions on a miss.
//!
//! Both constraint kinds and monitor kinds live in a [`Registry`].  Lookups
//! are exact; on a miss, every registered name is scored against the request
//! with a normalised edit-distance ratio and names scoring at least
//! [`SUGGESTION_RATIO`] are offered as suggestions.  With no close match the
//! full listing is returned instead.

use std::collections::BTreeMap;

use motum_types::KindHint;

/// Minimum similarity for a registered name to be suggested.
pub const SUGGESTION_RATIO: f64 = 0.5;

pub struct Registry<F> {
    entries: BTreeMap<String, F>,
}

impl<F> Default for Registry<F> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<F> Registry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, returning the entry it replaced.
    pub fn register(&mut self, name: impl Into<String>, factory: F) -> Option<F> {
        self.entries.insert(name.into(), factory)
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &F)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup, or a hint describing what the caller may have meant.
    pub fn resolve(&self, name: &str) -> Result<&F, KindHint> {
        if let Some(factory) = self.entries.get(name) {
            return Ok(factory);
        }
        let mut scored: Vec<(f64, &String)> = self
            .entries
            .keys()
            .map(|known| (similarity(name, known), known))
            .filter(|(score, _)| *score >= SUGGESTION_RATIO)
            .collect();
        if scored.is_empty() {
            return Err(KindHint::Available(self.names()));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        Err(KindHint::Suggestions(
            scored.into_iter().map(|(_, known)| known.clone()).collect(),
        ))
    }
}

/// Levenshtein distance over characters.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// `1 - distance / max_len` over lower-cased names; 1.0 for two empty names.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(&a, &b) as f64 / longest as f64
}
