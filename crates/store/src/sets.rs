use std::collections::HashMap;

use cardwatch_core::SetData;

/// Set name → set code resolution for detail-page parsing.
///
/// Detail pages print the full set name ("Modern Horizons 2"); listings
/// carry the code ("MH2"). Built from the set catalog and passed into the
/// scrapers at startup — an explicitly constructed registry, not a
/// process-wide singleton.
#[derive(Debug, Default)]
pub struct SetCodeLookup {
    by_name: HashMap<String, String>,
}

impl SetCodeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sets(sets: &[SetData]) -> Self {
        let mut lookup = Self::new();
        for set in sets {
            lookup.insert(&set.name, &set.code);
        }
        lookup
    }

    pub fn insert(&mut self, name: &str, code: &str) {
        self.by_name
            .insert(name.trim().to_lowercase(), code.to_uppercase());
    }

    /// Resolve a set name case-insensitively. Returns the uppercase code.
    pub fn code_for(&self, name: &str) -> Option<String> {
        self.by_name.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
