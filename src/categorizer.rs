use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::db::{load_versioned, write_atomic, CACHE_FORMAT, SCHEMA_VERSION};
use crate::error::Result;
use crate::models::normalize_description;

/// A learned matcher: any description containing `pattern` (ignoring case)
/// gets `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub pattern: String,
    pub category: String,
}

impl CacheEntry {
    fn matches(&self, description_lower: &str) -> bool {
        !self.pattern.is_empty() && description_lower.contains(&self.pattern.to_lowercase())
    }
}

#[derive(Serialize)]
struct CacheOut<'a> {
    format: &'static str,
    version: u64,
    entries: &'a [CacheEntry],
}

#[derive(Deserialize)]
struct CacheIn {
    entries: Vec<CacheEntry>,
}

/// Ordered description → category matchers. First match wins, so entries
/// learned earlier take precedence over later, broader ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCache {
    entries: Vec<CacheEntry>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file is an empty cache; an unreadable one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match load_versioned::<CacheIn>(path, CACHE_FORMAT)? {
            Some(file) => {
                info!("loaded {} category matchers from {}", file.entries.len(), path.display());
                Ok(Self {
                    entries: file.entries,
                })
            }
            None => {
                info!("no category cache at {}", path.display());
                Ok(Self::new())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(
            path,
            &CacheOut {
                format: CACHE_FORMAT,
                version: SCHEMA_VERSION,
                entries: &self.entries,
            },
        )
    }

    /// Category of the first entry whose pattern occurs in `description`,
    /// compared case-insensitively after whitespace normalization.
    pub fn resolve(&self, description: &str) -> Option<&str> {
        let lower = normalize_description(description).to_lowercase();
        let hit = self.entries.iter().find(|e| e.matches(&lower))?;
        debug!("'{description}' matched '{}'", hit.pattern);
        Some(hit.category.as_str())
    }

    /// Append a matcher. The pattern is stored exactly as given.
    pub fn learn(&mut self, pattern: &str, category: &str) {
        self.entries.push(CacheEntry {
            pattern: pattern.to_string(),
            category: category.to_string(),
        });
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories in first-learned order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.category.as_str()) {
                seen.push(&entry.category);
            }
        }
        seen
    }

    /// Drop entries learned after the cache had `len` entries. Used when an
    /// interactive decision is taken back.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}
