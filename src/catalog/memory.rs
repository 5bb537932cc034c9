//! In-memory catalog

use std::collections::HashMap;

use super::{CatalogEntry, Emotion, TrackCatalog};
use crate::error::Result;
use crate::layers::Layer;

/// Catalog backed by a map, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entries: HashMap<(Emotion, Layer), Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under `emotion` and the entry's own layer
    pub fn insert(&mut self, emotion: &Emotion, entry: CatalogEntry) {
        self.entries
            .entry((emotion.clone(), entry.layer))
            .or_default()
            .push(entry);
    }

    /// Builder form of [`MemoryCatalog::insert`]
    pub fn with_entry(mut self, emotion: &Emotion, entry: CatalogEntry) -> Self {
        self.insert(emotion, entry);
        self
    }
}

impl TrackCatalog for MemoryCatalog {
    fn list_tracks(&self, emotion: &Emotion, layer: Layer) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .entries
            .get(&(emotion.clone(), layer))
            .cloned()
            .unwrap_or_default())
    }
}
