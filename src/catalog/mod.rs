//! Track Catalog Module
//!
//! Enumerates the track library by emotion and layer. Track files follow the
//! naming template `{no}_{bpm}_{class}_{layer}.{ext}`, e.g. `3_72_piano_L1.mp3`;
//! the file stem doubles as the track's identifier.

mod folder;
mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::Layer;

pub use folder::FolderCatalog;
pub use memory::MemoryCatalog;

/// Emotional category of a session; names a folder of the track library
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Emotion(String);

impl Emotion {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Folder name under the library root
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Self::new("peaceful")
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields encoded in a track file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackName {
    pub number: String,
    pub bpm: u32,
    pub class: String,
    pub layer: Layer,
}

/// Parse a file stem of the form `{no}_{bpm}_{class}_{layer}`
///
/// The class may itself contain underscores.
pub fn parse_track_name(stem: &str) -> Option<TrackName> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    let layer = Layer::from_suffix(parts[parts.len() - 1])?;
    let bpm = parts[1].parse().ok()?;

    Some(TrackName {
        number: parts[0].to_string(),
        bpm,
        class: parts[2..parts.len() - 1].join("_"),
        layer,
    })
}

/// Identifier of the harmony counterpart of a melody track
///
/// Same base id with the layer suffix swapped: `3_72_piano_L1` pairs with
/// `3_72_piano_L2`.
pub fn paired_file_id(melody_id: &str) -> Option<String> {
    let base = melody_id.strip_suffix(Layer::Melody.suffix())?;
    if !base.ends_with('_') {
        return None;
    }
    Some(format!("{}{}", base, Layer::Harmony.suffix()))
}

/// One playable file of the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File stem, unique within an emotion
    pub file_id: String,
    pub path: PathBuf,
    /// Tempo label; ambient files outside the naming template have none
    pub bpm: Option<u32>,
    pub layer: Layer,
}

impl CatalogEntry {
    pub fn new(file_id: impl Into<String>, path: impl Into<PathBuf>, bpm: Option<u32>, layer: Layer) -> Self {
        Self {
            file_id: file_id.into(),
            path: path.into(),
            bpm,
            layer,
        }
    }

    /// Build an entry from a file that follows the naming template
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let name = parse_track_name(stem)?;
        Some(Self::new(stem, path, Some(name.bpm), name.layer))
    }
}

/// Source of candidate tracks for each emotion and layer
pub trait TrackCatalog: Send {
    /// Entries for `layer` in a stable order; empty if there are none
    fn list_tracks(&self, emotion: &Emotion, layer: Layer) -> Result<Vec<CatalogEntry>>;

    /// Harmony track sharing the melody track's base id, if one exists
    fn find_paired_track(&self, emotion: &Emotion, melody_id: &str) -> Result<Option<CatalogEntry>> {
        let Some(paired_id) = paired_file_id(melody_id) else {
            return Ok(None);
        };
        Ok(self
            .list_tracks(emotion, Layer::Harmony)?
            .into_iter()
            .find(|entry| entry.file_id == paired_id))
    }
}
