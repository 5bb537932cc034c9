//! Folder-backed catalog
//!
//! Library layout:
//! ```text
//! sound_folders_root/
//!   environment/          # shared ambience, any file name
//!     rain.wav
//!   peaceful/             # one folder per emotion
//!     1_60_pad_L0.wav
//!     3_72_piano_L1.mp3
//!     3_72_piano_L2.mp3
//! ```
//!
//! Any extension in [`AUDIO_EXTENSIONS`](crate::engine::AUDIO_EXTENSIONS)
//! counts as a track.

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::{CatalogEntry, Emotion, TrackCatalog};
use crate::engine::is_audio_path;
use crate::error::Result;
use crate::layers::Layer;

/// Folder holding ambience shared by every emotion
pub const ENVIRONMENT_FOLDER: &str = "environment";

/// Catalog that scans the track library on disk
#[derive(Debug, Clone)]
pub struct FolderCatalog {
    root: PathBuf,
}

impl FolderCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Audio files directly inside `dir`, sorted by file name.
    /// A missing folder yields nothing.
    fn audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            debug!("Catalog folder {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_audio_path(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn environment_tracks(&self) -> Result<Vec<CatalogEntry>> {
        Ok(Self::audio_files(&self.root.join(ENVIRONMENT_FOLDER))?
            .into_iter()
            .filter_map(|path| {
                CatalogEntry::from_path(&path).or_else(|| {
                    let stem = path.file_stem()?.to_str()?.to_string();
                    Some(CatalogEntry::new(stem, path.clone(), None, Layer::Ambient))
                })
            })
            .map(|mut entry| {
                entry.layer = Layer::Ambient;
                entry
            })
            .collect())
    }
}

impl TrackCatalog for FolderCatalog {
    fn list_tracks(&self, emotion: &Emotion, layer: Layer) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = Self::audio_files(&self.root.join(emotion.name()))?
            .iter()
            .filter_map(|path| CatalogEntry::from_path(path))
            .filter(|entry| entry.layer == layer)
            .collect();

        if layer == Layer::Ambient {
            entries.extend(self.environment_tracks()?);
        }

        debug!(
            "Catalog {} / {}: {} candidate(s)",
            emotion,
            layer,
            entries.len()
        );
        Ok(entries)
    }
}
