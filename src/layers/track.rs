//! Track decoding and preparation
//!
//! A [`Track`] is a catalog entry together with its fully decoded audio at
//! the internal sample rate, loudness-normalized and long enough to cut at
//! least one transport window from.

use log::{debug, info, warn};

use crate::catalog::CatalogEntry;
use crate::config::SessionConfig;
use crate::engine::{decode_audio, import_audio, resample_buffer, AudioBuffer, INTERNAL_SAMPLE_RATE};
use crate::error::{HeartflowError, Result};

/// A decoded track bound to a layer
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    entry: CatalogEntry,
    audio: AudioBuffer,
}

impl Track {
    pub fn new(entry: CatalogEntry, audio: AudioBuffer) -> Self {
        Self { entry, audio }
    }

    pub fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    pub fn file_id(&self) -> &str {
        &self.entry.file_id
    }

    pub fn bpm(&self) -> Option<u32> {
        self.entry.bpm
    }

    pub fn audio(&self) -> &AudioBuffer {
        &self.audio
    }

    pub fn duration_ms(&self) -> u64 {
        self.audio.duration_ms()
    }
}

/// Turns a catalog entry into raw audio
pub trait TrackDecoder: Send {
    /// Decode the whole file behind `entry`
    ///
    /// # Errors
    /// Implementations report unreadable files as `DecodeFailure`.
    fn decode(&self, entry: &CatalogEntry) -> Result<AudioBuffer>;
}

/// Decoder for audio files on disk
///
/// WAV files are read with hound; MP3, FLAC, OGG and the other compressed
/// formats go through symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl TrackDecoder for FileDecoder {
    fn decode(&self, entry: &CatalogEntry) -> Result<AudioBuffer> {
        let is_wav = entry
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"));
        let decoded = if is_wav {
            import_audio(&entry.path)
        } else {
            decode_audio(&entry.path)
        };
        decoded.map_err(|e| HeartflowError::DecodeFailure {
            file: entry.file_id.clone(),
            reason: e.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

/// Decodes tracks and prepares them for scheduling
pub struct TrackLoader {
    decoder: Box<dyn TrackDecoder>,
    transport_ms: u64,
    fade_ms: u64,
    target_loudness_dbfs: f32,
}

impl TrackLoader {
    pub fn new(decoder: Box<dyn TrackDecoder>, config: &SessionConfig) -> Self {
        Self {
            decoder,
            transport_ms: config.transport_ms(),
            fade_ms: config.fade_ms(),
            target_loudness_dbfs: config.mix.track_loudness_dbfs,
        }
    }

    /// Decode `entry` and prepare it for playback
    ///
    /// The audio is resampled to the internal rate, made stereo, normalized
    /// to the track loudness and, when shorter than one transport window,
    /// repeated onto itself with a crossfade until it is long enough.
    ///
    /// # Errors
    /// `DecodeFailure` if the decoder fails or yields no samples.
    pub fn load(&self, entry: &CatalogEntry) -> Result<Track> {
        let decoded = self.decoder.decode(entry)?;
        if decoded.is_empty() {
            return Err(HeartflowError::DecodeFailure {
                file: entry.file_id.clone(),
                reason: "decoded audio holds no samples".to_string(),
                source: Some(Box::new(HeartflowError::EmptyAudio)),
            });
        }

        let decoded = if decoded.sample_rate != INTERNAL_SAMPLE_RATE {
            debug!(
                "Resampling {} from {}Hz to {}Hz",
                entry.file_id, decoded.sample_rate, INTERNAL_SAMPLE_RATE
            );
            resample_buffer(&decoded, INTERNAL_SAMPLE_RATE)
        } else {
            decoded
        };

        let mut audio = decoded.to_stereo();
        if audio.normalize_loudness(self.target_loudness_dbfs).is_none() {
            warn!("Track {} is silent; loudness left unchanged", entry.file_id);
        }

        let audio = self.extend_to_transport(audio)?;

        info!(
            "Loaded {} ({} ms, bpm {:?})",
            entry.file_id,
            audio.duration_ms(),
            entry.bpm
        );
        Ok(Track::new(entry.clone(), audio))
    }

    fn extend_to_transport(&self, audio: AudioBuffer) -> Result<AudioBuffer> {
        if audio.duration_ms() >= self.transport_ms {
            return Ok(audio);
        }

        let piece = audio.clone();
        // At most half the piece overlaps, so every pass grows the buffer.
        let overlap_ms = self.fade_ms.min(piece.duration_ms() / 2);
        let mut extended = audio;
        let target = extended.ms_to_samples(self.transport_ms);
        extended.reserve(target.saturating_sub(extended.len()) + piece.len());
        while extended.duration_ms() < self.transport_ms {
            extended.crossfade_append(&piece, overlap_ms)?;
        }
        debug!(
            "Extended short track from {} ms to {} ms",
            piece.duration_ms(),
            extended.duration_ms()
        );
        Ok(extended)
    }
}

impl std::fmt::Debug for TrackLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackLoader")
            .field("transport_ms", &self.transport_ms)
            .field("fade_ms", &self.fade_ms)
            .field("target_loudness_dbfs", &self.target_loudness_dbfs)
            .finish_non_exhaustive()
    }
}
