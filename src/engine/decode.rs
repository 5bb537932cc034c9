//! Compressed audio decoding
//!
//! Track libraries are often MP3 rather than WAV. Everything that is not a
//! WAV file goes through symphonia:
//! - MP3, AAC/M4A (lossy)
//! - FLAC (lossless)
//! - OGG Vorbis, AIFF

use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;
use crate::error::{HeartflowError, Result};

/// File extensions the track library may use (compared case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aiff"];

/// Whether `path` names a file with one of [`AUDIO_EXTENSIONS`]
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn invalid(context: &str, err: SymphoniaError) -> HeartflowError {
    HeartflowError::InvalidAudio {
        reason: format!("{}: {}", context, err),
        source: Some(Box::new(err)),
    }
}

/// Decode any supported audio file into a buffer at its native sample rate
///
/// Corrupt packets are skipped; the rest of the stream is still decoded.
///
/// # Errors
/// * `FileNotFound` - the file does not exist
/// * `InvalidAudio` - the format cannot be probed or the stream cannot be read
/// * `EmptyAudio` - the stream holds no samples
/// * `UnsupportedFormat` - more than two channels
pub fn decode_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(HeartflowError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| invalid("failed to probe format", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| HeartflowError::InvalidAudio {
            reason: "no audio track found".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| HeartflowError::InvalidAudio {
            reason: "stream does not declare a sample rate".to_string(),
            source: None,
        })?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| invalid("failed to create decoder", e))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(invalid("failed to read packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), reason);
                continue;
            }
            Err(e) => return Err(invalid("decode error", e)),
        };

        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        let spec = *decoded.spec();
        let count = spec.channels.count();
        if channels.is_empty() {
            channels = vec![Vec::new(); count];
        } else if channels.len() != count {
            return Err(HeartflowError::InvalidAudio {
                reason: format!(
                    "channel count changed from {} to {} mid-stream",
                    channels.len(),
                    count
                ),
                source: None,
            });
        }

        // Planar copy: each channel occupies `frames` consecutive samples
        let mut planar = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        planar.copy_planar_ref(decoded);
        for (plane, out) in planar.samples().chunks_exact(frames).zip(channels.iter_mut()) {
            out.extend_from_slice(plane);
        }
    }

    if channels.first().map_or(true, Vec::is_empty) {
        return Err(HeartflowError::EmptyAudio);
    }

    let buffer = AudioBuffer::from_channels(channels, sample_rate)?;
    debug!(
        "Decoded {}: {}Hz, {} channel(s), {} ms",
        path.display(),
        sample_rate,
        buffer.channels(),
        buffer.duration_ms()
    );
    Ok(buffer)
}
