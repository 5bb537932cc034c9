//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::{Emotion, FolderCatalog, TrackCatalog};
use crate::config::SessionConfig;
use crate::engine::{export_audio, AudioBuffer, ChannelLayout, ExportFormat, INTERNAL_SAMPLE_RATE};
use crate::error::{HeartflowError, Result};
use crate::layers::{FileDecoder, Layer};
use crate::session::Session;

/// Parse a heart-rate series: one bpm per line, `#` starts a comment.
pub fn parse_heart_rates(text: &str) -> Result<Vec<u32>> {
    let mut rates = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let value = line.split('#').next().unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }
        let rate = value
            .parse::<u32>()
            .map_err(|e| HeartflowError::InvalidHeartRate {
                line: number + 1,
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        rates.push(rate);
    }
    Ok(rates)
}

/// Read a heart-rate series from a file.
pub fn read_heart_rates(path: &Path) -> Result<Vec<u32>> {
    if !path.exists() {
        return Err(HeartflowError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }
    parse_heart_rates(&std::fs::read_to_string(path)?)
}

fn default_output_path(emotion: &Emotion) -> PathBuf {
    PathBuf::from(format!(
        "heartflow_{}_{}.wav",
        emotion,
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Render a whole session offline and write it as one WAV file.
///
/// Heart rates are fed one per tick, stamped `transport_time` apart.
/// Returns the path written.
pub fn render(
    config_path: &Path,
    emotion: &str,
    heart_rates: &Path,
    output: Option<&Path>,
    bit_depth: u16,
    seed: Option<u64>,
) -> Result<PathBuf> {
    let config = SessionConfig::load(config_path)?;
    let rates = read_heart_rates(heart_rates)?;
    if rates.is_empty() {
        warn!("No heart rates in {}", heart_rates.display());
    }

    let emotion = Emotion::new(emotion);
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&emotion));
    let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let step = config.transport_time;

    info!(
        "Rendering {} ticks for '{}' from {}",
        rates.len(),
        emotion,
        config.sound_folders_root.display()
    );

    let catalog = FolderCatalog::new(config.sound_folders_root.clone());
    let mut session = Session::with_rng(
        emotion,
        config,
        Box::new(catalog),
        Box::new(FileDecoder),
        rng,
    )?;

    let mut rendered = AudioBuffer::new(0, ChannelLayout::Stereo);
    for (i, &heart_rate) in rates.iter().enumerate() {
        let window = session.tick_at(heart_rate, i as f64 * step)?;
        for change in session.last_switches() {
            match &change.reason {
                Some(reason) => println!(
                    "[{:>4}] {} -> {} ({})",
                    i, change.layer, change.file_id, reason
                ),
                None => println!("[{:>4}] {} -> {}", i, change.layer, change.file_id),
            }
        }
        rendered.append(&window)?;
    }

    export_audio(
        &rendered,
        &output_path,
        ExportFormat::new(INTERNAL_SAMPLE_RATE, bit_depth),
    )?;

    println!(
        "Rendered {:.1}s to {}",
        rendered.duration_secs(),
        output_path.display()
    );
    Ok(output_path)
}

/// Print the tracks available to each layer of an emotion.
pub fn catalog(config_path: &Path, emotion: &str) -> Result<()> {
    let config = SessionConfig::load(config_path)?;
    let catalog = FolderCatalog::new(config.sound_folders_root.clone());
    let emotion = Emotion::new(emotion);

    println!("Library: {}", catalog.root().display());
    println!("Emotion: {}", emotion);
    println!("{:-<60}", "");

    for layer in Layer::ALL {
        let entries = catalog.list_tracks(&emotion, layer)?;
        println!("{} ({} tracks)", layer, entries.len());
        for entry in entries {
            match entry.bpm {
                Some(bpm) => println!("  {:<32} {:>4} bpm", entry.file_id, bpm),
                None => println!("  {:<32}    -", entry.file_id),
            }
        }
    }

    Ok(())
}

/// Validate a configuration file and print the effective values.
pub fn check_config(config_path: &Path) -> Result<()> {
    let config = SessionConfig::load(config_path)?;

    println!("Configuration OK: {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);

    if !config.transition_mode.keeps_fixed_length() {
        println!();
        println!(
            "Note: transition mode '{}' cannot be used for layered sessions",
            config.transition_mode
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, import_audio};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_parse_heart_rates_skips_comments() {
        let text = "# resting\n62\n\n64 # after a breath\n  66  \n";
        assert_eq!(parse_heart_rates(text).unwrap(), vec![62, 64, 66]);
    }

    #[test]
    fn test_parse_heart_rates_rejects_garbage() {
        match parse_heart_rates("62\nfast\n").unwrap_err() {
            HeartflowError::InvalidHeartRate { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_config_rejects_invalid_timing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "transport_time": 5.0, "fade_time": 6.0 }"#).unwrap();

        let err = check_config(&path).unwrap_err();
        assert!(matches!(err, HeartflowError::ConfigViolation { .. }));
    }

    #[test]
    fn test_render_writes_one_window_per_heart_rate() {
        let dir = tempdir().unwrap();
        let peaceful = dir.path().join("sounds").join("peaceful");
        std::fs::create_dir_all(&peaceful).unwrap();
        for (name, frequency) in [
            ("1_60_pad_L0.wav", 110.0),
            ("1_60_pad_L1.wav", 220.0),
            ("1_60_pad_L2.wav", 330.0),
        ] {
            let tone = generate_test_tone(frequency, 0.5, 4.0, INTERNAL_SAMPLE_RATE);
            export_audio(&tone, &peaceful.join(name), ExportFormat::default()).unwrap();
        }

        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "transport_time": 1.0,
                "fade_time": 0.25,
                "slide_window": 3.0,
                "memory_min_time": 2.0,
                "sound_folders_root": "sounds"
            }"#,
        )
        .unwrap();

        let rates_path = dir.path().join("rates.txt");
        std::fs::write(&rates_path, "60\n61\n62\n61\n60\n60\n").unwrap();

        let output = dir.path().join("session.wav");
        let written = render(
            &config_path,
            "peaceful",
            &rates_path,
            Some(&output),
            16,
            Some(42),
        )
        .unwrap();

        assert_eq!(written, output);
        let audio = import_audio(&output).unwrap();
        assert_eq!(audio.len(), 6 * INTERNAL_SAMPLE_RATE as usize);
        assert_eq!(audio.channels(), 2);
    }
}
