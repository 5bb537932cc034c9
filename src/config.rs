//! Session configuration
//!
//! An immutable set of timing, mixing and rule parameters, loaded once from
//! JSON and validated before any session exists. Times are seconds.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HeartflowError, Result};

/// How a layer behaves when its lookahead window runs past the end of the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Fade the last segment out and the restarted segment in
    #[default]
    Fade,
    /// Jump straight back to the start (audible seam)
    Direct,
    /// Widen the restarted window by the fade time.
    /// Segments are no longer `transport_time` long, so layered sessions
    /// reject this mode.
    Crossfade,
}

impl TransitionMode {
    /// True if every segment produced under this mode is exactly one
    /// transport window long
    pub fn keeps_fixed_length(&self) -> bool {
        !matches!(self, TransitionMode::Crossfade)
    }
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionMode::Fade => write!(f, "fade"),
            TransitionMode::Direct => write!(f, "direct"),
            TransitionMode::Crossfade => write!(f, "crossfade"),
        }
    }
}

/// Gain offsets and loudness targets, all in dB / dBFS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub ambient_gain_db: f32,
    pub melody_gain_db: f32,
    pub harmony_gain_db: f32,
    /// Loudness every track is normalized to when loaded
    pub track_loudness_dbfs: f32,
    /// Loudness of each mixed output window
    pub output_loudness_dbfs: f32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            ambient_gain_db: -6.0,
            melody_gain_db: 0.0,
            harmony_gain_db: -3.0,
            track_loudness_dbfs: -20.0,
            output_loudness_dbfs: -14.0,
        }
    }
}

/// Heart-rate band with its tolerated swing
///
/// Applies to heart rates in `[min_bpm, max_bpm)`; `max_bpm = None` is
/// unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingBand {
    pub min_bpm: u32,
    pub max_bpm: Option<u32>,
    /// Largest window amplitude (max - min) that does not force a switch
    pub max_amplitude: u32,
}

impl SwingBand {
    pub fn contains(&self, heart_rate: u32) -> bool {
        heart_rate >= self.min_bpm && self.max_bpm.map_or(true, |max| heart_rate < max)
    }
}

/// Parameters of the harmony layer's physiological switch rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyRules {
    /// Number of above-mean ticks that force a switch
    pub excitation_trigger: u32,
    pub swing_bands: Vec<SwingBand>,
}

impl Default for HarmonyRules {
    fn default() -> Self {
        Self {
            excitation_trigger: 3,
            swing_bands: vec![
                SwingBand {
                    min_bpm: 65,
                    max_bpm: Some(85),
                    max_amplitude: 4,
                },
                SwingBand {
                    min_bpm: 85,
                    max_bpm: Some(105),
                    max_amplitude: 7,
                },
                SwingBand {
                    min_bpm: 105,
                    max_bpm: None,
                    max_amplitude: 11,
                },
            ],
        }
    }
}

impl HarmonyRules {
    /// True if `amplitude` is too large for the band `heart_rate` falls in.
    /// Heart rates outside every band never trigger.
    pub fn swing_exceeded(&self, heart_rate: u32, amplitude: u32) -> bool {
        self.swing_bands
            .iter()
            .any(|band| band.contains(heart_rate) && amplitude > band.max_amplitude)
    }
}

/// Immutable session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of one output window
    pub transport_time: f64,
    /// Length of fades and crossfades
    pub fade_time: f64,
    /// Heart-rate window length; also the span the harmony rules wait for
    pub slide_window: f64,
    /// Window span after which lazy track initialization is complete
    pub memory_min_time: f64,
    /// Root folder of the track library
    pub sound_folders_root: PathBuf,
    pub transition_mode: TransitionMode,
    pub mix: MixConfig,
    pub harmony_rules: HarmonyRules,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport_time: 10.0,
            fade_time: 3.0,
            slide_window: 30.0,
            memory_min_time: 20.0,
            sound_folders_root: PathBuf::from("sounds"),
            transition_mode: TransitionMode::default(),
            mix: MixConfig::default(),
            harmony_rules: HarmonyRules::default(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file and validate it
    ///
    /// A relative `sound_folders_root` is resolved against the directory that
    /// holds the config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HeartflowError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }

        let reader = BufReader::new(File::open(path)?);
        let mut config: SessionConfig = serde_json::from_reader(reader)?;

        if config.sound_folders_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.sound_folders_root = base.join(&config.sound_folders_root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every constraint between the parameters
    pub fn validate(&self) -> Result<()> {
        let times = [
            ("transport_time", self.transport_time),
            ("fade_time", self.fade_time),
            ("slide_window", self.slide_window),
            ("memory_min_time", self.memory_min_time),
        ];
        for (name, value) in times {
            if !value.is_finite() || value < 0.0 {
                return Err(violation(format!(
                    "{} must be a non-negative number of seconds (got {})",
                    name, value
                )));
            }
        }

        if self.transport_ms() == 0 {
            return Err(violation("transport_time must be at least 1 ms".to_string()));
        }
        if self.fade_time >= self.transport_time {
            return Err(violation(format!(
                "fade_time ({}) must be shorter than transport_time ({})",
                self.fade_time, self.transport_time
            )));
        }
        if self.transport_time >= self.slide_window {
            return Err(violation(format!(
                "transport_time ({}) must be shorter than slide_window ({})",
                self.transport_time, self.slide_window
            )));
        }
        if self.harmony_rules.excitation_trigger == 0 {
            return Err(violation("excitation_trigger must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Transport window in milliseconds
    pub fn transport_ms(&self) -> u64 {
        secs_to_ms(self.transport_time)
    }

    /// Fade length in milliseconds
    pub fn fade_ms(&self) -> u64 {
        secs_to_ms(self.fade_time)
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

fn violation(reason: String) -> HeartflowError {
    HeartflowError::ConfigViolation { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use test_case::test_case;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport_ms(), 10_000);
        assert_eq!(config.fade_ms(), 3_000);
    }

    #[test_case(10.0, 10.0, 30.0 ; "fade equals transport")]
    #[test_case(10.0, 12.0, 30.0 ; "fade longer than transport")]
    #[test_case(30.0, 3.0, 30.0 ; "transport equals slide window")]
    #[test_case(40.0, 3.0, 30.0 ; "transport longer than slide window")]
    #[test_case(10.0, -1.0, 30.0 ; "negative fade")]
    #[test_case(f64::NAN, 3.0, 30.0 ; "nan transport")]
    fn test_invalid_timing(transport: f64, fade: f64, slide: f64) {
        let config = SessionConfig {
            transport_time: transport,
            fade_time: fade,
            slide_window: slide,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HeartflowError::ConfigViolation { .. })
        ));
    }

    #[test]
    fn test_zero_excitation_trigger_rejected() {
        let mut config = SessionConfig::default();
        config.harmony_rules.excitation_trigger = 0;
        assert!(config.validate().is_err());
    }

    #[test_case(64, 100, false ; "below every band")]
    #[test_case(65, 4, false ; "low band at limit")]
    #[test_case(65, 5, true ; "low band over limit")]
    #[test_case(84, 5, true ; "top of low band")]
    #[test_case(85, 7, false ; "mid band at limit")]
    #[test_case(104, 8, true ; "mid band over limit")]
    #[test_case(105, 11, false ; "high band at limit")]
    #[test_case(180, 12, true ; "high band over limit")]
    fn test_swing_bands(heart_rate: u32, amplitude: u32, expected: bool) {
        let rules = HarmonyRules::default();
        assert_eq!(rules.swing_exceeded(heart_rate, amplitude), expected);
    }

    #[test]
    fn test_load_resolves_relative_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "transport_time": 8,
                "fade_time": 2,
                "slide_window": 24,
                "memory_min_time": 16,
                "sound_folders_root": "library",
                "transition_mode": "direct"
            }"#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.transport_ms(), 8_000);
        assert_eq!(config.transition_mode, TransitionMode::Direct);
        assert_eq!(config.sound_folders_root, dir.path().join("library"));
        assert_eq!(config.mix, MixConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "transport_time": 10, "fade_time": 12 }"#).unwrap();

        assert!(matches!(
            SessionConfig::load(&path),
            Err(HeartflowError::ConfigViolation { .. })
        ));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ transport_time: ").unwrap();

        assert!(matches!(
            SessionConfig::load(&path),
            Err(HeartflowError::Serialization(_))
        ));
    }
}
