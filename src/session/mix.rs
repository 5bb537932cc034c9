//! Layer mixing

use log::{debug, trace};

use crate::config::MixConfig;
use crate::engine::AudioBuffer;
use crate::error::{HeartflowError, Result};
use crate::layers::Layer;

/// Gain offset applied to `layer` before summing
pub fn layer_gain_db(mix: &MixConfig, layer: Layer) -> f32 {
    match layer {
        Layer::Ambient => mix.ambient_gain_db,
        Layer::Melody => mix.melody_gain_db,
        Layer::Harmony => mix.harmony_gain_db,
    }
}

/// Mix one segment per layer into a single output window
///
/// Segments are given in [`Layer::ALL`] order. Each is attenuated by its
/// layer gain, the three are summed and the sum is normalized to the
/// output loudness. A silent sum is returned as is.
///
/// # Errors
/// `SchedulerInvariantViolation` unless all segments have the same length.
pub fn mix_layers(segments: [AudioBuffer; 3], mix: &MixConfig) -> Result<AudioBuffer> {
    let [ambient, melody, harmony] = &segments;
    if ambient.len() != melody.len() || melody.len() != harmony.len() {
        return Err(HeartflowError::SchedulerInvariantViolation {
            ambient: ambient.len(),
            melody: melody.len(),
            harmony: harmony.len(),
        });
    }

    let mut mixed: Option<AudioBuffer> = None;
    for (layer, mut segment) in Layer::ALL.into_iter().zip(segments) {
        let gain_db = layer_gain_db(mix, layer);
        segment.apply_gain(gain_db);
        trace!("{} at {:+.1} dB: {:.2} dBFS", layer, gain_db, segment.loudness_dbfs());
        mixed = Some(match mixed {
            Some(sum) => sum.overlay(&segment)?,
            None => segment,
        });
    }

    let mut mixed = mixed.unwrap_or_default();
    match mixed.normalize_loudness(mix.output_loudness_dbfs) {
        Some(gain_db) => debug!("Mix normalized with {:+.2} dB", gain_db),
        None => debug!("Mix is silent; skipping normalization"),
    }
    Ok(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, ChannelLayout, INTERNAL_SAMPLE_RATE};
    use approx::assert_relative_eq;

    fn tone(frequency: f32, amplitude: f32, secs: f32) -> AudioBuffer {
        generate_test_tone(frequency, amplitude, secs, INTERNAL_SAMPLE_RATE).to_stereo()
    }

    #[test]
    fn test_mix_normalizes_to_output_loudness() {
        let segments = [tone(110.0, 0.3, 10.0), tone(440.0, 0.3, 10.0), tone(660.0, 0.3, 10.0)];
        let mixed = mix_layers(segments, &MixConfig::default()).unwrap();

        assert_eq!(mixed.len(), INTERNAL_SAMPLE_RATE as usize * 10);
        assert_relative_eq!(mixed.loudness_dbfs(), -14.0, epsilon = 0.01);
    }

    #[test]
    fn test_gains_follow_layers() {
        let mix = MixConfig::default();
        let silent = || AudioBuffer::new(4800, ChannelLayout::Stereo);
        let dc = |level: f32| {
            AudioBuffer::from_channels(vec![vec![level; 4800], vec![level; 4800]], INTERNAL_SAMPLE_RATE)
                .unwrap()
        };

        // Opposite polarities: the sign of the sum shows which layer is louder.
        let ambient_vs_harmony = mix_layers([dc(0.1), silent(), dc(-0.1)], &mix).unwrap();
        assert!(ambient_vs_harmony.channel(0)[0] < 0.0);

        let melody_vs_harmony = mix_layers([silent(), dc(0.1), dc(-0.1)], &mix).unwrap();
        assert!(melody_vs_harmony.channel(0)[0] > 0.0);

        assert_eq!(layer_gain_db(&mix, Layer::Harmony), -3.0);
        assert_eq!(layer_gain_db(&mix, Layer::Ambient), -6.0);
    }

    #[test]
    fn test_silent_mix_stays_silent() {
        let silent = || AudioBuffer::new(4800, ChannelLayout::Stereo);
        let mixed = mix_layers([silent(), silent(), silent()], &MixConfig::default()).unwrap();
        assert!(mixed.channel(0).iter().all(|&s| s == 0.0));
        assert!(mixed.is_finite());
    }

    #[test]
    fn test_unequal_lengths_are_rejected() {
        let segments = [
            AudioBuffer::new(4800, ChannelLayout::Stereo),
            AudioBuffer::new(4800, ChannelLayout::Stereo),
            AudioBuffer::new(5760, ChannelLayout::Stereo),
        ];
        let err = mix_layers(segments, &MixConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            HeartflowError::SchedulerInvariantViolation {
                ambient: 4800,
                melody: 4800,
                harmony: 5760
            }
        ));
        assert!(!err.is_recoverable());
    }
}
