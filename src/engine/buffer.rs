//! Audio Buffer Management
//!
//! Provides the core audio buffer type used for every track, segment and
//! mixed output window. Decoded tracks are held at 48kHz/32-bit float.
//! All time arguments are milliseconds; they are converted to sample
//! positions with [`AudioBuffer::ms_to_samples`] so that equal durations
//! always produce equal sample counts.

use crate::error::{HeartflowError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Internal sample rate for all decoded tracks (48kHz)
pub const INTERNAL_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS level of an audio buffer in dBFS
///
/// This is the loudness measure used for track and mix normalization.
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.num_samples();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dBFS
///
/// Returns -f32::INFINITY for empty buffers.
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Core audio buffer type for all audio handled by Heartflow
///
/// Stores audio as non-interleaved 32-bit floating point samples.
/// Each channel is a separate Vec<f32>.
///
/// # Example
/// ```
/// use heartflow::engine::buffer::{AudioBuffer, ChannelLayout, INTERNAL_SAMPLE_RATE};
///
/// // Create a 1-second stereo buffer
/// let buffer = AudioBuffer::new(INTERNAL_SAMPLE_RATE as usize, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.duration_ms(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz (default: 48000)
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new silent buffer at the internal sample rate
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self::with_sample_rate(num_samples, layout, INTERNAL_SAMPLE_RATE)
    }

    /// Create a new silent buffer at an explicit sample rate
    pub fn with_sample_rate(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails if the channels differ in length or the channel count is not
    /// mono or stereo.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(HeartflowError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", samples.len()),
            });
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(HeartflowError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `layout` - Channel configuration
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(HeartflowError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_samples = self.len();
        let mut interleaved = Vec::with_capacity(self.channels() * num_samples);

        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Alias for channels() - returns the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias for len() - returns the number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len()
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the duration in whole milliseconds (rounded down)
    #[inline]
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.len() as u128 * 1000 / self.sample_rate as u128) as u64
    }

    /// Convert a millisecond offset to a sample offset (rounded down)
    #[inline]
    pub fn ms_to_samples(&self, ms: u64) -> usize {
        (ms as u128 * self.sample_rate as u128 / 1000) as usize
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get a sample at the specified channel and index
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Loudness of the whole buffer in dBFS (RMS over all channels)
    pub fn loudness_dbfs(&self) -> f32 {
        calculate_rms(self)
    }

    /// Peak level of the whole buffer in dBFS
    pub fn peak_dbfs(&self) -> f32 {
        calculate_peak(self)
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    /// Copy out `len_ms` milliseconds starting at `start_ms`
    ///
    /// The returned buffer always holds exactly `ms_to_samples(len_ms)`
    /// samples per channel, independent of `start_ms`.
    ///
    /// # Errors
    /// `SliceOutOfRange` if the window reaches past the end of the buffer.
    pub fn slice_ms(&self, start_ms: u64, len_ms: u64) -> Result<AudioBuffer> {
        let start = self.ms_to_samples(start_ms);
        let count = self.ms_to_samples(len_ms);

        if start + count > self.len() {
            return Err(HeartflowError::SliceOutOfRange {
                start_ms,
                end_ms: start_ms + len_ms,
                duration_ms: self.duration_ms(),
            });
        }

        Ok(AudioBuffer {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[start..start + count].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        })
    }

    /// Apply a linear fade-in over the first `ms` milliseconds
    ///
    /// The fade is clamped to the buffer length.
    pub fn apply_fade_in(&mut self, ms: u64) {
        let count = self.ms_to_samples(ms).min(self.len());
        if count == 0 {
            return;
        }
        for channel in &mut self.samples {
            for (i, sample) in channel.iter_mut().take(count).enumerate() {
                *sample *= i as f32 / count as f32;
            }
        }
    }

    /// Apply a linear fade-out over the last `ms` milliseconds
    ///
    /// The fade is clamped to the buffer length. The final sample is silent.
    pub fn apply_fade_out(&mut self, ms: u64) {
        let len = self.len();
        let count = self.ms_to_samples(ms).min(len);
        if count == 0 {
            return;
        }
        let start = len - count;
        for channel in &mut self.samples {
            for (i, sample) in channel[start..].iter_mut().enumerate() {
                *sample *= (count - 1 - i) as f32 / count as f32;
            }
        }
    }

    /// Apply gain to all samples
    ///
    /// # Arguments
    /// * `gain_db` - Gain in decibels
    pub fn apply_gain(&mut self, gain_db: f32) {
        let gain_linear = db_to_linear(gain_db);
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= gain_linear;
            }
        }
    }

    /// Apply a uniform gain that brings the loudness to `target_dbfs`
    ///
    /// Silent buffers are left untouched. Returns the gain applied in dB.
    pub fn normalize_loudness(&mut self, target_dbfs: f32) -> Option<f32> {
        let measured = self.loudness_dbfs();
        if !measured.is_finite() {
            return None;
        }
        let gain_db = target_dbfs - measured;
        self.apply_gain(gain_db);
        Some(gain_db)
    }

    /// Append `other` directly after this buffer
    pub fn append(&mut self, other: &AudioBuffer) -> Result<()> {
        self.check_compatible(other)?;
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            dst.extend_from_slice(src);
        }
        Ok(())
    }

    /// Reserve room for at least `additional` more samples per channel
    pub fn reserve(&mut self, additional: usize) {
        for channel in &mut self.samples {
            channel.reserve(additional);
        }
    }

    /// Join `other` after this buffer in place, overlapping the last `ms`
    /// milliseconds of this buffer with the first `ms` of `other` using
    /// linear fades
    ///
    /// The overlap is clamped to the shorter of the two buffers, so the buffer
    /// grows by `other.len() - overlap` samples. Only the overlap and the new
    /// tail are touched.
    pub fn crossfade_append(&mut self, other: &AudioBuffer, ms: u64) -> Result<()> {
        self.check_compatible(other)?;

        let overlap = self.ms_to_samples(ms).min(self.len()).min(other.len());
        let head = self.len() - overlap;

        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            for i in 0..overlap {
                let ratio = (i + 1) as f32 / (overlap + 1) as f32;
                dst[head + i] = dst[head + i] * (1.0 - ratio) + src[i] * ratio;
            }
            dst.extend_from_slice(&src[overlap..]);
        }
        Ok(())
    }

    /// Sum `other` into a copy of this buffer
    ///
    /// # Errors
    /// `LengthMismatch` unless both buffers have the same length, channel
    /// count and sample rate.
    pub fn overlay(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        self.check_compatible(other)?;
        if self.len() != other.len() {
            return Err(self.mismatch(other));
        }

        let samples = self
            .samples
            .iter()
            .zip(&other.samples)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x + y).collect())
            .collect();

        Ok(AudioBuffer {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    /// Convert to stereo by duplicating a mono channel
    pub fn to_stereo(mut self) -> AudioBuffer {
        if self.channels() == 1 {
            let mono = self.samples[0].clone();
            self.samples.push(mono);
        }
        self
    }

    fn check_compatible(&self, other: &AudioBuffer) -> Result<()> {
        if self.channels() != other.channels() || self.sample_rate != other.sample_rate {
            return Err(self.mismatch(other));
        }
        Ok(())
    }

    fn mismatch(&self, other: &AudioBuffer) -> HeartflowError {
        HeartflowError::LengthMismatch {
            left: self.shape(),
            right: other.shape(),
        }
    }

    fn shape(&self) -> String {
        format!("{}ch x {} @ {}Hz", self.channels(), self.len(), self.sample_rate)
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Helper to create a buffer with known content
    fn create_test_buffer(samples: Vec<Vec<f32>>) -> AudioBuffer {
        AudioBuffer {
            samples,
            sample_rate: INTERNAL_SAMPLE_RATE,
        }
    }

    // One sample per millisecond keeps the arithmetic readable
    fn ms_buffer(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer {
            samples: vec![samples],
            sample_rate: 1000,
        }
    }

    // ------------------------------------------------------------------------
    // Unit conversion tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_db_to_linear() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0) - 0.0).abs() < 1e-6);
        assert!((linear_to_db(0.1) - (-20.0)).abs() < 1e-4);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    // ------------------------------------------------------------------------
    // Level tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_loudness_of_constant_signal() {
        let buffer = create_test_buffer(vec![vec![0.1; 1000], vec![0.1; 1000]]);
        assert_relative_eq!(buffer.loudness_dbfs(), -20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_loudness_of_silence() {
        let buffer = AudioBuffer::new(1000, ChannelLayout::Mono);
        let loudness = buffer.loudness_dbfs();
        assert!(loudness.is_infinite() && loudness.is_sign_negative());
    }

    #[test]
    fn test_peak_negative() {
        let mut samples = vec![0.0; 1000];
        samples[500] = -0.5;
        let buffer = create_test_buffer(vec![samples]);
        assert!((buffer.peak_dbfs() - (-6.02)).abs() < 0.1);
    }

    // ------------------------------------------------------------------------
    // Timing tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_duration_ms() {
        let buffer = AudioBuffer::new(INTERNAL_SAMPLE_RATE as usize * 3, ChannelLayout::Mono);
        assert_eq!(buffer.duration_ms(), 3000);
        assert_eq!(buffer.ms_to_samples(10), 480);

        let odd = AudioBuffer::with_sample_rate(44_101, ChannelLayout::Mono, 44_100);
        assert_eq!(odd.duration_ms(), 1000);
    }

    #[test]
    fn test_slice_has_exact_length_at_any_offset() {
        let buffer = AudioBuffer::with_sample_rate(44_100 * 5, ChannelLayout::Stereo, 44_100);
        let expected = buffer.ms_to_samples(1000);
        for start in [0, 1, 7, 333, 1234, 3999] {
            let slice = buffer.slice_ms(start, 1000).unwrap();
            assert_eq!(slice.len(), expected, "slice at {} ms", start);
            assert_eq!(slice.channels(), 2);
        }
    }

    #[test]
    fn test_slice_copies_the_right_window() {
        let buffer = ms_buffer((0..10).map(|v| v as f32).collect());
        let slice = buffer.slice_ms(3, 4).unwrap();
        assert_eq!(slice.channel(0), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_slice_out_of_range() {
        let buffer = ms_buffer(vec![0.0; 10]);
        assert!(buffer.slice_ms(6, 4).is_ok());
        let err = buffer.slice_ms(7, 4).unwrap_err();
        assert!(matches!(
            err,
            HeartflowError::SliceOutOfRange {
                start_ms: 7,
                end_ms: 11,
                duration_ms: 10
            }
        ));
    }

    // ------------------------------------------------------------------------
    // Fade tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_fade_in_ramps_from_silence() {
        let mut buffer = ms_buffer(vec![1.0; 10]);
        buffer.apply_fade_in(4);
        assert_eq!(buffer.channel(0)[0], 0.0);
        assert_relative_eq!(buffer.channel(0)[2], 0.5);
        assert_eq!(buffer.channel(0)[4], 1.0);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_fade_out_ends_silent() {
        let mut buffer = ms_buffer(vec![1.0; 10]);
        buffer.apply_fade_out(4);
        assert_eq!(buffer.channel(0)[5], 1.0);
        assert_relative_eq!(buffer.channel(0)[6], 0.75);
        assert_eq!(buffer.channel(0)[9], 0.0);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_fade_longer_than_buffer_is_clamped() {
        let mut buffer = ms_buffer(vec![1.0; 4]);
        buffer.apply_fade_in(100);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.channel(0)[0], 0.0);
    }

    // ------------------------------------------------------------------------
    // Combining tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_buffer_apply_gain() {
        let mut buffer = create_test_buffer(vec![vec![0.5; 100]]);
        buffer.apply_gain(-6.0206);
        let sample = buffer.get_sample(0, 0).unwrap();
        assert!((sample - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_normalize_loudness() {
        let mut buffer = create_test_buffer(vec![vec![0.3; 480], vec![-0.3; 480]]);
        let gain = buffer.normalize_loudness(-20.0).unwrap();
        assert!(gain < 0.0);
        assert_relative_eq!(buffer.loudness_dbfs(), -20.0, epsilon = 1e-3);

        let mut silent = AudioBuffer::new(480, ChannelLayout::Stereo);
        assert_eq!(silent.normalize_loudness(-20.0), None);
        assert!(silent.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_overlay_sums_samples() {
        let a = ms_buffer(vec![0.25; 5]);
        let b = ms_buffer(vec![0.5; 5]);
        let mixed = a.overlay(&b).unwrap();
        assert_eq!(mixed.channel(0), &[0.75; 5]);
    }

    #[test]
    fn test_overlay_rejects_unequal_lengths() {
        let a = ms_buffer(vec![0.0; 5]);
        let b = ms_buffer(vec![0.0; 6]);
        assert!(matches!(
            a.overlay(&b),
            Err(HeartflowError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_crossfade_append_length() {
        let mut joined = ms_buffer(vec![1.0; 10]);
        let b = ms_buffer(vec![0.0; 10]);
        joined.crossfade_append(&b, 4).unwrap();
        assert_eq!(joined.len(), 16);
        assert_eq!(joined.channel(0)[5], 1.0);
        assert!(joined.channel(0)[6] < 1.0 && joined.channel(0)[9] > 0.0);
        assert_eq!(joined.channel(0)[10], 0.0);
    }

    #[test]
    fn test_crossfade_append_without_overlap_appends() {
        let mut joined = ms_buffer(vec![1.0; 3]);
        joined.reserve(4);
        joined.crossfade_append(&ms_buffer(vec![2.0; 2]), 0).unwrap();
        assert_eq!(joined.channel(0), &[1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_append() {
        let mut a = ms_buffer(vec![1.0; 3]);
        a.append(&ms_buffer(vec![2.0; 2])).unwrap();
        assert_eq!(a.channel(0), &[1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_to_stereo() {
        let stereo = ms_buffer(vec![0.3; 4]).to_stereo();
        assert_eq!(stereo.channels(), 2);
        assert_eq!(stereo.channel(0), stereo.channel(1));
    }

    #[test]
    fn test_buffer_from_interleaved_stereo() {
        let interleaved = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let buffer = AudioBuffer::from_interleaved(
            &interleaved,
            ChannelLayout::Stereo,
            INTERNAL_SAMPLE_RATE,
        )
        .unwrap();

        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_sample(0, 1), Some(0.3));
        assert_eq!(buffer.get_sample(1, 1), Some(0.4));
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_channels_rejects_ragged_input() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 3], vec![0.0; 4]], 1000);
        assert!(result.is_err());
        let result = AudioBuffer::from_channels(vec![vec![0.0; 3]; 3], 1000);
        assert!(matches!(
            result,
            Err(HeartflowError::UnsupportedFormat { .. })
        ));
    }
}
