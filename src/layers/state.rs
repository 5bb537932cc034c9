//! Per-layer scheduling state

use crate::engine::AudioBuffer;

/// Scheduling state of one layer
///
/// `cursor_end` is the track position (ms) where the lookahead window
/// starts. It is `None` until the current track has produced its first
/// segment. The state is replaced wholesale when the layer switches track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerState {
    pub cursor_end: Option<u64>,
    /// Segment to emit on the next tick, cut one tick in advance
    pub lookahead: Option<AudioBuffer>,
    /// Fade the first segment of the current track in
    pub pending_fade_in: bool,
    /// Above-mean heart-rate ticks seen so far (harmony layer only)
    pub excitation_counter: u32,
}

impl LayerState {
    /// State of a layer that has just been bound to a replacement track
    pub fn after_switch() -> Self {
        Self {
            pending_fade_in: true,
            ..Self::default()
        }
    }

    /// Milliseconds of track left after the cursor, if playback has started
    pub fn remaining_ms(&self, track_duration_ms: u64) -> Option<u64> {
        self.cursor_end
            .map(|cursor| track_duration_ms.saturating_sub(cursor))
    }
}
