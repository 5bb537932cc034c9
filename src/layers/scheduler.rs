//! Per-layer segment scheduler
//!
//! Cuts the layer's current track into consecutive segments of exactly one
//! transport window. Each tick emits the segment cut on the previous tick
//! and cuts the next one (the lookahead). When the lookahead would run past
//! the end of the track, the layer loops back to the start of the track
//! using the configured [`TransitionMode`].
//!
//! Planning is separate from committing: [`LayerScheduler::plan`] is a pure
//! function of a track and a state, so a caller can compute every layer's
//! next segment and only commit once all of them succeeded.

use log::debug;

use super::{Layer, LayerState, Track};
use crate::config::{SessionConfig, TransitionMode};
use crate::engine::AudioBuffer;
use crate::error::{HeartflowError, Result};

/// Coarse lifecycle of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No track bound yet
    Unbound,
    /// Track bound, no segment produced from it yet
    Uninitialized,
    /// Emitting segments from the bound track
    Playing,
}

/// One planned tick of a layer
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledSegment {
    /// Segment to emit now
    pub segment: AudioBuffer,
    /// State to commit once the tick succeeds
    pub next_state: LayerState,
    /// The lookahead wrapped to the start of the track
    pub looped: bool,
}

/// Segment scheduler of one layer
#[derive(Debug, Clone)]
pub struct LayerScheduler {
    layer: Layer,
    transport_ms: u64,
    fade_ms: u64,
    mode: TransitionMode,
    track: Option<Track>,
    state: LayerState,
}

impl LayerScheduler {
    pub fn new(layer: Layer, transport_ms: u64, fade_ms: u64, mode: TransitionMode) -> Self {
        Self {
            layer,
            transport_ms,
            fade_ms,
            mode,
            track: None,
            state: LayerState::default(),
        }
    }

    pub fn from_config(layer: Layer, config: &SessionConfig) -> Self {
        Self::new(
            layer,
            config.transport_ms(),
            config.fade_ms(),
            config.transition_mode,
        )
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn transport_ms(&self) -> u64 {
        self.transport_ms
    }

    pub fn mode(&self) -> TransitionMode {
        self.mode
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub fn phase(&self) -> SchedulerPhase {
        match (&self.track, self.state.cursor_end) {
            (None, _) => SchedulerPhase::Unbound,
            (Some(_), None) => SchedulerPhase::Uninitialized,
            (Some(_), Some(_)) => SchedulerPhase::Playing,
        }
    }

    /// Bind the layer's first track; it starts without a fade-in
    pub fn load(&mut self, track: Track) {
        self.commit(Some(track), LayerState::default());
    }

    /// Replace the current track; its first segment fades in
    pub fn switch_to(&mut self, track: Track) {
        self.commit(Some(track), LayerState::after_switch());
    }

    /// Install a planned state, optionally together with a new track
    pub fn commit(&mut self, track: Option<Track>, state: LayerState) {
        if let Some(track) = track {
            self.track = Some(track);
        }
        self.state = state;
    }

    /// Produce the next segment from the bound track and advance
    ///
    /// # Errors
    /// `LayerNotLoaded` if no track is bound.
    pub fn tick(&mut self) -> Result<AudioBuffer> {
        let track = self.track.as_ref().ok_or_else(|| HeartflowError::LayerNotLoaded {
            layer: self.layer.to_string(),
        })?;
        let planned = self.plan(track, &self.state)?;
        self.state = planned.next_state;
        Ok(planned.segment)
    }

    /// Compute the segment `track` yields from `state` without mutating
    /// anything
    ///
    /// # Errors
    /// `MissingLookahead` if the state has a cursor but no lookahead, and
    /// `SliceOutOfRange` if the track is shorter than one transport window.
    pub fn plan(&self, track: &Track, state: &LayerState) -> Result<ScheduledSegment> {
        let transport = self.transport_ms;
        let audio = track.audio();

        let (window_start, mut segment) = match state.cursor_end {
            None => {
                let mut segment = audio.slice_ms(0, transport)?;
                if state.pending_fade_in {
                    segment.apply_fade_in(self.fade_ms);
                }
                (0, segment)
            }
            Some(cursor) => {
                let segment = state.lookahead.clone().ok_or_else(|| {
                    HeartflowError::MissingLookahead {
                        layer: self.layer.to_string(),
                    }
                })?;
                (cursor, segment)
            }
        };

        let window_end = window_start + transport;
        let looped = window_end + transport > track.duration_ms();

        let (cursor_end, lookahead) = if looped {
            debug!(
                "{} loops {} at {} ms ({} mode)",
                self.layer,
                track.file_id(),
                window_end,
                self.mode
            );
            (0, self.loop_lookahead(audio, &mut segment)?)
        } else {
            (window_end, audio.slice_ms(window_end, transport)?)
        };

        Ok(ScheduledSegment {
            segment,
            next_state: LayerState {
                cursor_end: Some(cursor_end),
                lookahead: Some(lookahead),
                pending_fade_in: false,
                excitation_counter: state.excitation_counter,
            },
            looped,
        })
    }

    /// Lookahead taken from the start of the track; may fade `segment` out
    fn loop_lookahead(&self, audio: &AudioBuffer, segment: &mut AudioBuffer) -> Result<AudioBuffer> {
        match self.mode {
            TransitionMode::Fade => {
                segment.apply_fade_out(self.fade_ms);
                let mut lookahead = audio.slice_ms(0, self.transport_ms)?;
                lookahead.apply_fade_in(self.fade_ms);
                Ok(lookahead)
            }
            TransitionMode::Direct => audio.slice_ms(0, self.transport_ms),
            // Widened by one fade; the next segment is longer than a window.
            TransitionMode::Crossfade => {
                let len = (self.transport_ms + self.fade_ms).min(audio.duration_ms());
                audio.slice_ms(0, len)
            }
        }
    }
}
