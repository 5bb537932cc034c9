//! Session Mixer Module
//!
//! A [`Session`] turns a stream of heart-rate samples into a stream of
//! mixed output windows. Each tick:
//!
//! 1. appends the sample to the heart-rate window
//! 2. loads tracks for layers that have none yet
//! 3. asks each layer's switch policy whether to replace its track
//! 4. cuts one segment per layer
//! 5. mixes the three equal-length segments and normalizes the result
//!
//! A tick is all-or-nothing: every step works on staged copies, and the
//! window, tracks and layer states are only committed once the mix exists.

mod mix;

use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{CatalogEntry, Emotion, TrackCatalog};
use crate::config::SessionConfig;
use crate::engine::AudioBuffer;
use crate::error::{HeartflowError, Result};
use crate::heart::{choose_nearest, HeartRateWindow};
use crate::layers::{
    Layer, LayerScheduler, LayerState, PolicyContext, ScheduledSegment, SwitchPolicy,
    SwitchReason, Track, TrackDecoder, TrackLoader,
};

pub use mix::{layer_gain_db, mix_layers};

/// A track bound to a layer during a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackChange {
    pub layer: Layer,
    pub file_id: String,
    /// `None` for the layer's first track
    pub reason: Option<SwitchReason>,
}

/// Selection result of one layer, not yet committed
enum Staged {
    Keep {
        excitation_counter: u32,
    },
    Replace {
        track: Track,
        state: LayerState,
        reason: Option<SwitchReason>,
    },
}

/// A running playback session for one emotion
pub struct Session {
    id: Uuid,
    emotion: Emotion,
    config: SessionConfig,
    catalog: Box<dyn TrackCatalog>,
    loader: TrackLoader,
    window: HeartRateWindow,
    schedulers: [LayerScheduler; 3],
    policies: [SwitchPolicy; 3],
    rng: StdRng,
    started: Instant,
    ticks: u64,
    last_switches: Vec<TrackChange>,
}

impl Session {
    /// Start a session; the ambient track is chosen and loaded immediately
    ///
    /// # Errors
    /// * `ConfigViolation` - invalid timings, or a transition mode that
    ///   cannot keep the layers the same length
    /// * `CatalogMiss` - no ambient track exists for `emotion`
    /// * `DecodeFailure` - the ambient track could not be decoded
    pub fn new(
        emotion: Emotion,
        config: SessionConfig,
        catalog: Box<dyn TrackCatalog>,
        decoder: Box<dyn TrackDecoder>,
    ) -> Result<Self> {
        Self::with_rng(emotion, config, catalog, decoder, StdRng::from_entropy())
    }

    /// Like [`Session::new`] with an explicit random source for track choice
    pub fn with_rng(
        emotion: Emotion,
        config: SessionConfig,
        catalog: Box<dyn TrackCatalog>,
        decoder: Box<dyn TrackDecoder>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        if !config.transition_mode.keeps_fixed_length() {
            return Err(HeartflowError::ConfigViolation {
                reason: format!(
                    "transition mode '{}' changes segment lengths and cannot be mixed",
                    config.transition_mode
                ),
            });
        }

        let mut session = Self {
            id: Uuid::new_v4(),
            loader: TrackLoader::new(decoder, &config),
            window: HeartRateWindow::new(config.slide_window),
            schedulers: Layer::ALL.map(|layer| LayerScheduler::from_config(layer, &config)),
            policies: Layer::ALL.map(|layer| SwitchPolicy::for_layer(layer, &config)),
            emotion,
            config,
            catalog,
            rng,
            started: Instant::now(),
            ticks: 0,
            last_switches: Vec::new(),
        };

        let entry = session.select(Layer::Ambient, None)?;
        let track = session.loader.load(&entry)?;
        info!(
            "[{}] Session started for '{}' with ambient {}",
            session.id,
            session.emotion,
            track.file_id()
        );
        session.schedulers[Layer::Ambient.index()].load(track);

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn emotion(&self) -> &Emotion {
        &self.emotion
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn window(&self) -> &HeartRateWindow {
        &self.window
    }

    /// Number of ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn scheduler(&self, layer: Layer) -> &LayerScheduler {
        &self.schedulers[layer.index()]
    }

    pub fn current_track(&self, layer: Layer) -> Option<&Track> {
        self.scheduler(layer).track()
    }

    /// Tracks bound during the last successful tick
    pub fn last_switches(&self) -> &[TrackChange] {
        &self.last_switches
    }

    /// True until the heart-rate window spans `memory_min_time`
    pub fn is_warming_up(&self) -> bool {
        self.warming_up_with(&self.window)
    }

    fn warming_up_with(&self, window: &HeartRateWindow) -> bool {
        window.is_empty() || window.span() < self.config.memory_min_time
    }

    /// Run one tick stamped with the time since the session started
    pub fn tick(&mut self, heart_rate: u32) -> Result<AudioBuffer> {
        let timestamp = self.started.elapsed().as_secs_f64();
        self.tick_at(heart_rate, timestamp)
    }

    /// Run one tick with an explicit timestamp in seconds
    ///
    /// Returns one mixed window of `transport_time`. On error nothing is
    /// committed, so the same tick can be retried.
    ///
    /// # Errors
    /// * `CatalogMiss` - a layer needs a track and none is available
    /// * `DecodeFailure` - a selected track could not be decoded
    /// * `SchedulerInvariantViolation` - layer segments differ in length
    pub fn tick_at(&mut self, heart_rate: u32, timestamp: f64) -> Result<AudioBuffer> {
        let mut window = self.window.clone();
        window.append(heart_rate, timestamp);

        let ambient = self.stage(Layer::Ambient, heart_rate, &window, None)?;
        let melody = self.stage(Layer::Melody, heart_rate, &window, None)?;
        let melody_id = match &melody {
            Staged::Replace { track, .. } => Some(track.file_id().to_string()),
            Staged::Keep { .. } => self
                .current_track(Layer::Melody)
                .map(|track| track.file_id().to_string()),
        };
        let harmony = self.stage(Layer::Harmony, heart_rate, &window, melody_id.as_deref())?;

        let planned_ambient = self.plan_layer(Layer::Ambient, &ambient)?;
        let planned_melody = self.plan_layer(Layer::Melody, &melody)?;
        let planned_harmony = self.plan_layer(Layer::Harmony, &harmony)?;

        let mixed = mix_layers(
            [
                planned_ambient.segment,
                planned_melody.segment,
                planned_harmony.segment,
            ],
            &self.config.mix,
        )?;

        // Commit
        let was_warming_up = self.is_warming_up();
        self.window = window;
        self.ticks += 1;
        self.last_switches.clear();
        let commits = [
            (Layer::Ambient, ambient, planned_ambient.next_state),
            (Layer::Melody, melody, planned_melody.next_state),
            (Layer::Harmony, harmony, planned_harmony.next_state),
        ];
        for (layer, staged, next_state) in commits {
            if let Some(change) = self.commit_layer(layer, staged, next_state) {
                self.last_switches.push(change);
            }
        }

        if was_warming_up && !self.is_warming_up() {
            info!("[{}] Warm-up complete after {} ticks", self.id, self.ticks);
        }
        debug!(
            "[{}] Tick {}: hr={} mean={:.1} span={:.1}s",
            self.id,
            self.ticks,
            heart_rate,
            self.window.mean().unwrap_or_default(),
            self.window.span()
        );

        Ok(mixed)
    }

    /// Decide what `layer` plays this tick, loading a track if needed
    fn stage(
        &mut self,
        layer: Layer,
        heart_rate: u32,
        window: &HeartRateWindow,
        melody_id: Option<&str>,
    ) -> Result<Staged> {
        let scheduler = &self.schedulers[layer.index()];
        let Some(current) = scheduler.track() else {
            if !self.warming_up_with(window) {
                debug!("[{}] {} still has no track after warm-up", self.id, layer);
            }
            let entry = self.select_initial(layer, heart_rate, melody_id)?;
            let track = self.loader.load(&entry)?;
            return Ok(Staged::Replace {
                track,
                state: LayerState::default(),
                reason: None,
            });
        };

        let outcome = self.policies[layer.index()].evaluate(&PolicyContext {
            heart_rate,
            window,
            state: scheduler.state(),
            track_duration_ms: current.duration_ms(),
        });
        let Some(reason) = outcome.reason else {
            return Ok(Staged::Keep {
                excitation_counter: outcome.excitation_counter,
            });
        };

        info!(
            "[{}] Switching {} away from {}: {}",
            self.id,
            layer,
            current.file_id(),
            reason
        );
        let entry = self.select(layer, Some(heart_rate))?;
        let track = self.loader.load(&entry)?;
        Ok(Staged::Replace {
            track,
            state: LayerState::after_switch(),
            reason: Some(reason),
        })
    }

    /// First track of a layer; harmony prefers the melody's partner
    fn select_initial(
        &mut self,
        layer: Layer,
        heart_rate: u32,
        melody_id: Option<&str>,
    ) -> Result<CatalogEntry> {
        if let (Layer::Harmony, Some(melody_id)) = (layer, melody_id) {
            if let Some(paired) = self.catalog.find_paired_track(&self.emotion, melody_id)? {
                debug!("[{}] Pairing harmony {} with {}", self.id, paired.file_id, melody_id);
                return Ok(paired);
            }
        }
        self.select(layer, Some(heart_rate))
    }

    /// Pick a catalog entry for `layer`
    ///
    /// Ambient tracks are drawn uniformly. Other layers take the entry whose
    /// bpm is nearest to the heart rate, breaking ties at random.
    fn select(&mut self, layer: Layer, heart_rate: Option<u32>) -> Result<CatalogEntry> {
        let mut entries = self.catalog.list_tracks(&self.emotion, layer)?;

        let index = match (layer, heart_rate) {
            (Layer::Ambient, _) | (_, None) => {
                let indices: Vec<usize> = (0..entries.len()).collect();
                indices.choose(&mut self.rng).copied()
            }
            (_, Some(heart_rate)) => {
                entries.retain(|entry| entry.bpm.is_some());
                let bpms: Vec<u32> = entries.iter().filter_map(|entry| entry.bpm).collect();
                choose_nearest(heart_rate, &bpms, &mut self.rng)
            }
        };

        match index {
            Some(index) => Ok(entries.swap_remove(index)),
            None => Err(HeartflowError::CatalogMiss {
                emotion: self.emotion.to_string(),
                layer: layer.to_string(),
            }),
        }
    }

    fn plan_layer(&self, layer: Layer, staged: &Staged) -> Result<ScheduledSegment> {
        let scheduler = &self.schedulers[layer.index()];
        match staged {
            Staged::Keep { excitation_counter } => {
                let track = scheduler.track().ok_or_else(|| HeartflowError::LayerNotLoaded {
                    layer: layer.to_string(),
                })?;
                let mut planned = scheduler.plan(track, scheduler.state())?;
                planned.next_state.excitation_counter = *excitation_counter;
                Ok(planned)
            }
            Staged::Replace { track, state, .. } => scheduler.plan(track, state),
        }
    }

    fn commit_layer(
        &mut self,
        layer: Layer,
        staged: Staged,
        next_state: LayerState,
    ) -> Option<TrackChange> {
        let scheduler = &mut self.schedulers[layer.index()];
        match staged {
            Staged::Keep { .. } => {
                scheduler.commit(None, next_state);
                None
            }
            Staged::Replace { track, reason, .. } => {
                let change = TrackChange {
                    layer,
                    file_id: track.file_id().to_string(),
                    reason,
                };
                if reason.is_none() {
                    info!("[{}] {} starts with {}", self.id, layer, change.file_id);
                }
                scheduler.commit(Some(track), next_state);
                Some(change)
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("emotion", &self.emotion)
            .field("ticks", &self.ticks)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::config::TransitionMode;
    use crate::engine::{generate_test_tone, INTERNAL_SAMPLE_RATE};

    struct ToneDecoder;

    impl TrackDecoder for ToneDecoder {
        fn decode(&self, _entry: &CatalogEntry) -> Result<AudioBuffer> {
            Ok(generate_test_tone(220.0, 0.5, 5.0, INTERNAL_SAMPLE_RATE))
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            transport_time: 1.0,
            fade_time: 0.25,
            slide_window: 3.0,
            memory_min_time: 2.0,
            ..SessionConfig::default()
        }
    }

    fn catalog(emotion: &Emotion) -> MemoryCatalog {
        MemoryCatalog::new()
            .with_entry(emotion, CatalogEntry::new("rain", "rain.wav", None, Layer::Ambient))
            .with_entry(
                emotion,
                CatalogEntry::new("1_60_pad_L1", "1_60_pad_L1.wav", Some(60), Layer::Melody),
            )
            .with_entry(
                emotion,
                CatalogEntry::new("2_90_harp_L1", "2_90_harp_L1.wav", Some(90), Layer::Melody),
            )
            .with_entry(
                emotion,
                CatalogEntry::new("1_60_pad_L2", "1_60_pad_L2.wav", Some(60), Layer::Harmony),
            )
            .with_entry(
                emotion,
                CatalogEntry::new("3_60_bell_L2", "3_60_bell_L2.wav", Some(60), Layer::Harmony),
            )
    }

    fn session() -> Session {
        let emotion = Emotion::new("peaceful");
        Session::with_rng(
            emotion.clone(),
            config(),
            Box::new(catalog(&emotion)),
            Box::new(ToneDecoder),
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    #[test]
    fn test_select_prefers_nearest_bpm() {
        let mut session = session();
        for _ in 0..10 {
            let entry = session.select(Layer::Melody, Some(95)).unwrap();
            assert_eq!(entry.file_id, "2_90_harp_L1");
        }
    }

    #[test]
    fn test_select_initial_pairs_harmony() {
        let mut session = session();
        for _ in 0..10 {
            let entry = session
                .select_initial(Layer::Harmony, 60, Some("1_60_pad_L1"))
                .unwrap();
            assert_eq!(entry.file_id, "1_60_pad_L2");
        }
    }

    #[test]
    fn test_select_initial_falls_back_to_nearest() {
        let mut session = session();
        let entry = session
            .select_initial(Layer::Harmony, 60, Some("2_90_harp_L1"))
            .unwrap();
        assert!(entry.file_id == "1_60_pad_L2" || entry.file_id == "3_60_bell_L2");
    }

    #[test]
    fn test_crossfade_mode_is_rejected() {
        let emotion = Emotion::new("peaceful");
        let config = SessionConfig {
            transition_mode: TransitionMode::Crossfade,
            ..config()
        };
        let err = Session::new(
            emotion.clone(),
            config,
            Box::new(catalog(&emotion)),
            Box::new(ToneDecoder),
        )
        .unwrap_err();
        assert!(matches!(err, HeartflowError::ConfigViolation { .. }));
    }

    #[test]
    fn test_first_tick_binds_all_layers() {
        let mut session = session();
        assert!(session.current_track(Layer::Melody).is_none());
        assert!(session.is_warming_up());

        let out = session.tick_at(60, 0.0).unwrap();
        assert_eq!(out.len(), INTERNAL_SAMPLE_RATE as usize);
        assert_eq!(session.ticks(), 1);

        let changed: Vec<Layer> = session.last_switches().iter().map(|c| c.layer).collect();
        assert_eq!(changed, vec![Layer::Melody, Layer::Harmony]);
        assert_eq!(
            session.current_track(Layer::Melody).unwrap().file_id(),
            "1_60_pad_L1"
        );
        assert_eq!(
            session.current_track(Layer::Harmony).unwrap().file_id(),
            "1_60_pad_L2"
        );

        session.tick_at(60, 1.0).unwrap();
        assert!(session.last_switches().is_empty());
    }
}
