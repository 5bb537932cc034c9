//! Layer Model Module
//!
//! Implements the three audio layers of a session:
//! - Layer 0: Ambient bed, fixed for the whole session
//! - Layer 1: Melody, replaced when its lookahead runs out
//! - Layer 2: Harmony, replaced on physiological triggers
//!
//! Each layer owns a [`LayerScheduler`] that cuts its track into
//! equal-length segments and a [`SwitchPolicy`] deciding when the track
//! must be replaced.

mod policy;
mod scheduler;
mod state;
mod track;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use policy::{PolicyContext, PolicyOutcome, SwitchPolicy, SwitchReason};
pub use scheduler::{LayerScheduler, ScheduledSegment, SchedulerPhase};
pub use state::LayerState;
pub use track::{FileDecoder, Track, TrackDecoder, TrackLoader};

/// One of the three mixed layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// L0: environmental ambience
    Ambient,
    /// L1: main melody
    Melody,
    /// L2: harmony accompanying the melody
    Harmony,
}

impl Layer {
    /// All layers in mixing order
    pub const ALL: [Layer; 3] = [Layer::Ambient, Layer::Melody, Layer::Harmony];

    /// Position in [`Layer::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Layer::Ambient => 0,
            Layer::Melody => 1,
            Layer::Harmony => 2,
        }
    }

    /// Suffix used in track file names
    pub fn suffix(&self) -> &'static str {
        match self {
            Layer::Ambient => "L0",
            Layer::Melody => "L1",
            Layer::Harmony => "L2",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "L0" => Some(Layer::Ambient),
            "L1" => Some(Layer::Melody),
            "L2" => Some(Layer::Harmony),
            _ => None,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
