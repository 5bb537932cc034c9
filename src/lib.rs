//! Heartflow - Heart-Rate Driven Layered Music
//!
//! Heartflow generates a continuous audio stream for biofeedback relaxation.
//! Live heart-rate samples drive the selection and looping of three audio
//! layers which are mixed into fixed-length output windows.
//!
//! # Architecture
//!
//! The system uses a three-layer model:
//! - Layer 0: Ambient bed, chosen once per session
//! - Layer 1: Melody, matched to the heart rate and replaced before it runs out
//! - Layer 2: Harmony, paired with the melody and replaced on physiological
//!   triggers
//!
//! A [`Session`] is driven by calling [`Session::tick`] once per transport
//! window with the latest heart rate.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod heart;
pub mod layers;
pub mod session;

pub use catalog::{CatalogEntry, Emotion, FolderCatalog, MemoryCatalog, TrackCatalog};
pub use config::{SessionConfig, TransitionMode};
pub use error::{HeartflowError, Result};
pub use layers::{FileDecoder, Layer, TrackDecoder};
pub use session::{Session, TrackChange};
