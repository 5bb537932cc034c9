//! Heart-Rate Module
//!
//! Physiological input handling:
//! - Sliding heart-rate window with running statistics
//! - Nearest-tempo matching of catalog entries against a heart rate

mod matching;
mod window;

pub use matching::{choose_nearest, nearest_match};
pub use window::{HeartRateWindow, HeartSample};
