//! Audio Engine Module
//!
//! Audio primitives the scheduler and mixer are built on:
//! - Audio buffer management (slicing, fades, gain, overlay)
//! - WAV file I/O and sample rate conversion
//! - Compressed format decoding (MP3, FLAC, OGG, ...)

pub mod buffer;
pub mod decode;
pub mod io;

pub use buffer::{
    calculate_peak, calculate_rms, db_to_linear, linear_to_db, AudioBuffer, ChannelLayout,
    INTERNAL_SAMPLE_RATE,
};
pub use decode::{decode_audio, is_audio_path, AUDIO_EXTENSIONS};
pub use io::{export_audio, generate_test_tone, import_audio, resample_buffer, ExportFormat};
