//! Error handling for Heartflow
//!
//! Every fallible operation in the crate returns [`Result`]. Errors that
//! abort a tick leave the session's committed state untouched, so the
//! recoverable ones can simply be retried by the caller.

use thiserror::Error;

/// Result type alias for Heartflow operations
pub type Result<T> = std::result::Result<T, HeartflowError>;

/// Main error type for Heartflow operations
#[derive(Error, Debug)]
pub enum HeartflowError {
    // Configuration
    #[error("Configuration violation: {reason}")]
    ConfigViolation { reason: String },

    // Catalog
    #[error("No catalog entry for emotion '{emotion}' on layer {layer}")]
    CatalogMiss { emotion: String, layer: String },

    // Scheduling
    #[error("Layer segments differ in length (L0={ambient}, L1={melody}, L2={harmony} samples)")]
    SchedulerInvariantViolation {
        ambient: usize,
        melody: usize,
        harmony: usize,
    },

    #[error("Layer {layer} has a cursor but no lookahead segment")]
    MissingLookahead { layer: String },

    #[error("Layer {layer} has no track loaded")]
    LayerNotLoaded { layer: String },

    // Decoding
    #[error("Failed to decode '{file}': {reason}")]
    DecodeFailure {
        file: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Buffer operations
    #[error("Slice {start_ms}..{end_ms} ms is outside a {duration_ms} ms buffer")]
    SliceOutOfRange {
        start_ms: u64,
        end_ms: u64,
        duration_ms: u64,
    },

    #[error("Cannot overlay buffers of different shape ({left} vs {right})")]
    LengthMismatch { left: String, right: String },

    // Input
    #[error("Heart-rate input line {line}: '{value}' is not a heart rate ({reason})")]
    InvalidHeartRate {
        line: usize,
        value: String,
        reason: String,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HeartflowError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            HeartflowError::ConfigViolation { .. } => "CONFIG_VIOLATION",
            HeartflowError::CatalogMiss { .. } => "CATALOG_MISS",
            HeartflowError::SchedulerInvariantViolation { .. } => "SCHEDULER_INVARIANT_VIOLATION",
            HeartflowError::MissingLookahead { .. } => "MISSING_LOOKAHEAD",
            HeartflowError::LayerNotLoaded { .. } => "LAYER_NOT_LOADED",
            HeartflowError::DecodeFailure { .. } => "DECODE_FAILURE",
            HeartflowError::FileNotFound { .. } => "FILE_NOT_FOUND",
            HeartflowError::InvalidAudio { .. } => "INVALID_AUDIO",
            HeartflowError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            HeartflowError::EmptyAudio => "EMPTY_AUDIO",
            HeartflowError::SliceOutOfRange { .. } => "SLICE_OUT_OF_RANGE",
            HeartflowError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            HeartflowError::InvalidHeartRate { .. } => "INVALID_HEART_RATE",
            HeartflowError::Io(_) => "IO_ERROR",
            HeartflowError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors abort the current tick only; the same tick may be
    /// retried. The rest indicate a broken configuration or a scheduling defect.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HeartflowError::CatalogMiss { .. }
                | HeartflowError::DecodeFailure { .. }
                | HeartflowError::FileNotFound { .. }
                | HeartflowError::InvalidAudio { .. }
                | HeartflowError::UnsupportedFormat { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            HeartflowError::ConfigViolation { .. } => vec![
                "fade_time must be shorter than transport_time",
                "transport_time must be shorter than slide_window",
                "Run 'heartflow-cli check-config' to see the effective values",
            ],
            HeartflowError::CatalogMiss { .. } => vec![
                "Check that sound_folders_root points at the track library",
                "Track files must be named {no}_{bpm}_{class}_{layer}.mp3 (or .wav, .flac, .ogg)",
                "Ambient tracks may also live in the shared 'environment' folder",
            ],
            HeartflowError::DecodeFailure { .. } => vec![
                "Check if the file plays in another application",
                "Supported formats: WAV, MP3, FLAC, OGG, M4A, AIFF",
                "Retry the tick; a different candidate may be chosen",
            ],
            HeartflowError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            HeartflowError::UnsupportedFormat { .. } => vec![
                "Convert to a mono or stereo WAV file",
                "Supported bit depths: 8, 16, 24, 32",
            ],
            HeartflowError::InvalidHeartRate { .. } => vec![
                "Write one whole bpm value per line",
                "Use '#' to start a comment",
            ],
            _ => vec![],
        }
    }
}
