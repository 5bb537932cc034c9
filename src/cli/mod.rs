//! CLI Module
//!
//! Command-line interface for offline rendering and library inspection.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Heartflow - heart-rate driven layered relaxation music
#[derive(Parser, Debug)]
#[command(name = "heartflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a session from a recorded heart-rate series
    #[command(name = "render")]
    Render {
        /// Session configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Emotion folder to draw tracks from
        #[arg(short, long, default_value = "peaceful")]
        emotion: String,

        /// Text file with one heart rate (bpm) per line
        #[arg(long = "heart-rates")]
        heart_rates: PathBuf,

        /// Output WAV file (default: timestamped name in the working directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output bit depth: 16, 24 or 32
        #[arg(long, default_value_t = 16)]
        bit_depth: u16,

        /// Seed for track choice, for reproducible renders
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the tracks available for an emotion
    #[command(name = "catalog")]
    Catalog {
        /// Session configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Emotion folder to list
        #[arg(short, long, default_value = "peaceful")]
        emotion: String,
    },

    /// Validate a configuration file and print the effective values
    #[command(name = "check-config")]
    CheckConfig {
        /// Session configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}
