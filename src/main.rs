//! Heartflow CLI
//!
//! Command-line interface for rendering heart-rate driven sessions offline.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use heartflow::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins over the defaults
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Heartflow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Heartflow v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            config,
            emotion,
            heart_rates,
            output,
            bit_depth,
            seed,
        } => {
            commands::render(
                &config,
                &emotion,
                &heart_rates,
                output.as_deref(),
                bit_depth,
                seed,
            )
            .with_context(|| format!("rendering '{}' from {}", emotion, heart_rates.display()))?;
            Ok(())
        }
        Commands::Catalog { config, emotion } => commands::catalog(&config, &emotion)
            .with_context(|| format!("listing catalog for '{}'", emotion)),
        Commands::CheckConfig { config } => commands::check_config(&config)
            .with_context(|| format!("checking {}", config.display())),
    }
}
