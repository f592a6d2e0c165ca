//! `cadence-tunables`: inspect and validate playback tunables.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cadence_config::{FilePreferencesStore, PlaybackConfig, init_tracing};
use cadence_core::policy::PreferencesStore;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cadence-tunables",
    about = "Inspect and validate cadence playback tunables"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the effective config and report warnings
    Check {
        /// Config file to check instead of the environment lookup
        #[arg(long)]
        config: Option<PathBuf>,
        /// Exit with an error when any warning is reported
        #[arg(long)]
        strict: bool,
        /// Print the effective tunables as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default config as TOML
    Defaults,
}

fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Check {
            config,
            strict,
            json,
        } => check(config, strict, json),
        Command::Defaults => {
            print!("{}", PlaybackConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn check(config: Option<PathBuf>, strict: bool, json: bool) -> Result<()> {
    let (store, warnings) = match config {
        Some(path) => FilePreferencesStore::from_file(&path)
            .with_context(|| format!("checking {}", path.display()))?,
        None => FilePreferencesStore::from_env()?,
    };

    let tunables = store.playback_tunables();
    println!("source: {:?}", store.source());

    if json {
        println!("{}", serde_json::to_string_pretty(&tunables)?);
    } else {
        let effective = PlaybackConfig::from_tunables(&tunables);
        print!("{}", effective.to_toml()?);
    }

    if warnings.is_empty() {
        println!("ok: no warnings");
        return Ok(());
    }

    for warning in warnings.iter() {
        println!("warning: {warning}");
    }
    if strict {
        bail!("{} warning(s) in strict mode", warnings.len());
    }
    Ok(())
}
