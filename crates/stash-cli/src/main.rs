//! Operator CLI for Stash capability tokens
//!
//! Encodes, inspects and verifies tokens out of band. The shared secret is
//! read from the environment variable named in the config file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "Stash - capability token tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "stash.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a new token
    Encode {
        /// Stash signing key
        #[arg(long)]
        signing_key: String,

        /// Stash identifier
        #[arg(long)]
        stash: String,

        /// Dweller identifier
        #[arg(long)]
        dweller: String,
    },

    /// Open a token and print its identifiers
    Decode {
        /// Token to open
        token: String,

        /// Also print the embedded signing key
        #[arg(long)]
        show_signing_key: bool,
    },

    /// Check a token against expected values
    Verify {
        /// Stash signing key
        #[arg(long)]
        signing_key: String,

        /// Stash identifier
        #[arg(long)]
        stash: String,

        /// Dweller identifier
        #[arg(long)]
        dweller: String,

        /// Token to check
        token: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(&cli.config)?;
    let codec = config.codec.build().with_context(|| {
        format!(
            "Failed to initialise codec (is {} set?)",
            config.codec.secret_env
        )
    })?;

    match cli.command {
        Commands::Encode {
            signing_key,
            stash,
            dweller,
        } => {
            println!("{}", commands::encode(&codec, &signing_key, &stash, &dweller)?);
        }

        Commands::Decode {
            token,
            show_signing_key,
        } => {
            println!("{}", commands::decode(&codec, &token, show_signing_key)?);
        }

        Commands::Verify {
            signing_key,
            stash,
            dweller,
            token,
        } => {
            commands::verify(&codec, &token, &signing_key, &stash, &dweller)?;
            println!("valid");
        }
    }

    Ok(())
}
