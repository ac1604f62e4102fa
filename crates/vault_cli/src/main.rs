//! Vault CLI
//!
//! Command-line tools for checking presentation resource trees against the
//! vault's normalizer.
//!
//! # Commands
//!
//! - `inspect` - Display entity counts, edges and skipped nodes
//! - `verify` - Check that a tree survives normalize/denormalize
//! - `export` - Print the canonical form of a tree
//! - `trash` - Simulate trashing and restoring one entity

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Vault command-line tools.
#[derive(Parser)]
#[command(name = "vault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display entity counts, edges and skipped nodes
    Inspect {
        /// Path to the JSON tree
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify that a tree survives normalize/denormalize
    Verify {
        /// Path to the JSON tree
        file: PathBuf,
    },

    /// Print the canonical form of a tree
    Export {
        /// Path to the JSON tree
        file: PathBuf,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Export only the subtree of this entity
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Simulate trashing and restoring one entity
    Trash {
        /// Path to the JSON tree
        file: PathBuf,

        /// Entity to trash
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { file, format } => {
            commands::inspect::run(&file, &format)?;
        }
        Commands::Verify { file } => {
            commands::verify::run(&file)?;
        }
        Commands::Export {
            file,
            pretty,
            entity,
        } => {
            commands::export::run(&file, pretty, entity.as_deref())?;
        }
        Commands::Trash { file, id, format } => {
            commands::trash::run(&file, &id, &format)?;
        }
        Commands::Version => {
            println!("Vault CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
