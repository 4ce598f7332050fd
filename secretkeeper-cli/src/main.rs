// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Secretkeeper CLI
//!
//! Runs the secret mailbox daemon and talks to it.

use clap::{Parser, Subcommand, ValueEnum};

use secretkeeper_core::InitKind;

mod client;
mod commands;
mod server;

/// Secretkeeper - a one-slot secret mailbox that forgets after one read
#[derive(Parser)]
#[command(name = "skeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "secretkeeper.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon in the foreground
    Serve {
        /// How this daemon instance is starting
        #[arg(long, value_enum, default_value_t = StartKind::Fresh)]
        start: StartKind,
    },

    /// Store a secret (from FILE, or stdin if omitted)
    Write {
        /// File holding the secret
        file: Option<String>,
    },

    /// Read back your secret; it is erased afterwards
    Read,

    /// Show slot status
    Status,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

/// Kind of daemon start, as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StartKind {
    Fresh,
    LiveUpdate,
    Restart,
}

impl From<StartKind> for InitKind {
    fn from(kind: StartKind) -> Self {
        match kind {
            StartKind::Fresh => InitKind::Fresh,
            StartKind::LiveUpdate => InitKind::LiveUpdate,
            StartKind::Restart => InitKind::Restart,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for secret bytes
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve { start } => commands::serve::execute(&cli.config, start.into()).await,
        Commands::Write { file } => commands::write::execute(&cli.config, file.as_deref()).await,
        Commands::Read => commands::read::execute(&cli.config).await,
        Commands::Status => commands::status::execute(&cli.config).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
