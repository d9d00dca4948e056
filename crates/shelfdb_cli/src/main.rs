//! shelfdb CLI
//!
//! Command-line tools for inspecting accounts databases.
//!
//! # Commands
//!
//! - `list` - Open the database and list its accounts
//! - `verify` - Check the on-disk tree without modifying it

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shelfdb command-line accounts tools.
#[derive(Parser)]
#[command(name = "shelfdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the accounts directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Path to the credential document (default: <path>/credentials.json)
    #[arg(global = true, short, long)]
    credentials: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database and list its accounts
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Open again if the first open removed broken accounts
        #[arg(short, long)]
        repair: bool,

        /// Allow opening to delete accounts whose legacy descriptions
        /// cannot be resolved
        #[arg(long)]
        discard_legacy: bool,
    },

    /// Check the accounts tree without modifying it
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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
        Commands::List {
            format,
            repair,
            discard_legacy,
        } => {
            let path = cli.path.ok_or("Accounts path required for list")?;
            let credentials = commands::credentials_path(&path, cli.credentials);
            commands::list::run(&path, &credentials, &format, repair, discard_legacy)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Accounts path required for verify")?;
            let credentials = commands::credentials_path(&path, cli.credentials);
            commands::verify::run(&path, &credentials)?;
        }
        Commands::Version => {
            println!("shelfdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("shelfdb Accounts v{}", shelfdb_accounts::VERSION);
        }
    }

    Ok(())
}
