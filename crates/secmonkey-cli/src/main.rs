//! Security Monkey CLI
//!
//! Command-line front end over the store and the watcher engine.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "secmonkey")]
#[command(about = "Security Monkey - configuration change tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the store schema
    Migrate(commands::migrate::MigrateArgs),
    /// Run one cycle for a technology from a snapshot file
    Ingest(commands::ingest::IngestArgs),
    /// List the tracked items of a technology
    Items(commands::items::ItemsArgs),
    /// Show the revision history of one item
    History(commands::history::HistoryArgs),
    /// Structural diff of two JSON documents
    Diff(commands::diff::DiffArgs),
    /// Repair orphaned items of a technology
    Repair(commands::repair::RepairArgs),
    /// List persisted collection exceptions
    Exceptions(commands::exceptions::ExceptionsArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args),
        Commands::Ingest(args) => commands::ingest::execute(args),
        Commands::Items(args) => commands::items::execute(args),
        Commands::History(args) => commands::history::execute(args),
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Repair(args) => commands::repair::execute(args),
        Commands::Exceptions(args) => commands::exceptions::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
