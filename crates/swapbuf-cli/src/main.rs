//! Swapbuf CLI - Admin tool for Swapbuf dump folders and policies.
//!
//! Inspects the dump folders buffer managers leave under the temp root,
//! sweeps the ones whose process is gone, and runs simulated workloads to see
//! how a dump policy behaves.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use swapbuf_common::types::ByteSize;

/// Swapbuf administration tool.
///
/// A command-line interface for inspecting dump folders, listing dump
/// policies, and exercising them on a simulated workload.
#[derive(Parser)]
#[command(name = "swapbuf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress progress and info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format (default for TTY)
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Where to look for dump folders.
#[derive(clap::Args)]
struct FolderArgs {
    /// Directory holding the dump folders (default: SWAPBUF_TEMP_DIR or the system temp dir)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Dump folder name prefix
    #[arg(long, default_value = "swapbuf-")]
    prefix: String,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List dump folders and whether their owners are alive
    Status {
        #[command(flatten)]
        folders: FolderArgs,
    },

    /// Remove dump folders left behind by dead processes
    Sweep {
        #[command(flatten)]
        folders: FolderArgs,

        /// Perform a dry-run (show what would be removed)
        #[arg(long)]
        dry_run: bool,
    },

    /// List dump policies and their parameters
    Policies,

    /// Show system memory figures
    Meminfo,

    /// Run a workload on a fresh buffer manager
    Simulate(SimulateArgs),
}

/// Simulated workload settings.
#[derive(clap::Args)]
struct SimulateArgs {
    /// Dump policy to install
    #[arg(long, default_value = "never")]
    policy: String,

    /// Policy parameter as name=value (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Number of buffers
    #[arg(long, default_value_t = 16)]
    buffers: usize,

    /// Size of each buffer
    #[arg(long, default_value = "1MiB")]
    size: ByteSize,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Lock/unlock rounds per buffer
    #[arg(long, default_value_t = 4)]
    locks: usize,

    /// Report this much free memory instead of reading the system's
    #[arg(long)]
    free_mem: Option<ByteSize>,

    /// Directory for the manager's dump folder
    #[arg(long)]
    root: Option<PathBuf>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let result = match cli.command {
        Commands::Status { folders } => commands::status::run(&folders, cli.format, cli.quiet),
        Commands::Sweep { folders, dry_run } => {
            commands::sweep::run(&folders, dry_run, cli.format, cli.quiet)
        }
        Commands::Policies => commands::policies::run(cli.format, cli.quiet),
        Commands::Meminfo => commands::meminfo::run(cli.format, cli.quiet),
        Commands::Simulate(args) => commands::simulate::run(&args, cli.format, cli.quiet),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
