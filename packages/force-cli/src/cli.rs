use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "forcelog",
    version,
    about = "Real-time force sensor acquisition tool",
    long_about = "Record force readings from a serial (or TCP) sensor link.\n\
                  Each run exports a CSV of every sample, an SVG graph of the full run,\n\
                  and optionally one SQLite row per sample."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record one experiment and print its summary as JSON
    Run(RunArgs),
    /// Print the effective configuration as JSON
    Config(ConfigArgs),
}

/// Overrides shared by every command that resolves a configuration
#[derive(Args, Debug, Default)]
pub struct ExperimentArgs {
    /// JSON configuration file; flags override its values
    #[arg(long, env = "FORCELOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial port (e.g., /dev/ttyUSB0, COM8)
    #[arg(long, env = "FORCELOG_PORT", conflicts_with = "tcp")]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long, env = "FORCELOG_BAUD")]
    pub baud: Option<u32>,

    /// Read from a TCP endpoint (host:port) instead of a serial port
    #[arg(long, env = "FORCELOG_TCP")]
    pub tcp: Option<String>,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(long)]
    pub run_time: Option<f64>,

    /// Sampling cadence in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Keep only the most recent N samples
    #[arg(long)]
    pub window: Option<usize>,

    /// Directory for CSV and graph exports
    #[arg(long, env = "FORCELOG_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// SQLite database receiving one row per sample
    #[arg(long, env = "FORCELOG_DATABASE")]
    pub database: Option<PathBuf>,

    /// Skip the SVG graph export
    #[arg(long, default_value_t = false)]
    pub no_snapshot: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}
