//! Pageperf CLI
//!
//! Computes CPU and frame-rate metrics from browser performance traces
//! and gates them against configured thresholds.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use pageperf_trace::commands::{execute_analyze, validate_args, validate_trace_file, AnalyzeArgs};
use pageperf_trace::utils::config::SCHEMA_VERSION;

/// Pageperf - performance metrics from browser traces
#[derive(Parser, Debug)]
#[command(name = "pageperf")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse a trace and write a performance report
    Analyze {
        /// Trace JSON (event list or traceEvents envelope) or .cpuprofile
        #[arg(short, long)]
        trace: PathBuf,

        /// TOML analysis configuration and thresholds
        #[arg(short, long, env = "PAGEPERF_CONFIG")]
        config: Option<PathBuf>,

        /// Output path for JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Skip writing the JSON report
        #[arg(long)]
        no_output: bool,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Check a trace file ingests cleanly
    Validate {
        /// Path to trace file
        #[arg(short, long)]
        trace: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Analyze {
            trace,
            config,
            output,
            no_output,
            summary,
        } => {
            let args = AnalyzeArgs {
                trace_path: trace,
                config_path: config,
                output_json: (!no_output).then_some(output),
                print_summary: summary,
            };

            validate_args(&args)?;
            let outcome = execute_analyze(args)?;

            if !outcome.passed() {
                eprintln!("✗ {} threshold(s) violated", outcome.violations.len());
                std::process::exit(1);
            }
        }

        Commands::Validate { trace } => {
            validate_file(trace)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Validate a trace file
///
/// **Private** - internal command implementation
fn validate_file(file_path: PathBuf) -> Result<()> {
    println!("Validating trace: {}", file_path.display());

    let summary = validate_trace_file(&file_path)?;

    println!("✓ Valid trace ({})", summary.shape);
    println!("  Threads: {}", summary.threads);
    println!("  Events: {}", summary.events);
    if let Some(main) = &summary.main_thread {
        println!("  Main thread: {}", main);
    }
    println!("  Anomalies: {}", summary.anomalies);

    Ok(())
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("Pageperf v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("CPU and frame-rate metrics from browser performance traces.");
}
