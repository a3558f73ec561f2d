//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Loads the analysis configuration
//! 2. Reads and ingests the trace
//! 3. Runs frame, statistics and layout shift analyses
//! 4. Writes the JSON report
//! 5. Checks configured thresholds

use crate::analysis::TraceAnalysis;
use crate::output::{check_thresholds, write_report, PerformanceReport, ThresholdViolation};
use crate::utils::config::{load_config, AnalysisConfig};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Trace JSON or `.cpuprofile` to analyse
    pub trace_path: PathBuf,

    /// Optional TOML analysis configuration
    pub config_path: Option<PathBuf>,

    /// Output path for the JSON report
    pub output_json: Option<PathBuf>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            trace_path: PathBuf::new(),
            config_path: None,
            output_json: Some(PathBuf::from("report.json")),
            print_summary: false,
        }
    }
}

/// Result of one analyze run
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub report: PerformanceReport,
    pub violations: Vec<ThresholdViolation>,
}

impl AnalyzeOutcome {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Returns
/// The report and any threshold violations. Violations are not errors; the
/// caller decides the exit status.
///
/// # Errors
/// * Config file unreadable or invalid
/// * Trace file unreadable or malformed
/// * Report write failures
///
/// # Example
/// ```ignore
/// let outcome = execute_analyze(AnalyzeArgs {
///     trace_path: PathBuf::from("trace.json"),
///     ..Default::default()
/// })?;
/// ```
pub fn execute_analyze(args: AnalyzeArgs) -> Result<AnalyzeOutcome> {
    let start_time = Instant::now();

    info!("Analyzing trace: {}", args.trace_path.display());

    info!("Step 1/4: Loading configuration...");
    let config = match &args.config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    info!("Step 2/4: Reading trace...");
    let raw = read_trace_file(&args.trace_path)?;

    info!("Step 3/4: Running analyses...");
    let mut analysis = TraceAnalysis::from_json(&raw, &config).context("Failed to ingest trace")?;

    debug!(
        "Main thread {:?}, {} JS frames",
        analysis.main_thread(),
        analysis
            .main_thread()
            .map(|id| analysis.js_frames(id).len())
            .unwrap_or(0)
    );

    let report = analysis.report();
    let violations = check_thresholds(&report, &config.thresholds);

    info!("Step 4/4: Writing outputs...");
    if let Some(output) = &args.output_json {
        write_report(&report, output).context("Failed to write report JSON")?;
        info!("✓ Report written to: {}", output.display());
    }

    if args.print_summary {
        print_summary(&report, &violations);
    }

    for violation in &violations {
        warn!(
            "Threshold violated: {} (limit {}, actual {})",
            violation.metric, violation.threshold, violation.actual
        );
    }

    info!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(AnalyzeOutcome { report, violations })
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.trace_path.as_os_str().is_empty() {
        anyhow::bail!("Trace path cannot be empty");
    }

    if !args.trace_path.is_file() {
        anyhow::bail!("Trace file not found: {}", args.trace_path.display());
    }

    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Config file not found: {}", config.display());
        }
    }

    Ok(())
}

/// Read a JSON document from disk
///
/// **Public** - shared with the validate command
pub fn read_trace_file(path: &Path) -> Result<Value> {
    let file = File::open(path).with_context(|| format!("Failed to open trace {}", path.display()))?;
    let raw: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Trace {} is not valid JSON", path.display()))?;
    Ok(raw)
}

/// Print a short text summary
///
/// **Private** - internal helper for execute_analyze
fn print_summary(report: &PerformanceReport, violations: &[ThresholdViolation]) {
    println!("\n{}", "=".repeat(60));
    println!("PERFORMANCE SUMMARY");
    println!("{}", "=".repeat(60));
    if let Some(thread) = &report.main_thread {
        println!("Main thread:      {}", thread);
    }
    println!("Frames:           {}", report.frame_count);
    println!("Average FPS:      {:.2}", report.frames.avg_fps);
    println!("Dropped frames:   {}", report.frames.dropped_frames);
    println!("Longest frame:    {:.2} ms", report.frames.longest_frame_time);
    println!(
        "CPU busy:         {:.2} ms of {:.2} ms ({:.1}%)",
        report.cpu.all_cpu_time,
        report.cpu.total_time,
        report.cpu.all_cpu_time_percent * 100.0
    );
    println!(
        "  script {:.2}  render {:.2}  paint {:.2}  system {:.2}",
        report.cpu.script_time, report.cpu.render_time, report.cpu.paint_time, report.cpu.system_time
    );
    println!("Layout shift:     {:.4}", report.cumulative_layout_shift);
    println!("Anomalies:        {}", report.anomaly_count);
    if violations.is_empty() {
        println!("Thresholds:       passed");
    } else {
        println!("Thresholds:       {} violated", violations.len());
        for violation in violations {
            println!("  ✗ {}: limit {}, actual {}", violation.metric, violation.threshold, violation.actual);
        }
    }
    println!("{}", "=".repeat(60));
}
