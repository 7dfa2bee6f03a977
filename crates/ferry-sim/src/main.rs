//! Ferry simulation CLI.
//!
//! Commands:
//! - run: Run one simulation and write the journal
//! - audit: Check an existing journal file

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferry_kernel::config::MIN_DOCK_CAPACITY;
use ferry_kernel::{audit_journal, DockConfig};
use ferry_sim::{load_config, read_journal, SimulationRunner, DEFAULT_JOURNAL};

/// Generate a timestamped output path from the given path.
/// e.g., "report.json" -> "report-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "ferry-sim")]
#[command(version)]
#[command(about = "Hackers and surfers ferry simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation
    Run {
        /// Passengers per type (even, >= 2)
        #[arg(short = 'p', long, env = "FERRY_RIDERS")]
        riders: Option<usize>,

        /// Maximum delay between generated hackers (ms)
        #[arg(long)]
        hacker_delay: Option<u64>,

        /// Maximum delay between generated surfers (ms)
        #[arg(long)]
        surfer_delay: Option<u64>,

        /// Maximum crossing time (ms)
        #[arg(long)]
        cruise: Option<u64>,

        /// Maximum backoff before retrying a full dock (ms)
        #[arg(long)]
        recheck: Option<u64>,

        /// Dock capacity
        #[arg(short, long)]
        capacity: Option<usize>,

        /// JSON config file; flags override its fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Journal output file
        #[arg(long, default_value = DEFAULT_JOURNAL)]
        journal: PathBuf,

        /// Write a JSON report (a timestamp is added to the file name)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Audit a journal file
    Audit {
        /// Journal file to check
        journal: PathBuf,

        /// Dock capacity the journal was recorded with
        #[arg(short, long, default_value_t = MIN_DOCK_CAPACITY)]
        capacity: usize,

        /// Only check the lines present; do not require every passenger to exit
        #[arg(long)]
        partial: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            riders,
            hacker_delay,
            surfer_delay,
            cruise,
            recheck,
            capacity,
            config,
            seed,
            journal,
            report,
        } => {
            let mut dock_config = match config {
                Some(path) => load_config(path)?,
                None => DockConfig::default(),
            };
            if let Some(riders) = riders {
                dock_config.riders_per_type = riders;
            }
            if let Some(ms) = hacker_delay {
                dock_config.max_hacker_delay_ms = ms;
            }
            if let Some(ms) = surfer_delay {
                dock_config.max_surfer_delay_ms = ms;
            }
            if let Some(ms) = cruise {
                dock_config.max_cruise_ms = ms;
            }
            if let Some(ms) = recheck {
                dock_config.max_recheck_ms = ms;
            }
            if let Some(capacity) = capacity {
                dock_config.dock_capacity = capacity;
            }

            let mut runner = SimulationRunner::new(dock_config).with_journal(&journal);
            if let Some(seed) = seed {
                runner = runner.with_seed(seed);
            }
            let result = runner.run().await?;

            println!("\n=== Simulation Result ===");
            println!("Run: {}", result.run_id);
            println!("Seed: {}", result.seed);
            println!("Journal: {}", journal.display());
            println!("Duration: {} ms", result.duration_ms);
            println!("\nCrossings: {}", result.crossings.total);
            println!("  4 hackers: {}", result.crossings.four_hackers);
            println!("  4 surfers: {}", result.crossings.four_surfers);
            println!("  2H+2S:     {}", result.crossings.mixed);
            println!("\nAdmissions: {}", result.admissions);
            println!(
                "Dock-full retries: {} (max {} by one passenger, {} passengers turned away)",
                result.retries.total, result.retries.max, result.retries.passengers_turned_away
            );
            println!("Events: {}", result.audit.events);

            if let Some(path) = report {
                let output_path = timestamped_path(&path);
                result.save(&output_path)?;
                println!("\nReport saved to: {}", output_path.display());
            }

            if !result.is_success() {
                for violation in &result.audit.violations {
                    eprintln!("  {violation}");
                }
                bail!("simulation finished in an inconsistent state");
            }
        }

        Commands::Audit {
            journal,
            capacity,
            partial,
        } => {
            info!(journal = %journal.display(), capacity, "Auditing journal");

            let events = read_journal(&journal)?;
            let audit = audit_journal(&events, capacity, !partial);

            println!("\n=== Journal Audit ===");
            println!("Events: {}", audit.events);
            println!("Passengers: {}", audit.passengers);
            println!("Crossings: {}", audit.crossings.len());
            for crossing in &audit.crossings {
                let crew: Vec<String> = crossing.crew.iter().map(ToString::to_string).collect();
                let composition = crossing
                    .composition
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "invalid".to_string());
                println!(
                    "  #{:<3} {:<8} captain {:<8} crew [{}]",
                    crossing.number,
                    composition,
                    crossing.captain.to_string(),
                    crew.join(", ")
                );
            }

            if !audit.is_clean() {
                println!("\nViolations:");
                for violation in &audit.violations {
                    println!("  {violation}");
                }
                bail!("journal failed audit with {} violations", audit.violations.len());
            }
            println!("\nJournal is clean.");
        }
    }

    Ok(())
}
