//! Simulation runner: one full run of the ferry, end to end.
//!
//! The runner owns the actor runtime and the dock for the duration of a run:
//! it spawns the crossing ledger, opens the dock, runs both generators
//! concurrently, then audits the journal and tears everything down.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use acton_reactive::prelude::*;
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use ferry_kernel::actors::CrossingLedger;
use ferry_kernel::{
    audit_journal, Dock, DockConfig, EventSink, LedgerReport, MemoryJournal, PassengerType,
    ReportLedger, Voyage,
};

use crate::generator::{generator_seeds, PassengerGenerator};
use crate::journal::FileJournal;
use crate::results::{AuditSummary, CrossingTally, RetryStats, SimulationReport};

/// How long to wait for the ledger to answer after the run.
const LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one simulation.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    config: DockConfig,
    seed: u64,
    journal: Option<PathBuf>,
}

impl SimulationRunner {
    /// Create a runner with a random seed and no journal file.
    pub fn new(config: DockConfig) -> Self {
        Self {
            config,
            seed: rand::random(),
            journal: None,
        }
    }

    /// Fix the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Also write the journal to `path`.
    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run the simulation to completion.
    pub async fn run(&self) -> Result<SimulationReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            %run_id,
            seed = self.seed,
            riders_per_type = self.config.riders_per_type,
            capacity = self.config.dock_capacity,
            "Starting simulation"
        );

        let memory = MemoryJournal::new();
        let sink: Arc<dyn EventSink> = match &self.journal {
            Some(path) => Arc::new((FileJournal::create(path)?, memory.clone())),
            None => Arc::new(memory.clone()),
        };

        let mut runtime = ActonApp::launch_async().await;
        let (ledger_tx, mut ledger_rx) = mpsc::channel(1);
        let ledger = CrossingLedger::new(ledger_tx).spawn(&mut runtime).await;

        let dock = Dock::builder(self.config.clone())
            .sink(sink)
            .ledger(ledger.clone())
            .build()?;

        let [hacker_seed, surfer_seed] = generator_seeds(self.seed);
        let hackers = PassengerGenerator::new(PassengerType::Hacker, &self.config, hacker_seed);
        let surfers = PassengerGenerator::new(PassengerType::Surfer, &self.config, surfer_seed);

        let voyages = match join_generators(
            &dock,
            hackers.run(dock.clone()),
            surfers.run(dock.clone()),
        )
        .await
        {
            Ok(voyages) => voyages,
            Err(e) => {
                let _ = runtime.shutdown_all().await;
                return Err(e.context("simulation aborted"));
            }
        };

        ledger.send(ReportLedger).await;
        let ledger_report = request_ledger(&mut ledger_rx).await;

        let final_dock = dock.snapshot();
        dock.close();
        let _ = runtime.shutdown_all().await;

        let audit = audit_journal(&memory.events(), self.config.dock_capacity, true);
        if !audit.is_clean() {
            for violation in &audit.violations {
                warn!(%violation, "Journal audit violation");
            }
        }

        let ended_at = Utc::now();
        let report = SimulationReport {
            run_id,
            seed: self.seed,
            started_at,
            ended_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            config: self.config.clone(),
            journal: self.journal.clone(),
            crossings: CrossingTally::from_audit(&audit),
            captains: SimulationReport::count_captains(&voyages),
            admissions: final_dock.admissions,
            retries: RetryStats::from_voyages(&voyages),
            final_dock,
            ledger: ledger_report,
            audit: AuditSummary::from(&audit),
        };

        info!(
            %run_id,
            crossings = report.crossings.total,
            retries = report.retries.total,
            duration_ms = report.duration_ms,
            clean = report.audit.clean,
            "Simulation complete"
        );

        Ok(report)
    }
}

/// Run both generators, closing the dock as soon as either fails so that
/// passengers parked on it wake up instead of waiting forever.
pub(crate) async fn join_generators(
    dock: &Dock,
    hackers: impl Future<Output = Result<Vec<Voyage>>>,
    surfers: impl Future<Output = Result<Vec<Voyage>>>,
) -> Result<Vec<Voyage>> {
    match tokio::try_join!(hackers, surfers) {
        Ok((mut voyages, surfers)) => {
            voyages.extend(surfers);
            Ok(voyages)
        }
        Err(e) => {
            warn!(error = %e, "Generator failed, closing the dock");
            dock.close();
            Err(e)
        }
    }
}

async fn request_ledger(rx: &mut mpsc::Receiver<LedgerReport>) -> Option<LedgerReport> {
    match tokio::time::timeout(LEDGER_TIMEOUT, rx.recv()).await {
        Ok(report) => report,
        Err(_) => {
            warn!("Crossing ledger did not report in time");
            None
        }
    }
}

/// Load a config file, falling back to defaults for missing fields.
pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<DockConfig> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid config {}", path.display()))
}
