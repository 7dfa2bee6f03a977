//! Results of a simulation run.
//!
//! Captures:
//! - Crossings per group composition
//! - Admissions and dock-full retries
//! - Final dock snapshot and ledger tally
//! - Journal audit outcome

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ferry_kernel::{
    AuditReport, DockConfig, DockSnapshot, GroupComposition, LedgerReport, Role, Voyage,
};

/// Crossings by group composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingTally {
    pub total: usize,
    pub four_hackers: usize,
    pub four_surfers: usize,
    pub mixed: usize,
}

impl CrossingTally {
    pub fn from_audit(audit: &AuditReport) -> Self {
        Self {
            total: audit.crossings.len(),
            four_hackers: audit.count(GroupComposition::FourHackers),
            four_surfers: audit.count(GroupComposition::FourSurfers),
            mixed: audit.count(GroupComposition::Mixed),
        }
    }
}

/// How often passengers found the dock full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStats {
    /// Sum of retries over all passengers
    pub total: u64,
    /// Most retries by a single passenger
    pub max: u32,
    /// Passengers that were turned away at least once
    pub passengers_turned_away: usize,
}

impl RetryStats {
    pub fn from_voyages(voyages: &[Voyage]) -> Self {
        Self {
            total: voyages.iter().map(|v| u64::from(v.retries)).sum(),
            max: voyages.iter().map(|v| v.retries).max().unwrap_or(0),
            passengers_turned_away: voyages.iter().filter(|v| v.retries > 0).count(),
        }
    }
}

/// Audit outcome as stored in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub clean: bool,
    pub events: usize,
    pub passengers: usize,
    pub violations: Vec<String>,
}

impl From<&AuditReport> for AuditSummary {
    fn from(audit: &AuditReport) -> Self {
        Self {
            clean: audit.is_clean(),
            events: audit.events,
            passengers: audit.passengers,
            violations: audit.violations.clone(),
        }
    }
}

/// Results from one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub config: DockConfig,
    /// Journal file, when one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
    pub crossings: CrossingTally,
    pub captains: usize,
    pub admissions: u64,
    pub retries: RetryStats,
    pub final_dock: DockSnapshot,
    /// Tally kept by the crossing ledger actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerReport>,
    pub audit: AuditSummary,
}

impl SimulationReport {
    /// Count captains among the voyages.
    pub fn count_captains(voyages: &[Voyage]) -> usize {
        voyages.iter().filter(|v| v.role == Role::Captain).count()
    }

    /// True when the journal audits clean, the dock drained, and the ledger
    /// (if any) agrees with the journal.
    pub fn is_success(&self) -> bool {
        self.audit.clean
            && self.final_dock.is_drained()
            && self.captains == self.crossings.total
            && self.ledger.as_ref().map_or(true, |ledger| {
                ledger.is_consistent() && ledger.completed == self.crossings.total
            })
    }

    /// Save the report to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }
}
