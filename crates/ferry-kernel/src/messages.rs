//! Message types for acton-reactive actor communication.

use serde::{Deserialize, Serialize};

use crate::formation::GroupComposition;
use crate::passenger::PassengerTag;

/// A captain has boarded and the boat is leaving - sent by the dock.
#[derive(Debug, Clone)]
pub struct CrossingBoarded {
    /// 1-based crossing number
    pub crossing: u64,
    /// Passenger that formed the group
    pub captain: PassengerTag,
    /// Who is on the boat
    pub composition: GroupComposition,
}

/// A captain has disembarked and released the boat - sent by the dock.
#[derive(Debug, Clone)]
pub struct CrossingLanded {
    /// 1-based crossing number
    pub crossing: u64,
    /// Passenger that captained the crossing
    pub captain: PassengerTag,
}

/// Ask the ledger for its tallies. The answer arrives on the ledger's channel.
#[derive(Debug, Clone)]
pub struct ReportLedger;

/// Tallies kept by the crossing ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    /// Crossings that boarded and landed
    pub completed: usize,
    pub four_hackers: usize,
    pub four_surfers: usize,
    pub mixed: usize,
    /// Crossings that boarded while another was still in flight
    pub overlaps: usize,
    /// Landings that did not match the crossing in flight
    pub unmatched_landings: usize,
    /// Crossing still on the water when the report was taken
    pub in_flight: Option<u64>,
}

impl LedgerReport {
    pub fn boarded(&self) -> usize {
        self.four_hackers + self.four_surfers + self.mixed
    }

    /// No overlapping or mismatched crossings were seen.
    pub fn is_consistent(&self) -> bool {
        self.overlaps == 0 && self.unmatched_landings == 0
    }
}
