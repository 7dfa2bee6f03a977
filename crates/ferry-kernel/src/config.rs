//! Configuration types for the dock.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FerryError, Result};
use crate::passenger::PassengerType;

/// Upper bound for every delay knob, in milliseconds.
pub const MAX_DELAY_MS: u64 = 2000;

/// Lower bound for the dock recheck backoff, in milliseconds.
pub const MIN_RECHECK_MS: u64 = 20;

/// Smallest dock that can never wedge with an unformable crowd.
pub const MIN_DOCK_CAPACITY: usize = 5;

/// Largest dock whose occupancy fits a packed snapshot word.
pub const MAX_DOCK_CAPACITY: usize = u32::MAX as usize;

/// Top-level dock configuration.
///
/// Bounds are opaque to the protocol: they only cap the random delays drawn
/// by generators and passengers. Loaded from JSON at runtime or built from
/// CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Passengers generated per type (hackers and surfers alike)
    pub riders_per_type: usize,

    /// Maximum delay between two generated hackers (milliseconds)
    pub max_hacker_delay_ms: u64,

    /// Maximum delay between two generated surfers (milliseconds)
    pub max_surfer_delay_ms: u64,

    /// Maximum crossing duration (milliseconds)
    pub max_cruise_ms: u64,

    /// Maximum backoff before retrying a full dock (milliseconds)
    pub max_recheck_ms: u64,

    /// Number of passengers the dock holds at once
    pub dock_capacity: usize,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            riders_per_type: 4,
            max_hacker_delay_ms: 50,
            max_surfer_delay_ms: 50,
            max_cruise_ms: 20,
            max_recheck_ms: MIN_RECHECK_MS,
            dock_capacity: MIN_DOCK_CAPACITY,
        }
    }
}

impl DockConfig {
    /// Check every bound and report all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.riders_per_type < 2 || self.riders_per_type % 2 != 0 {
            problems.push(format!(
                "riders per type must be an even number >= 2 (got {})",
                self.riders_per_type
            ));
        }

        for (name, value) in [
            ("max hacker delay", self.max_hacker_delay_ms),
            ("max surfer delay", self.max_surfer_delay_ms),
            ("max cruise time", self.max_cruise_ms),
        ] {
            if value > MAX_DELAY_MS {
                problems.push(format!(
                    "{name} must be within 0..={MAX_DELAY_MS} ms (got {value})"
                ));
            }
        }

        if !(MIN_RECHECK_MS..=MAX_DELAY_MS).contains(&self.max_recheck_ms) {
            problems.push(format!(
                "max dock recheck must be within {MIN_RECHECK_MS}..={MAX_DELAY_MS} ms (got {})",
                self.max_recheck_ms
            ));
        }

        if !(MIN_DOCK_CAPACITY..=MAX_DOCK_CAPACITY).contains(&self.dock_capacity) {
            problems.push(format!(
                "dock capacity must be within {MIN_DOCK_CAPACITY}..={MAX_DOCK_CAPACITY} (got {})",
                self.dock_capacity
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FerryError::InvalidConfig(problems))
        }
    }

    /// Maximum arrival delay for the given passenger type.
    pub fn max_arrival_delay_ms(&self, kind: PassengerType) -> u64 {
        match kind {
            PassengerType::Hacker => self.max_hacker_delay_ms,
            PassengerType::Surfer => self.max_surfer_delay_ms,
        }
    }

    /// Backoff ceiling, clamped to the minimum recheck window.
    pub fn recheck_ceiling_ms(&self) -> u64 {
        self.max_recheck_ms.max(MIN_RECHECK_MS)
    }

    /// Total passengers a run will generate.
    pub fn total_riders(&self) -> usize {
        self.riders_per_type * 2
    }
}

/// Draw a uniform delay in `[0, max_ms)`. A zero ceiling yields no delay.
pub fn draw_delay(rng: &mut impl Rng, max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.random_range(0..max_ms))
}
