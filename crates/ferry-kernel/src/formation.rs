//! Group formation: which waiting passengers make up the next boat load.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::passenger::PassengerType;

/// Passengers that fit on the ferry at once.
pub const GROUP_SIZE: usize = 4;

/// Crew members per crossing (everyone except the captain).
pub const CREW_SIZE: usize = GROUP_SIZE - 1;

/// Passengers physically waiting on the dock, not yet assigned to a group.
///
/// Only mutated under the dock's group lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockOccupancy {
    pub hackers: usize,
    pub surfers: usize,
}

impl DockOccupancy {
    pub fn new(hackers: usize, surfers: usize) -> Self {
        Self { hackers, surfers }
    }

    pub fn count(&self, kind: PassengerType) -> usize {
        match kind {
            PassengerType::Hacker => self.hackers,
            PassengerType::Surfer => self.surfers,
        }
    }

    pub fn total(&self) -> usize {
        self.hackers + self.surfers
    }

    /// Register one more waiting passenger.
    pub fn arrive(&mut self, kind: PassengerType) {
        match kind {
            PassengerType::Hacker => self.hackers += 1,
            PassengerType::Surfer => self.surfers += 1,
        }
    }

    /// Run the formation rule and, on a match, take the group off the dock.
    pub fn form_group(&mut self) -> Option<GroupComposition> {
        let composition = GroupComposition::select(self)?;
        self.hackers -= composition.hackers();
        self.surfers -= composition.surfers();
        Some(composition)
    }
}

/// Lock-free mirror of the occupancy for journal snapshots.
///
/// Written only by the holder of the group lock right after it mutates the
/// occupancy, read by anyone who needs a snapshot without taking that lock.
/// Both counts live in one word (hackers high, surfers low) so a reader
/// always sees a pair that was actually published.
#[derive(Debug, Default)]
pub struct OccupancyBoard {
    packed: AtomicU64,
}

impl OccupancyBoard {
    pub fn publish(&self, occupancy: &DockOccupancy) {
        let packed = ((occupancy.hackers as u64) << 32) | (occupancy.surfers as u64 & 0xFFFF_FFFF);
        self.packed.store(packed, Ordering::Release);
    }

    pub fn snapshot(&self) -> DockOccupancy {
        let packed = self.packed.load(Ordering::Acquire);
        DockOccupancy::new((packed >> 32) as usize, (packed & 0xFFFF_FFFF) as usize)
    }
}

/// The only three boat loads the ferry accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupComposition {
    FourHackers,
    FourSurfers,
    Mixed,
}

impl GroupComposition {
    /// Priority-ordered formation rule.
    ///
    /// Four hackers win over four surfers, which win over a mixed pair of
    /// pairs. Returns `None` when nobody can leave yet.
    pub fn select(occupancy: &DockOccupancy) -> Option<Self> {
        if occupancy.hackers >= GROUP_SIZE {
            Some(Self::FourHackers)
        } else if occupancy.surfers >= GROUP_SIZE {
            Some(Self::FourSurfers)
        } else if occupancy.hackers >= 2 && occupancy.surfers >= 2 {
            Some(Self::Mixed)
        } else {
            None
        }
    }

    /// Rebuild a composition from per-type head counts.
    pub fn from_counts(hackers: usize, surfers: usize) -> Option<Self> {
        match (hackers, surfers) {
            (4, 0) => Some(Self::FourHackers),
            (0, 4) => Some(Self::FourSurfers),
            (2, 2) => Some(Self::Mixed),
            _ => None,
        }
    }

    pub fn hackers(&self) -> usize {
        match self {
            Self::FourHackers => 4,
            Self::FourSurfers => 0,
            Self::Mixed => 2,
        }
    }

    pub fn surfers(&self) -> usize {
        GROUP_SIZE - self.hackers()
    }

    pub fn count(&self, kind: PassengerType) -> usize {
        match kind {
            PassengerType::Hacker => self.hackers(),
            PassengerType::Surfer => self.surfers(),
        }
    }

    /// Rendezvous signals per type: one for every member, captain included.
    pub fn seats(&self) -> DockOccupancy {
        DockOccupancy::new(self.hackers(), self.surfers())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FourHackers => "four_hackers",
            Self::FourSurfers => "four_surfers",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for GroupComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}H+{}S", self.hackers(), self.surfers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_group_below_thresholds() {
        assert_eq!(GroupComposition::select(&DockOccupancy::new(0, 0)), None);
        assert_eq!(GroupComposition::select(&DockOccupancy::new(1, 0)), None);
        assert_eq!(GroupComposition::select(&DockOccupancy::new(2, 0)), None);
        assert_eq!(GroupComposition::select(&DockOccupancy::new(3, 1)), None);
        assert_eq!(GroupComposition::select(&DockOccupancy::new(1, 3)), None);
    }

    #[test]
    fn test_hackers_take_priority() {
        assert_eq!(
            GroupComposition::select(&DockOccupancy::new(4, 4)),
            Some(GroupComposition::FourHackers)
        );
        assert_eq!(
            GroupComposition::select(&DockOccupancy::new(4, 2)),
            Some(GroupComposition::FourHackers)
        );
    }

    #[test]
    fn test_surfers_before_mixed() {
        assert_eq!(
            GroupComposition::select(&DockOccupancy::new(3, 4)),
            Some(GroupComposition::FourSurfers)
        );
    }

    #[test]
    fn test_mixed_leaves_one_hacker_behind() {
        let mut dock = DockOccupancy::new(3, 2);
        assert_eq!(dock.form_group(), Some(GroupComposition::Mixed));
        assert_eq!(dock, DockOccupancy::new(1, 0));
        assert_eq!(dock.form_group(), None);
        assert_eq!(dock, DockOccupancy::new(1, 0));
    }

    #[test]
    fn test_every_composition_seats_four() {
        for composition in [
            GroupComposition::FourHackers,
            GroupComposition::FourSurfers,
            GroupComposition::Mixed,
        ] {
            assert_eq!(composition.hackers() + composition.surfers(), GROUP_SIZE);
            assert_eq!(
                GroupComposition::from_counts(composition.hackers(), composition.surfers()),
                Some(composition)
            );
        }
        assert_eq!(GroupComposition::from_counts(3, 1), None);
    }

    #[test]
    fn test_seats_cover_the_whole_group() {
        assert_eq!(GroupComposition::Mixed.seats(), DockOccupancy::new(2, 2));
        assert_eq!(GroupComposition::FourHackers.seats(), DockOccupancy::new(4, 0));
        assert_eq!(GroupComposition::FourSurfers.seats().total(), GROUP_SIZE);
    }

    #[test]
    fn test_board_round_trips_large_counts() {
        let board = OccupancyBoard::default();
        let occupancy = DockOccupancy::new(70_000, 123_456);
        board.publish(&occupancy);
        assert_eq!(board.snapshot(), occupancy);
    }

    #[test]
    fn test_board_snapshot_is_never_torn() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let board = Arc::new(OccupancyBoard::default());
        let done = Arc::new(AtomicBool::new(false));
        let full = DockOccupancy::new(2, 2);
        let empty = DockOccupancy::default();

        let writer = {
            let board = board.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    board.publish(&full);
                    board.publish(&empty);
                }
            })
        };

        let torn = (0..200_000)
            .map(|_| board.snapshot())
            .filter(|seen| *seen != full && *seen != empty)
            .count();
        done.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        assert_eq!(torn, 0);
    }
}
