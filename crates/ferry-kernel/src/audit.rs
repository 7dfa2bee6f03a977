//! Journal audit: replay a recorded event stream and check the protocol's
//! observable guarantees.
//!
//! Checked per stream:
//! - sequence numbers are 1, 2, 3, ... in write order
//! - dock snapshots never exceed the capacity, and a "waits" line counts
//!   the passenger that wrote it
//! - every passenger starts once, waits once, exits once, and each
//!   "leaves queue" is followed by its "is back"
//! - crossings never overlap: "boards" opens a crossing, three "member exits"
//!   follow, "captain exits" closes it
//! - every crossing carries one of the three valid compositions

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventKind};
use crate::formation::{GroupComposition, CREW_SIZE};
use crate::passenger::{PassengerTag, PassengerType};

/// One crossing reconstructed from the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingRecord {
    /// 1-based, in journal order
    pub number: u64,
    pub captain: PassengerTag,
    pub crew: Vec<PassengerTag>,
    /// `None` when the head count matches no valid group
    pub composition: Option<GroupComposition>,
    /// Sequence numbers of the boards and captain exits lines
    pub boarded_at: u64,
    pub landed_at: Option<u64>,
}

/// Result of auditing one journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub events: usize,
    pub passengers: usize,
    pub crossings: Vec<CrossingRecord>,
    pub violations: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, composition: GroupComposition) -> usize {
        self.crossings
            .iter()
            .filter(|crossing| crossing.composition == Some(composition))
            .count()
    }
}

#[derive(Debug, Default)]
struct PassengerTrail {
    starts: usize,
    waits: usize,
    exits: usize,
    away_from_queue: bool,
}

/// Replay `events` against a dock of `capacity`.
///
/// With `expect_complete` set, passengers that never exited and a crossing
/// left open at the end are reported as violations too.
pub fn audit_journal(events: &[Event], capacity: usize, expect_complete: bool) -> AuditReport {
    let mut report = AuditReport {
        events: events.len(),
        ..Default::default()
    };
    let mut trails: HashMap<PassengerTag, PassengerTrail> = HashMap::new();
    let mut open: Option<CrossingRecord> = None;

    for (index, event) in events.iter().enumerate() {
        let expected = index as u64 + 1;
        if event.sequence != expected {
            report.violations.push(format!(
                "sequence gap: expected {expected}, found {}",
                event.sequence
            ));
        }

        if let Some(occupancy) = event.occupancy {
            if occupancy.total() > capacity {
                report.violations.push(format!(
                    "#{}: dock holds {} passengers, capacity is {capacity}",
                    event.sequence,
                    occupancy.total()
                ));
            }
        }

        let who = event.passenger;
        let trail = trails.entry(who).or_default();
        if trail.exits > 0 {
            report
                .violations
                .push(format!("#{}: {who} acts after exiting", event.sequence));
        }

        match event.kind {
            EventKind::Starts => {
                trail.starts += 1;
                if trail.starts > 1 {
                    report
                        .violations
                        .push(format!("#{}: {who} starts twice", event.sequence));
                }
            }
            EventKind::LeavesQueue => trail.away_from_queue = true,
            EventKind::IsBack => {
                if !trail.away_from_queue {
                    report.violations.push(format!(
                        "#{}: {who} is back without leaving the queue",
                        event.sequence
                    ));
                }
                trail.away_from_queue = false;
            }
            EventKind::Waits => {
                trail.waits += 1;
                if event
                    .occupancy
                    .is_some_and(|occupancy| occupancy.count(who.kind) == 0)
                {
                    report.violations.push(format!(
                        "#{}: {who} waits on a dock that shows no {}",
                        event.sequence, who.kind
                    ));
                }
            }
            EventKind::Boards => {
                if let Some(previous) = open.take() {
                    report.violations.push(format!(
                        "#{}: {who} boards while crossing {} of {} is in flight",
                        event.sequence, previous.number, previous.captain
                    ));
                    report.crossings.push(previous);
                }
                open = Some(CrossingRecord {
                    number: report.crossings.len() as u64 + 1,
                    captain: who,
                    crew: Vec::with_capacity(CREW_SIZE),
                    composition: None,
                    boarded_at: event.sequence,
                    landed_at: None,
                });
            }
            EventKind::MemberExits => {
                trail.exits += 1;
                match open.as_mut() {
                    Some(crossing) if crossing.crew.len() < CREW_SIZE => crossing.crew.push(who),
                    Some(crossing) => report.violations.push(format!(
                        "#{}: {who} is a fifth passenger on crossing {}",
                        event.sequence, crossing.number
                    )),
                    None => report.violations.push(format!(
                        "#{}: {who} exits with no crossing in flight",
                        event.sequence
                    )),
                }
            }
            EventKind::CaptainExits => {
                trail.exits += 1;
                match open.take() {
                    Some(mut crossing) if crossing.captain == who => {
                        if crossing.crew.len() != CREW_SIZE {
                            report.violations.push(format!(
                                "#{}: captain {who} exits with {} crew ashore",
                                event.sequence,
                                crossing.crew.len()
                            ));
                        }
                        crossing.composition = composition_of(&crossing);
                        if crossing.composition.is_none() {
                            report.violations.push(format!(
                                "crossing {} carried an invalid group",
                                crossing.number
                            ));
                        }
                        crossing.landed_at = Some(event.sequence);
                        report.crossings.push(crossing);
                    }
                    Some(crossing) => {
                        report.violations.push(format!(
                            "#{}: {who} exits as captain of crossing {} led by {}",
                            event.sequence, crossing.number, crossing.captain
                        ));
                        open = Some(crossing);
                    }
                    None => report.violations.push(format!(
                        "#{}: captain {who} exits with no crossing in flight",
                        event.sequence
                    )),
                }
            }
        }

        if trail.starts == 0 {
            report
                .violations
                .push(format!("#{}: {who} acts before starting", event.sequence));
        }
        if trail.waits > 1 {
            report
                .violations
                .push(format!("#{}: {who} waits twice", event.sequence));
        }
    }

    report.passengers = trails.len();

    if expect_complete {
        if let Some(crossing) = open.take() {
            report.violations.push(format!(
                "crossing {} of {} never landed",
                crossing.number, crossing.captain
            ));
            report.crossings.push(crossing);
        }
        let mut stranded: Vec<_> = trails
            .iter()
            .filter(|(_, trail)| trail.exits == 0)
            .map(|(tag, _)| *tag)
            .collect();
        stranded.sort();
        for tag in stranded {
            report.violations.push(format!("{tag} never left the boat"));
        }
    } else if let Some(crossing) = open.take() {
        report.crossings.push(crossing);
    }

    report
}

fn composition_of(crossing: &CrossingRecord) -> Option<GroupComposition> {
    let aboard: HashSet<PassengerTag> = crossing
        .crew
        .iter()
        .copied()
        .chain(std::iter::once(crossing.captain))
        .collect();
    if aboard.len() != CREW_SIZE + 1 {
        return None;
    }
    let hackers = aboard
        .iter()
        .filter(|tag| tag.kind == PassengerType::Hacker)
        .count();
    GroupComposition::from_counts(hackers, aboard.len() - hackers)
}
