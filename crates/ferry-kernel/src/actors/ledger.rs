//! CrossingLedger: independent bookkeeping of every crossing.
//!
//! Captains notify the ledger when they board and when they land. Because a
//! captain sends `CrossingLanded` before releasing the crossing permit, and
//! the next captain sends `CrossingBoarded` only after acquiring it, the
//! ledger's mailbox sees crossings strictly in order. Any overlap it observes
//! is a protocol violation.

use acton_reactive::prelude::*;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::formation::GroupComposition;
use crate::messages::{CrossingBoarded, CrossingLanded, LedgerReport, ReportLedger};
use crate::passenger::PassengerTag;

/// Actor state for CrossingLedger.
#[derive(Default, Clone)]
pub struct CrossingLedgerState {
    /// Crossing currently on the water and its captain
    in_flight: Option<(u64, PassengerTag)>,
    /// Boarded crossings per composition
    by_composition: DashMap<GroupComposition, usize>,
    completed: usize,
    overlaps: usize,
    unmatched_landings: usize,
    /// Channel the report is answered on
    tx: Option<mpsc::Sender<LedgerReport>>,
}

impl std::fmt::Debug for CrossingLedgerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossingLedgerState")
            .field("in_flight", &self.in_flight)
            .field("completed", &self.completed)
            .field("overlaps", &self.overlaps)
            .finish()
    }
}

impl CrossingLedgerState {
    fn tally(&self, composition: GroupComposition) -> usize {
        self.by_composition
            .get(&composition)
            .map(|count| *count)
            .unwrap_or(0)
    }

    fn report(&self) -> LedgerReport {
        LedgerReport {
            completed: self.completed,
            four_hackers: self.tally(GroupComposition::FourHackers),
            four_surfers: self.tally(GroupComposition::FourSurfers),
            mixed: self.tally(GroupComposition::Mixed),
            overlaps: self.overlaps,
            unmatched_landings: self.unmatched_landings,
            in_flight: self.in_flight.map(|(crossing, _)| crossing),
        }
    }
}

/// Actor that records crossings and flags overlapping ones.
pub struct CrossingLedger {
    tx: mpsc::Sender<LedgerReport>,
}

impl CrossingLedger {
    /// Create a ledger answering `ReportLedger` on `tx`.
    pub fn new(tx: mpsc::Sender<LedgerReport>) -> Self {
        Self { tx }
    }

    /// Spawn the ledger in the given runtime.
    ///
    /// Hand the returned handle to [`crate::DockBuilder::ledger`].
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> ActorHandle {
        let mut actor =
            runtime.new_actor_with_name::<CrossingLedgerState>("CrossingLedger".to_string());

        actor.model.tx = Some(self.tx);
        actor.model.by_composition = DashMap::new();

        actor.mutate_on::<CrossingBoarded>(|actor, context| {
            let msg = context.message().clone();

            if let Some((current, holder)) = actor.model.in_flight {
                actor.model.overlaps += 1;
                tracing::warn!(
                    crossing = msg.crossing,
                    captain = %msg.captain,
                    in_flight = current,
                    holder = %holder,
                    "CrossingLedger: crossing boarded while another is in flight"
                );
            }

            actor.model.in_flight = Some((msg.crossing, msg.captain));
            *actor
                .model
                .by_composition
                .entry(msg.composition)
                .or_insert(0) += 1;

            tracing::trace!(
                crossing = msg.crossing,
                composition = %msg.composition,
                "CrossingLedger: boarded"
            );

            Reply::ready()
        });

        actor.mutate_on::<CrossingLanded>(|actor, context| {
            let msg = context.message().clone();

            match actor.model.in_flight.take() {
                Some((crossing, captain)) if crossing == msg.crossing && captain == msg.captain => {
                    actor.model.completed += 1;
                }
                other => {
                    actor.model.unmatched_landings += 1;
                    tracing::warn!(
                        crossing = msg.crossing,
                        captain = %msg.captain,
                        expected = ?other,
                        "CrossingLedger: landing does not match the crossing in flight"
                    );
                }
            }

            Reply::ready()
        });

        actor.act_on::<ReportLedger>(|actor, _context| {
            let report = actor.model.report();
            let tx = actor.model.tx.clone();

            tracing::info!(
                completed = report.completed,
                four_hackers = report.four_hackers,
                four_surfers = report.four_surfers,
                mixed = report.mixed,
                overlaps = report.overlaps,
                "CrossingLedger summary"
            );

            Reply::pending(async move {
                if let Some(tx) = tx {
                    // Ignore send errors - receiver may have been dropped
                    let _ = tx.send(report).await;
                }
            })
        });

        actor.start().await
    }
}
