//! The dock: shared state and every choke point of the boarding protocol.
//!
//! Lock order, outermost first:
//!
//! ```text
//! group lock -> crossing exclusion -> journal
//! ```
//!
//! The admission gate's testing mutex is never held together with any of
//! them. A captain keeps the crossing permit after releasing the group lock
//! and keeps the journal only until its "boards" line is written.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acton_reactive::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DockConfig;
use crate::error::Result;
use crate::events::{EventCursor, EventKind, EventLog, EventSink, MemoryJournal};
use crate::formation::{DockOccupancy, GroupComposition, OccupancyBoard};
use crate::gate::AdmissionGate;
use crate::journey::{CrossingExclusion, CrossingPermit, JourneyBarrier};
use crate::messages::{CrossingBoarded, CrossingLanded};
use crate::passenger::PassengerTag;
use crate::rendezvous::BoardingRendezvous;

/// Everything a passenger needs to captain the crossing it just formed.
#[derive(Debug)]
pub struct CaptainOrders {
    pub crossing: u64,
    pub composition: GroupComposition,
    permit: CrossingPermit,
    cursor: EventCursor,
}

/// Point-in-time view of the dock counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockSnapshot {
    pub capacity: usize,
    pub free_capacity: usize,
    pub occupancy: DockOccupancy,
    pub admissions: u64,
    pub crossings: u64,
    pub crossing_in_flight: bool,
}

impl DockSnapshot {
    /// True once every admitted passenger has crossed and the dock is empty.
    pub fn is_drained(&self) -> bool {
        self.occupancy.total() == 0
            && self.free_capacity == self.capacity
            && !self.crossing_in_flight
            && self.admissions == self.crossings * crate::formation::GROUP_SIZE as u64
    }
}

/// Builder wiring the dock to its journal sink and optional ledger actor.
pub struct DockBuilder {
    config: DockConfig,
    sink: Option<Arc<dyn EventSink>>,
    ledger: Option<ActorHandle>,
}

impl DockBuilder {
    pub fn new(config: DockConfig) -> Self {
        Self {
            config,
            sink: None,
            ledger: None,
        }
    }

    /// Journal destination. Defaults to a private in-memory journal.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Actor notified of every crossing start and end.
    pub fn ledger(mut self, ledger: ActorHandle) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Validate the configuration and create every gate.
    pub fn build(self) -> Result<Arc<Dock>> {
        self.config.validate()?;

        let gate = AdmissionGate::new(self.config.dock_capacity)?;
        let board = Arc::new(OccupancyBoard::default());
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(MemoryJournal::new()));

        info!(
            capacity = self.config.dock_capacity,
            riders_per_type = self.config.riders_per_type,
            max_cruise_ms = self.config.max_cruise_ms,
            "Dock open"
        );

        Ok(Arc::new(Dock {
            config: self.config,
            gate,
            group: Mutex::new(DockOccupancy::default()),
            log: EventLog::new(sink, board.clone()),
            board,
            rendezvous: BoardingRendezvous::new(),
            barrier: JourneyBarrier::new(),
            crossing: CrossingExclusion::new(),
            crossings: AtomicU64::new(0),
            admissions: AtomicU64::new(0),
            ledger: self.ledger,
        }))
    }
}

/// Shared state for one simulation, constructed once and torn down once.
pub struct Dock {
    config: DockConfig,
    gate: AdmissionGate,
    /// Group lock: occupancy mutation and formation decisions
    group: Mutex<DockOccupancy>,
    board: Arc<OccupancyBoard>,
    log: EventLog,
    rendezvous: BoardingRendezvous,
    barrier: JourneyBarrier,
    crossing: CrossingExclusion,
    crossings: AtomicU64,
    admissions: AtomicU64,
    ledger: Option<ActorHandle>,
}

impl fmt::Debug for Dock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dock")
            .field("occupancy", &self.board.snapshot())
            .field("free_capacity", &self.gate.free_capacity())
            .field("crossings", &self.crossings.load(Ordering::Relaxed))
            .field("has_ledger", &self.ledger.is_some())
            .finish()
    }
}

impl Dock {
    pub fn builder(config: DockConfig) -> DockBuilder {
        DockBuilder::new(config)
    }

    pub fn config(&self) -> &DockConfig {
        &self.config
    }

    /// Journal an event that needs no coordination.
    pub async fn announce(&self, passenger: PassengerTag, kind: EventKind) -> u64 {
        self.log.emit(passenger, kind).await
    }

    /// Try to reserve one unit of dock capacity.
    pub async fn try_admit(&self) -> Result<bool> {
        let admitted = self.gate.try_admit().await?;
        if admitted {
            self.admissions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(admitted)
    }

    /// Register on the dock and run the formation rule as one atomic step.
    ///
    /// Returns captain orders when this arrival completed a group. Either way
    /// the passenger then parks once with [`Dock::await_call`]; the captain
    /// keeps the journal cursor meanwhile, so no one else registers until its
    /// "boards" line is written.
    pub async fn register(&self, passenger: PassengerTag) -> Result<Option<CaptainOrders>> {
        let mut occupancy = self.group.lock().await;

        occupancy.arrive(passenger.kind);
        self.board.publish(&occupancy);
        self.log.emit(passenger, EventKind::Waits).await;

        let Some(composition) = occupancy.form_group() else {
            return Ok(None);
        };
        self.board.publish(&occupancy);

        let permit = self.crossing.acquire().await?;
        let cursor = self.log.reserve().await;
        let crossing = self.crossings.fetch_add(1, Ordering::AcqRel) + 1;
        let called = self.rendezvous.call_group(composition);

        debug!(
            captain = %passenger,
            crossing,
            composition = %composition,
            called,
            "Group formed"
        );

        Ok(Some(CaptainOrders {
            crossing,
            composition,
            permit,
            cursor,
        }))
    }

    /// Park on this passenger's type gate until its group is released.
    ///
    /// Returns the number of the crossing the passenger was called for.
    pub async fn await_call(&self, passenger: PassengerTag) -> Result<u64> {
        self.rendezvous.await_call(passenger.kind).await?;
        Ok(self.crossings.load(Ordering::Acquire))
    }

    /// Captain side of the journey barrier. Consumes the crossing permit.
    pub async fn captain_crossing(
        &self,
        captain: PassengerTag,
        orders: CaptainOrders,
        cruise: Duration,
    ) -> Result<u64> {
        let CaptainOrders {
            crossing,
            composition,
            permit,
            cursor,
        } = orders;

        self.gate.release_group();
        cursor.emit(captain, EventKind::Boards);

        if let Some(ledger) = &self.ledger {
            ledger
                .send(CrossingBoarded {
                    crossing,
                    captain,
                    composition,
                })
                .await;
        }

        if !cruise.is_zero() {
            tokio::time::sleep(cruise).await;
        }

        self.barrier.land_boat();
        self.barrier.await_crew_ashore().await?;

        self.log.emit(captain, EventKind::CaptainExits).await;

        if let Some(ledger) = &self.ledger {
            ledger.send(CrossingLanded { crossing, captain }).await;
        }

        info!(
            crossing,
            captain = %captain,
            composition = %composition,
            cruise_ms = cruise.as_millis() as u64,
            "Crossing complete"
        );

        permit.release();
        Ok(crossing)
    }

    /// Crew side of the journey barrier.
    pub async fn crew_crossing(&self, member: PassengerTag) -> Result<()> {
        self.barrier.await_landing().await?;
        self.log.emit(member, EventKind::MemberExits).await;
        self.barrier.step_ashore();
        Ok(())
    }

    pub fn snapshot(&self) -> DockSnapshot {
        DockSnapshot {
            capacity: self.gate.capacity(),
            free_capacity: self.gate.free_capacity(),
            occupancy: self.board.snapshot(),
            admissions: self.admissions.load(Ordering::Acquire),
            crossings: self.crossings.load(Ordering::Acquire),
            crossing_in_flight: self.crossing.is_in_flight(),
        }
    }

    /// Events written to the journal so far.
    pub async fn events_emitted(&self) -> u64 {
        self.log.emitted().await
    }

    /// Close every gate so that no waiter outlives the simulation.
    ///
    /// Passengers still parked wake with [`crate::FerryError::Closed`].
    pub fn close(&self) {
        self.gate.close();
        self.rendezvous.close();
        self.barrier.close();
        self.crossing.close();
        debug!(snapshot = ?self.snapshot(), "Dock closed");
    }
}
