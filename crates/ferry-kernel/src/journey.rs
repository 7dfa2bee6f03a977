//! Journey barrier and crossing exclusion.
//!
//! ```text
//! Captain                          Crew (x3)
//!   |-- boards, cruises               |-- await_landing()
//!   |-- land_boat()  ---- 3 ------->  |
//!   |                                 |-- member exits
//!   |-- await_crew_ashore() <-- 1 --  |-- step_ashore()
//!   |-- captain exits
//!   `-- drop CrossingPermit
//! ```

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{FerryError, Result};
use crate::formation::CREW_SIZE;

/// Two-phase captain-led barrier for one crossing at a time.
#[derive(Debug)]
pub struct JourneyBarrier {
    boat_is_back: Semaphore,
    captain_waits: Semaphore,
}

impl Default for JourneyBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl JourneyBarrier {
    pub fn new() -> Self {
        Self {
            boat_is_back: Semaphore::new(0),
            captain_waits: Semaphore::new(0),
        }
    }

    /// Captain: the boat is back, let the three crew members off.
    pub fn land_boat(&self) {
        self.boat_is_back.add_permits(CREW_SIZE);
    }

    /// Crew: wait for the captain to bring the boat back.
    pub async fn await_landing(&self) -> Result<()> {
        self.boat_is_back
            .acquire()
            .await
            .map_err(|_| FerryError::Closed("journey barrier"))?
            .forget();
        Ok(())
    }

    /// Crew: report being off the boat.
    pub fn step_ashore(&self) {
        self.captain_waits.add_permits(1);
    }

    /// Captain: wait until every crew member has left the boat.
    pub async fn await_crew_ashore(&self) -> Result<()> {
        self.captain_waits
            .acquire_many(CREW_SIZE as u32)
            .await
            .map_err(|_| FerryError::Closed("journey barrier"))?
            .forget();
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.boat_is_back.close();
        self.captain_waits.close();
    }
}

/// Global lock allowing a single crossing in flight.
#[derive(Debug, Clone)]
pub struct CrossingExclusion {
    boat: Arc<Semaphore>,
}

impl Default for CrossingExclusion {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossingExclusion {
    pub fn new() -> Self {
        Self {
            boat: Arc::new(Semaphore::new(1)),
        }
    }

    /// Block until no other crossing is in flight.
    pub async fn acquire(&self) -> Result<CrossingPermit> {
        let permit = self
            .boat
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FerryError::Closed("crossing exclusion"))?;
        Ok(CrossingPermit { _permit: permit })
    }

    pub fn is_in_flight(&self) -> bool {
        self.boat.available_permits() == 0
    }

    pub(crate) fn close(&self) {
        self.boat.close();
    }
}

/// Held by the captain from group formation until it has disembarked.
#[derive(Debug)]
pub struct CrossingPermit {
    _permit: OwnedSemaphorePermit,
}

impl CrossingPermit {
    /// End the crossing and let the next group form.
    pub fn release(self) {}
}
