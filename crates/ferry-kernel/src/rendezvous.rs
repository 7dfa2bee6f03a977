//! Boarding rendezvous: per-type release gates for the members of a new group.

use tokio::sync::Semaphore;

use crate::error::{FerryError, Result};
use crate::formation::GroupComposition;
use crate::passenger::PassengerType;

/// One counting gate per passenger type.
///
/// Every registered passenger parks on its own type's gate exactly once,
/// the captain included. The captain posts one signal per group member, so
/// exactly four waiters pass per group. While the captain holds the journal
/// cursor nobody else can register, so the waiters of each type match the
/// signals posted for it.
#[derive(Debug)]
pub struct BoardingRendezvous {
    hackers: Semaphore,
    surfers: Semaphore,
}

impl Default for BoardingRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardingRendezvous {
    pub fn new() -> Self {
        Self {
            hackers: Semaphore::new(0),
            surfers: Semaphore::new(0),
        }
    }

    fn gate(&self, kind: PassengerType) -> &Semaphore {
        match kind {
            PassengerType::Hacker => &self.hackers,
            PassengerType::Surfer => &self.surfers,
        }
    }

    /// Release every member of `composition`, captain included.
    ///
    /// Returns the number of signals posted.
    pub fn call_group(&self, composition: GroupComposition) -> usize {
        let seats = composition.seats();
        self.hackers.add_permits(seats.hackers);
        self.surfers.add_permits(seats.surfers);
        seats.total()
    }

    /// Park until a passenger of this type is released to board.
    pub async fn await_call(&self, kind: PassengerType) -> Result<()> {
        self.gate(kind)
            .acquire()
            .await
            .map_err(|_| FerryError::Closed("boarding rendezvous"))?
            .forget();
        Ok(())
    }

    /// Signals posted but not yet consumed for `kind`.
    pub fn pending(&self, kind: PassengerType) -> usize {
        self.gate(kind).available_permits()
    }

    pub(crate) fn close(&self) {
        self.hackers.close();
        self.surfers.close();
    }
}
