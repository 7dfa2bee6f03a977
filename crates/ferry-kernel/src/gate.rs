//! Admission gate: bounded dock capacity behind a testing mutex.

use tokio::sync::{Mutex, Semaphore, TryAcquireError};

use crate::error::{FerryError, Result};
use crate::formation::GROUP_SIZE;

/// Free dock capacity plus the mutex that serializes capacity checks.
///
/// A passenger either reserves one unit or learns the dock is full; two
/// concurrent testers can never both take the last unit.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    free: Semaphore,
    testing: Mutex<()>,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > Semaphore::MAX_PERMITS {
            return Err(FerryError::ResourceInit {
                resource: "dock capacity",
                reason: format!(
                    "{capacity} exceeds the semaphore limit of {}",
                    Semaphore::MAX_PERMITS
                ),
            });
        }
        Ok(Self {
            capacity,
            free: Semaphore::new(capacity),
            testing: Mutex::new(()),
        })
    }

    /// Peek-then-take under the testing mutex. Never blocks on capacity.
    pub async fn try_admit(&self) -> Result<bool> {
        let _testing = self.testing.lock().await;
        match self.free.try_acquire() {
            Ok(permit) => {
                permit.forget();
                Ok(true)
            }
            Err(TryAcquireError::NoPermits) => Ok(false),
            Err(TryAcquireError::Closed) => Err(FerryError::Closed("admission gate")),
        }
    }

    /// Give back the dock space of one boarded group.
    pub fn release_group(&self) {
        self.free.add_permits(GROUP_SIZE);
        debug_assert!(self.free.available_permits() <= self.capacity);
    }

    pub fn free_capacity(&self) -> usize {
        self.free.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn close(&self) {
        self.free.close();
    }
}
