//! Passengers and the lifecycle each one runs exactly once.
//!
//! ```text
//! Start -> Admitting --(dock full: leaves queue, backoff, is back)--> Admitting
//!              |
//!              v
//!          Registered --(formed a group)--> Boarding --(own gate)--> Captain --+
//!              |                                                              +--> Exited
//!              v                                                              |
//!        AwaitingGroup --(called aboard)--> Crew -----------------------------+
//! ```

use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::draw_delay;
use crate::dock::{CaptainOrders, Dock};
use crate::error::Result;
use crate::events::EventKind;

/// The two kinds of people riding the ferry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    Hacker,
    Surfer,
}

impl PassengerType {
    pub const ALL: [PassengerType; 2] = [Self::Hacker, Self::Surfer];

    /// Journal label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hacker => "HACK",
            Self::Surfer => "SERF",
        }
    }
}

impl fmt::Display for PassengerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type plus per-type id (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassengerTag {
    pub kind: PassengerType,
    pub id: u32,
}

impl PassengerTag {
    pub fn new(kind: PassengerType, id: u32) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for PassengerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Role a passenger ends up with once its group forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Captain,
    Crew,
}

/// Outcome of one completed lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voyage {
    pub passenger: PassengerTag,
    pub role: Role,
    /// 1-based crossing number this passenger rode
    pub crossing: u64,
    /// Times the passenger found the dock full
    pub retries: u32,
}

#[derive(Debug)]
enum Stage {
    Start,
    Admitting,
    Registered,
    AwaitingGroup,
    Boarding(CaptainOrders),
    Captain(CaptainOrders),
    Crew { crossing: u64 },
}

/// One simulated person.
#[derive(Debug, Clone)]
pub struct Passenger {
    tag: PassengerTag,
    rng: ChaCha8Rng,
}

impl Passenger {
    /// Create a passenger whose random draws derive from `seed`.
    pub fn new(tag: PassengerTag, seed: u64) -> Self {
        Self {
            tag,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn tag(&self) -> PassengerTag {
        self.tag
    }

    /// Run the full lifecycle against `dock`.
    ///
    /// Only fails when the dock is torn down underneath the passenger.
    pub async fn run(mut self, dock: Arc<Dock>) -> Result<Voyage> {
        let tag = self.tag;
        let mut retries = 0u32;
        let mut stage = Stage::Start;

        loop {
            stage = match stage {
                Stage::Start => {
                    dock.announce(tag, EventKind::Starts).await;
                    Stage::Admitting
                }
                Stage::Admitting => {
                    if dock.try_admit().await? {
                        Stage::Registered
                    } else {
                        dock.announce(tag, EventKind::LeavesQueue).await;
                        let backoff =
                            draw_delay(&mut self.rng, dock.config().recheck_ceiling_ms());
                        trace!(passenger = %tag, backoff_ms = backoff.as_millis() as u64, "Dock full, backing off");
                        tokio::time::sleep(backoff).await;
                        dock.announce(tag, EventKind::IsBack).await;
                        retries += 1;
                        Stage::Admitting
                    }
                }
                Stage::Registered => match dock.register(tag).await? {
                    Some(orders) => Stage::Boarding(orders),
                    None => Stage::AwaitingGroup,
                },
                Stage::AwaitingGroup => {
                    let crossing = dock.await_call(tag).await?;
                    Stage::Crew { crossing }
                }
                Stage::Boarding(orders) => {
                    dock.await_call(tag).await?;
                    Stage::Captain(orders)
                }
                Stage::Captain(orders) => {
                    let cruise = draw_delay(&mut self.rng, dock.config().max_cruise_ms);
                    let crossing = dock.captain_crossing(tag, orders, cruise).await?;
                    debug!(passenger = %tag, crossing, retries, "Captain ashore");
                    return Ok(Voyage {
                        passenger: tag,
                        role: Role::Captain,
                        crossing,
                        retries,
                    });
                }
                Stage::Crew { crossing } => {
                    dock.crew_crossing(tag).await?;
                    debug!(passenger = %tag, crossing, retries, "Crew member ashore");
                    return Ok(Voyage {
                        passenger: tag,
                        role: Role::Crew,
                        crossing,
                        retries,
                    });
                }
            };
        }
    }
}
