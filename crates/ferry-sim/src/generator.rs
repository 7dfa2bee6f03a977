//! Passenger generators: one per passenger type.
//!
//! A generator spawns its riders one at a time with a random gap between
//! spawns, then waits for every one of them to finish its lifecycle. All
//! random draws derive from the generator seed, so a run seed fixes every
//! arrival gap, cruise time, and backoff.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use ferry_kernel::config::draw_delay;
use ferry_kernel::{Dock, DockConfig, Passenger, PassengerTag, PassengerType, Voyage};

/// Spawns the riders of one passenger type.
#[derive(Debug, Clone)]
pub struct PassengerGenerator {
    kind: PassengerType,
    riders: usize,
    max_delay_ms: u64,
    rng: ChaCha8Rng,
}

impl PassengerGenerator {
    /// Create the generator for `kind` using the bounds in `config`.
    pub fn new(kind: PassengerType, config: &DockConfig, seed: u64) -> Self {
        Self {
            kind,
            riders: config.riders_per_type,
            max_delay_ms: config.max_arrival_delay_ms(kind),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn kind(&self) -> PassengerType {
        self.kind
    }

    /// Spawn every rider, then wait for all of them.
    ///
    /// Voyages come back in id order. Returns as soon as any rider fails.
    pub async fn run(mut self, dock: Arc<Dock>) -> Result<Vec<Voyage>> {
        let mut handles = Vec::with_capacity(self.riders);

        for id in 1..=self.riders {
            if id > 1 {
                tokio::time::sleep(draw_delay(&mut self.rng, self.max_delay_ms)).await;
            }

            let tag = PassengerTag::new(self.kind, id as u32);
            let passenger = Passenger::new(tag, self.rng.random());
            debug!(passenger = %tag, "Spawning passenger");
            handles.push(tokio::spawn(passenger.run(dock.clone())));
        }

        info!(kind = %self.kind, riders = self.riders, "Generator finished spawning");

        // Fails on the first rider that errors; the rest are woken by the
        // caller closing the dock.
        let kind = self.kind;
        try_join_all(handles.into_iter().enumerate().map(|(index, handle)| async move {
            handle
                .await
                .with_context(|| format!("{kind} {} task panicked", index + 1))?
                .with_context(|| format!("{kind} {} did not finish", index + 1))
        }))
        .await
    }
}

/// Derive one seed per generator from the run seed.
pub fn generator_seeds(run_seed: u64) -> [u64; 2] {
    let mut rng = ChaCha8Rng::seed_from_u64(run_seed);
    [rng.random(), rng.random()]
}
