//! Deterministic random streams.
//!
//! Streams are counter-based: the seed for a stream is derived from
//! (master seed, system id, tick), so no generator state has to be saved with
//! the game and a reloaded state replays the same draws.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Stable identifier for a random stream.
pub type SystemId = u32;

pub const CALENDAR_STREAM: SystemId = 1;
pub const AGENT_STREAM: SystemId = 2;
pub const ECONOMY_STREAM: SystemId = 3;
pub const WEATHER_STREAM: SystemId = 4;
pub const STATS_STREAM: SystemId = 5;
pub const COASTER_STREAM: SystemId = 6;

#[derive(Debug, Clone, Copy)]
pub struct RngManager {
    master_seed: u64,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self { master_seed: seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn stream(&self, system_id: SystemId, tick: u64) -> SystemRng {
        SystemRng {
            inner: ChaCha8Rng::seed_from_u64(self.derive_seed(system_id, 0, tick)),
        }
    }

    /// Per-entity stream, for draws that must not shift when other entities
    /// are added or removed.
    pub fn entity_stream(&self, system_id: SystemId, entity_id: u64, tick: u64) -> SystemRng {
        SystemRng {
            inner: ChaCha8Rng::seed_from_u64(self.derive_seed(system_id, entity_id, tick)),
        }
    }

    fn derive_seed(&self, system_id: SystemId, entity_id: u64, tick: u64) -> u64 {
        let mut seed = self.master_seed;
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= (system_id as u64).wrapping_mul(1103515245);
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= entity_id.wrapping_mul(48271);
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= tick.wrapping_mul(69069);
        seed
    }
}

pub struct SystemRng {
    inner: ChaCha8Rng,
}

impl RngCore for SystemRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Helpers for the draws the simulation makes over and over.
pub trait RngExt {
    fn unit(&mut self) -> f32;
    fn chance(&mut self, probability: f64) -> bool;
    fn between(&mut self, min: f32, max: f32) -> f32;
}

impl<R: Rng> RngExt for R {
    fn unit(&mut self) -> f32 {
        self.gen::<f32>()
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.gen::<f64>() < probability
    }

    fn between(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.gen::<f32>()
    }
}
