// horizon_sim/src/simulation/core/prng.rs

use horizon_core::identity;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// The central, deterministic pseudo-random number generator for the simulation.
///
/// Every producer draws from its own stream, keyed by its name, so adding a sensor to a
/// scenario does not change the noise another sensor sees.
#[derive(Debug, Clone)]
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Returns the configured seed, or draws one from entropy. The seed in use is logged
    /// so a run can be repeated.
    pub fn resolve_seed(seed: Option<u64>) -> u64 {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        info!("Simulation seed: {}", seed);
        seed
    }

    /// An independent generator for the producer called `name`.
    pub fn stream(&self, name: &str) -> ChaCha8Rng {
        let mut rng = self.0.clone();
        rng.set_stream(identity::from_name(name).as_u64_pair().0);
        rng
    }
}
