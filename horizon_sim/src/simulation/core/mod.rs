// horizon_sim/src/simulation/core/mod.rs

pub mod clock;
pub mod prng;
pub mod trajectory;
