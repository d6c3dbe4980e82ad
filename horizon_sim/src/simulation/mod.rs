// horizon_sim/src/simulation/mod.rs

pub mod config;
pub mod core;
pub mod error;
pub mod producers;
pub mod runner;
