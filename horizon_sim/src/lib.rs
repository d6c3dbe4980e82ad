// horizon_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the horizon_sim crate.
pub mod prelude;

// Command-line surface shared by the binary and any demo that wants it.
pub mod cli;
// Scenario configuration, ground truth, simulated sensors and the run loop.
pub mod simulation;
