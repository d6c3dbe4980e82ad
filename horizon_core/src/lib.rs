// horizon_core/src/lib.rs

// Public modules of the smoothing engine.
pub mod constraints;
pub mod error;
pub mod graph;
pub mod identity;
pub mod loss;
pub mod params;
pub mod prelude;
pub mod smoother;
pub mod solver;
pub mod stamp;
pub mod synchronizer;
pub mod transaction;
pub mod variables;
