// horizon_sim/src/prelude.rs

// Re-export the entire horizon_core prelude so pure types like `Transaction`,
// `Smoother` and `Synchronizer` are one import away.
pub use horizon_core::prelude::*;

// Re-export common simulation-specific types.
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::load_scenario;
pub use crate::simulation::core::clock::SimClock;
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::trajectory::{Pose2D, Trajectory};
pub use crate::simulation::error::SimError;
pub use crate::simulation::producers::{LandmarkProducer, OdometryProducer, PoseFixProducer, Producer};
pub use crate::simulation::runner::{run, SimulationReport, TrackingSample};
