// horizon_core/src/synchronizer.rs

use std::collections::BTreeSet;
use tracing::warn;
use uuid::Uuid;

use crate::graph::Graph;
use crate::stamp::Stamp;
use crate::variables::{VariableKind, VariableType};

/// Finds the newest stamp at which a device has every required variable.
///
/// Producers contribute parts of a state independently (a pose from one sensor, a
/// velocity from another), so the newest stamp in the graph is not necessarily one a
/// consumer can use yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronizer {
    device_id: Uuid,
    required: Vec<VariableType>,
    lookback: f64,
}

impl Synchronizer {
    /// `lookback` is how far, in seconds, behind the newest candidate stamp the search goes.
    /// Landmark types carry no stamp and are ignored.
    pub fn new(device_id: Uuid, required: &[VariableType], lookback: f64) -> Self {
        let mut types: Vec<VariableType> = Vec::with_capacity(required.len());
        for variable_type in required {
            if !variable_type.is_stamped() {
                warn!(
                    "Synchronizer ignores unstamped variable type {}.",
                    variable_type.type_name()
                );
                continue;
            }
            if !types.contains(variable_type) {
                types.push(*variable_type);
            }
        }
        Self {
            device_id,
            required: types,
            lookback: lookback.max(0.0),
        }
    }

    pub fn pose_2d(device_id: Uuid, lookback: f64) -> Self {
        Self::new(
            device_id,
            &[VariableType::Position2DStamped, VariableType::Orientation2DStamped],
            lookback,
        )
    }

    pub fn pose_3d(device_id: Uuid, lookback: f64) -> Self {
        Self::new(
            device_id,
            &[VariableType::Position3DStamped, VariableType::Orientation3DStamped],
            lookback,
        )
    }

    pub fn odometry_2d(device_id: Uuid, lookback: f64) -> Self {
        Self::new(
            device_id,
            &[
                VariableType::Position2DStamped,
                VariableType::Orientation2DStamped,
                VariableType::VelocityLinear2DStamped,
                VariableType::VelocityAngular2DStamped,
            ],
            lookback,
        )
    }

    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    pub fn required(&self) -> &[VariableType] {
        &self.required
    }

    fn complete_at(&self, graph: &Graph, stamp: Stamp) -> bool {
        self.required.iter().all(|variable_type| {
            VariableKind::stamped(*variable_type, stamp, self.device_id)
                .is_some_and(|kind| graph.variable_exists(&kind.derive_uuid()))
        })
    }

    /// The newest stamp at which every required variable exists, or `None`.
    pub fn find_latest_common_stamp(&self, graph: &Graph) -> Option<Stamp> {
        if self.required.is_empty() {
            return None;
        }
        let stamps: BTreeSet<Stamp> = graph
            .variables()
            .filter(|v| self.required.contains(&v.variable_type()))
            .filter_map(|v| v.kind().stamped_key())
            .filter(|(_, device_id)| *device_id == self.device_id)
            .map(|(stamp, _)| stamp)
            .collect();

        let newest = *stamps.iter().next_back()?;
        let horizon = newest.offset_secs(-self.lookback);
        stamps
            .range(horizon..=newest)
            .rev()
            .copied()
            .find(|stamp| self.complete_at(graph, *stamp))
    }
}
