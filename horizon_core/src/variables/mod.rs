// horizon_core/src/variables/mod.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::identity;
use crate::stamp::Stamp;

pub mod manifold;

pub use manifold::{wrap_angle, Manifold};

// =========================================================================
// == Variable Types ==
// =========================================================================

/// Every concrete kind of variable the engine knows about, without its key fields.
///
/// This is a closed set: a new kind is added here, together with its dimension and
/// manifold, and the compiler points at every match that needs to learn about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableType {
    Position2DStamped,
    Orientation2DStamped,
    VelocityLinear2DStamped,
    VelocityAngular2DStamped,
    Position3DStamped,
    Orientation3DStamped,
    Point3DLandmark,
}

impl VariableType {
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableType::Position2DStamped => "Position2DStamped",
            VariableType::Orientation2DStamped => "Orientation2DStamped",
            VariableType::VelocityLinear2DStamped => "VelocityLinear2DStamped",
            VariableType::VelocityAngular2DStamped => "VelocityAngular2DStamped",
            VariableType::Position3DStamped => "Position3DStamped",
            VariableType::Orientation3DStamped => "Orientation3DStamped",
            VariableType::Point3DLandmark => "Point3DLandmark",
        }
    }

    /// Number of stored values.
    pub fn dimension(&self) -> usize {
        match self {
            VariableType::Position2DStamped | VariableType::VelocityLinear2DStamped => 2,
            VariableType::Orientation2DStamped | VariableType::VelocityAngular2DStamped => 1,
            VariableType::Position3DStamped | VariableType::Point3DLandmark => 3,
            VariableType::Orientation3DStamped => 4,
        }
    }

    pub fn manifold(&self) -> Manifold {
        match self {
            VariableType::Orientation2DStamped => Manifold::Angle,
            VariableType::Orientation3DStamped => Manifold::Quaternion,
            _ => Manifold::Euclidean,
        }
    }

    /// Number of degrees of freedom (size of the tangent space).
    pub fn local_size(&self) -> usize {
        self.manifold().local_size(self.dimension())
    }

    pub fn is_stamped(&self) -> bool {
        !matches!(self, VariableType::Point3DLandmark)
    }

    /// The value a freshly created variable starts from.
    pub fn default_data(&self) -> Vec<f64> {
        match self {
            VariableType::Orientation3DStamped => vec![1.0, 0.0, 0.0, 0.0],
            _ => vec![0.0; self.dimension()],
        }
    }
}

// =========================================================================
// == Variable Kinds (type + key fields) ==
// =========================================================================

/// The type of a variable together with the fields that identify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VariableKind {
    Position2DStamped { stamp: Stamp, device_id: Uuid },
    Orientation2DStamped { stamp: Stamp, device_id: Uuid },
    VelocityLinear2DStamped { stamp: Stamp, device_id: Uuid },
    VelocityAngular2DStamped { stamp: Stamp, device_id: Uuid },
    Position3DStamped { stamp: Stamp, device_id: Uuid },
    Orientation3DStamped { stamp: Stamp, device_id: Uuid },
    Point3DLandmark { landmark_id: u64 },
}

impl VariableKind {
    /// Builds the stamped kind of the given type. Returns `None` for landmark types.
    pub fn stamped(variable_type: VariableType, stamp: Stamp, device_id: Uuid) -> Option<Self> {
        let kind = match variable_type {
            VariableType::Position2DStamped => VariableKind::Position2DStamped { stamp, device_id },
            VariableType::Orientation2DStamped => VariableKind::Orientation2DStamped { stamp, device_id },
            VariableType::VelocityLinear2DStamped => {
                VariableKind::VelocityLinear2DStamped { stamp, device_id }
            }
            VariableType::VelocityAngular2DStamped => {
                VariableKind::VelocityAngular2DStamped { stamp, device_id }
            }
            VariableType::Position3DStamped => VariableKind::Position3DStamped { stamp, device_id },
            VariableType::Orientation3DStamped => VariableKind::Orientation3DStamped { stamp, device_id },
            VariableType::Point3DLandmark => return None,
        };
        Some(kind)
    }

    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableKind::Position2DStamped { .. } => VariableType::Position2DStamped,
            VariableKind::Orientation2DStamped { .. } => VariableType::Orientation2DStamped,
            VariableKind::VelocityLinear2DStamped { .. } => VariableType::VelocityLinear2DStamped,
            VariableKind::VelocityAngular2DStamped { .. } => VariableType::VelocityAngular2DStamped,
            VariableKind::Position3DStamped { .. } => VariableType::Position3DStamped,
            VariableKind::Orientation3DStamped { .. } => VariableType::Orientation3DStamped,
            VariableKind::Point3DLandmark { .. } => VariableType::Point3DLandmark,
        }
    }

    /// The stamp and device of a time-indexed kind.
    pub fn stamped_key(&self) -> Option<(Stamp, Uuid)> {
        match *self {
            VariableKind::Position2DStamped { stamp, device_id }
            | VariableKind::Orientation2DStamped { stamp, device_id }
            | VariableKind::VelocityLinear2DStamped { stamp, device_id }
            | VariableKind::VelocityAngular2DStamped { stamp, device_id }
            | VariableKind::Position3DStamped { stamp, device_id }
            | VariableKind::Orientation3DStamped { stamp, device_id } => Some((stamp, device_id)),
            VariableKind::Point3DLandmark { .. } => None,
        }
    }

    /// The address this kind derives to.
    pub fn derive_uuid(&self) -> Uuid {
        let type_name = self.variable_type().type_name();
        match *self {
            VariableKind::Point3DLandmark { landmark_id } => identity::for_landmark(type_name, landmark_id),
            _ => {
                // Every other kind is stamped.
                let (stamp, device_id) = self.stamped_key().unwrap_or((Stamp::ZERO, identity::DEFAULT_DEVICE));
                identity::for_stamped(type_name, stamp, device_id)
            }
        }
    }
}

// =========================================================================
// == Variable ==
// =========================================================================

/// An addressable block of continuous state.
///
/// Two variables are equal when their uuids are equal; values are never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    uuid: Uuid,
    kind: VariableKind,
    data: Vec<f64>,
}

impl Variable {
    /// Creates a variable of the given kind with its default value.
    pub fn new(kind: VariableKind) -> Self {
        Self {
            uuid: kind.derive_uuid(),
            data: kind.variable_type().default_data(),
            kind,
        }
    }

    pub fn position_2d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::Position2DStamped { stamp, device_id })
    }

    pub fn orientation_2d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::Orientation2DStamped { stamp, device_id })
    }

    pub fn velocity_linear_2d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::VelocityLinear2DStamped { stamp, device_id })
    }

    pub fn velocity_angular_2d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::VelocityAngular2DStamped { stamp, device_id })
    }

    pub fn position_3d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::Position3DStamped { stamp, device_id })
    }

    pub fn orientation_3d(stamp: Stamp, device_id: Uuid) -> Self {
        Self::new(VariableKind::Orientation3DStamped { stamp, device_id })
    }

    pub fn point_3d_landmark(landmark_id: u64) -> Self {
        Self::new(VariableKind::Point3DLandmark { landmark_id })
    }

    /// Replaces the value, consuming and returning the variable.
    pub fn with_data(mut self, data: Vec<f64>) -> Result<Self, ValidationError> {
        self.set_data(data)?;
        Ok(self)
    }

    pub fn set_data(&mut self, data: Vec<f64>) -> Result<(), ValidationError> {
        let variable_type = self.variable_type();
        check_values(variable_type, &data)?;
        self.data = match variable_type.manifold() {
            Manifold::Angle => vec![wrap_angle(data[0])],
            Manifold::Quaternion => manifold::quaternion_to_vec(&manifold::quaternion_from_slice(&data)),
            Manifold::Euclidean => data,
        };
        Ok(())
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn variable_type(&self) -> VariableType {
        self.kind.variable_type()
    }

    pub fn type_name(&self) -> &'static str {
        self.variable_type().type_name()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn dimension(&self) -> usize {
        self.variable_type().dimension()
    }

    pub fn local_size(&self) -> usize {
        self.variable_type().local_size()
    }

    pub fn manifold(&self) -> Manifold {
        self.variable_type().manifold()
    }

    /// The time this variable describes, if it is time-indexed.
    pub fn stamp(&self) -> Option<Stamp> {
        self.kind.stamped_key().map(|(stamp, _)| stamp)
    }

    pub fn device_id(&self) -> Option<Uuid> {
        self.kind.stamped_key().map(|(_, device_id)| device_id)
    }

    /// Returns `self ⊞ delta` without modifying the variable.
    pub fn manifold_plus(&self, delta: &[f64]) -> Result<Vec<f64>, ValidationError> {
        if delta.len() != self.local_size() {
            return Err(ValidationError::DimensionMismatch {
                type_name: self.type_name(),
                what: "tangent delta",
                expected: self.local_size(),
                actual: delta.len(),
            });
        }
        Ok(self.manifold().plus(&self.data, delta))
    }

    /// Returns the tangent delta `self ⊟ other`, i.e. the step that takes `other` to `self`.
    pub fn manifold_minus(&self, other: &Variable) -> Result<Vec<f64>, ValidationError> {
        if other.variable_type() != self.variable_type() {
            return Err(ValidationError::WrongVariableKind {
                type_name: self.type_name(),
                index: 0,
                expected: self.type_name(),
                actual: other.type_name(),
            });
        }
        Ok(self.manifold().minus(&self.data, &other.data))
    }

    /// Checks everything a deserialized or hand-built variable could get wrong.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_values(self.variable_type(), &self.data)?;
        if self.uuid != self.kind.derive_uuid() {
            return Err(ValidationError::UuidMismatch {
                type_name: self.type_name(),
                stored: self.uuid,
            });
        }
        Ok(())
    }
}

fn check_values(variable_type: VariableType, data: &[f64]) -> Result<(), ValidationError> {
    if data.len() != variable_type.dimension() {
        return Err(ValidationError::InvalidDimension {
            type_name: variable_type.type_name(),
            expected: variable_type.dimension(),
            actual: data.len(),
        });
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite {
            type_name: variable_type.type_name(),
            what: "data",
        });
    }
    if variable_type.manifold() == Manifold::Quaternion && manifold::is_degenerate_quaternion(data) {
        return Err(ValidationError::ZeroNorm {
            type_name: variable_type.type_name(),
        });
    }
    Ok(())
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.type_name())?;
        writeln!(f, "  uuid: {}", self.uuid)?;
        match self.kind {
            VariableKind::Point3DLandmark { landmark_id } => writeln!(f, "  landmark_id: {}", landmark_id)?,
            _ => {
                if let Some((stamp, device_id)) = self.kind.stamped_key() {
                    writeln!(f, "  device_id: {}", device_id)?;
                    writeln!(f, "  stamp: {}", stamp)?;
                }
            }
        }
        writeln!(f, "  size: {}", self.data.len())?;
        write!(f, "  data: {:?}", self.data)
    }
}
