// horizon_core/src/constraints/mod.rs

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::identity;
use crate::loss::Loss;
use crate::variables::manifold::is_degenerate_quaternion;
use crate::variables::{Manifold, Variable, VariableType};

pub mod residual;

/// Step used for the central-difference Jacobians, in tangent-space units.
const NUMERIC_DIFF_STEP: f64 = 1e-6;

// =========================================================================
// == Constraint Kinds ==
// =========================================================================

/// The residual relation a constraint encodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstraintKind {
    /// A prior or direct measurement of one variable: `r = x ⊟ mean`.
    Absolute,
    /// A measured tangent step between two variables of the same type:
    /// `r = (x2 ⊟ x1) ⊟ mean`.
    Relative,
    /// A full 3D pose measurement over a position and an orientation variable.
    AbsolutePose3D,
    /// A constant-velocity motion model linking two 2D position/velocity states.
    ConstantVelocity2D { dt: f64 },
}

impl ConstraintKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstraintKind::Absolute => "AbsoluteConstraint",
            ConstraintKind::Relative => "RelativeConstraint",
            ConstraintKind::AbsolutePose3D => "AbsolutePose3DConstraint",
            ConstraintKind::ConstantVelocity2D { .. } => "ConstantVelocity2DConstraint",
        }
    }

    /// Checks the referenced variable types and returns `(mean size, residual size)`.
    fn shape(&self, types: &[VariableType]) -> Result<(usize, usize), ValidationError> {
        let type_name = self.type_name();
        match self {
            ConstraintKind::Absolute => {
                expect_count(type_name, types, 1)?;
                Ok((types[0].dimension(), types[0].local_size()))
            }
            ConstraintKind::Relative => {
                expect_count(type_name, types, 2)?;
                expect_type(type_name, types, 1, types[0])?;
                Ok((types[0].local_size(), types[0].local_size()))
            }
            ConstraintKind::AbsolutePose3D => {
                expect_count(type_name, types, 2)?;
                expect_type(type_name, types, 0, VariableType::Position3DStamped)?;
                expect_type(type_name, types, 1, VariableType::Orientation3DStamped)?;
                Ok((7, 6))
            }
            ConstraintKind::ConstantVelocity2D { dt } => {
                expect_count(type_name, types, 4)?;
                expect_type(type_name, types, 0, VariableType::Position2DStamped)?;
                expect_type(type_name, types, 1, VariableType::VelocityLinear2DStamped)?;
                expect_type(type_name, types, 2, VariableType::Position2DStamped)?;
                expect_type(type_name, types, 3, VariableType::VelocityLinear2DStamped)?;
                if !dt.is_finite() {
                    return Err(ValidationError::NonFinite { type_name, what: "dt" });
                }
                Ok((4, 4))
            }
        }
    }

    /// Where the mean stores a quaternion, if it stores one.
    fn quaternion_mean(&self, types: &[VariableType]) -> Option<Range<usize>> {
        match self {
            ConstraintKind::Absolute if types[0].manifold() == Manifold::Quaternion => Some(0..4),
            ConstraintKind::AbsolutePose3D => Some(3..7),
            _ => None,
        }
    }
}

fn expect_count(type_name: &'static str, types: &[VariableType], expected: usize) -> Result<(), ValidationError> {
    if types.len() != expected {
        return Err(ValidationError::VariableCount {
            type_name,
            expected,
            actual: types.len(),
        });
    }
    Ok(())
}

fn expect_type(
    type_name: &'static str,
    types: &[VariableType],
    index: usize,
    expected: VariableType,
) -> Result<(), ValidationError> {
    if types[index] != expected {
        return Err(ValidationError::WrongVariableKind {
            type_name,
            index,
            expected: expected.type_name(),
            actual: types[index].type_name(),
        });
    }
    Ok(())
}

/// Computes the upper-triangular square root information matrix `S` with
/// `SᵀS = covariance⁻¹`.
pub fn sqrt_information_from_covariance(covariance: &DMatrix<f64>) -> Result<DMatrix<f64>, ValidationError> {
    let information = covariance
        .clone()
        .try_inverse()
        .ok_or(ValidationError::NotPositiveDefinite)?;
    // Symmetrize before factoring; inversion leaves tiny asymmetries.
    let information = (&information + information.transpose()) * 0.5;
    let cholesky = Cholesky::new(information).ok_or(ValidationError::NotPositiveDefinite)?;
    Ok(cholesky.l().transpose())
}

// =========================================================================
// == Constraint ==
// =========================================================================

/// A weighted residual relation over one or more variables.
///
/// A constraint only refers to its variables by uuid; the graph guarantees they exist
/// while the constraint is live. The variable types are recorded so the constraint can
/// validate and evaluate itself without the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    uuid: Uuid,
    source: String,
    kind: ConstraintKind,
    variables: Vec<Uuid>,
    variable_types: Vec<VariableType>,
    mean: Vec<f64>,
    sqrt_information: DMatrix<f64>,
    loss: Option<Loss>,
}

impl Constraint {
    /// Builds and validates a constraint. The uuid is derived from the type, source,
    /// variables and measurement, so re-creating the same measurement yields the same id.
    pub fn new(
        source: &str,
        kind: ConstraintKind,
        variables: &[&Variable],
        mean: Vec<f64>,
        sqrt_information: DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        let uuids: Vec<Uuid> = variables.iter().map(|v| v.uuid()).collect();
        let constraint = Self {
            uuid: identity::for_constraint(kind.type_name(), source, &uuids, &mean),
            source: source.to_string(),
            kind,
            variables: uuids,
            variable_types: variables.iter().map(|v| v.variable_type()).collect(),
            mean,
            sqrt_information,
            loss: None,
        };
        constraint.validate()?;
        Ok(constraint)
    }

    /// Like [`Constraint::new`], with the weighting given as a measurement covariance.
    pub fn from_covariance(
        source: &str,
        kind: ConstraintKind,
        variables: &[&Variable],
        mean: Vec<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        let sqrt_information = sqrt_information_from_covariance(covariance)?;
        Self::new(source, kind, variables, mean, sqrt_information)
    }

    /// A prior/measurement on a single variable, given the measurement covariance.
    pub fn absolute(
        source: &str,
        variable: &Variable,
        mean: Vec<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        Self::from_covariance(source, ConstraintKind::Absolute, &[variable], mean, covariance)
    }

    /// A measured tangent step from `from` to `to`.
    pub fn relative(
        source: &str,
        from: &Variable,
        to: &Variable,
        delta: Vec<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        Self::from_covariance(source, ConstraintKind::Relative, &[from, to], delta, covariance)
    }

    /// A 3D pose measurement. `mean` is `(x, y, z, qw, qx, qy, qz)`, the covariance is 6x6
    /// over `(x, y, z, rx, ry, rz)`.
    pub fn absolute_pose_3d(
        source: &str,
        position: &Variable,
        orientation: &Variable,
        mean: Vec<f64>,
        covariance: &DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        let sqrt_information = sqrt_information_from_covariance(covariance)?;
        Self::new(
            source,
            ConstraintKind::AbsolutePose3D,
            &[position, orientation],
            mean,
            sqrt_information,
        )
    }

    /// A constant-velocity motion model between state `i` and the state `dt` seconds later.
    pub fn constant_velocity_2d(
        source: &str,
        (position_i, velocity_i): (&Variable, &Variable),
        (position_j, velocity_j): (&Variable, &Variable),
        dt: f64,
        covariance: &DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        let sqrt_information = sqrt_information_from_covariance(covariance)?;
        Self::new(
            source,
            ConstraintKind::ConstantVelocity2D { dt },
            &[position_i, velocity_i, position_j, velocity_j],
            vec![0.0; 4],
            sqrt_information,
        )
    }

    pub fn with_loss(mut self, loss: Loss) -> Result<Self, ValidationError> {
        if !loss.is_valid() {
            return Err(ValidationError::InvalidLoss {
                type_name: self.type_name(),
            });
        }
        self.loss = Some(loss);
        Ok(self)
    }

    /// Overrides the derived uuid, e.g. to make two otherwise identical measurements distinct.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    // --- Accessors ---

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn variables(&self) -> &[Uuid] {
        &self.variables
    }

    pub fn variable_types(&self) -> &[VariableType] {
        &self.variable_types
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn sqrt_information(&self) -> &DMatrix<f64> {
        &self.sqrt_information
    }

    pub fn loss(&self) -> Option<&Loss> {
        self.loss.as_ref()
    }

    pub fn residual_size(&self) -> usize {
        self.sqrt_information.nrows()
    }

    /// The measurement covariance `(SᵀS)⁻¹`, or `None` if it is singular.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        (self.sqrt_information.transpose() * &self.sqrt_information).try_inverse()
    }

    /// Checks shapes, finiteness and conditioning. Called on construction and again by the
    /// graph for constraints that arrive through deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let type_name = self.type_name();
        if self.variables.len() != self.variable_types.len() {
            return Err(ValidationError::DimensionMismatch {
                type_name,
                what: "variable type list",
                expected: self.variables.len(),
                actual: self.variable_types.len(),
            });
        }
        let (mean_size, residual_size) = self.kind.shape(&self.variable_types)?;
        if self.mean.len() != mean_size {
            return Err(ValidationError::DimensionMismatch {
                type_name,
                what: "mean",
                expected: mean_size,
                actual: self.mean.len(),
            });
        }
        if self.sqrt_information.nrows() != residual_size {
            return Err(ValidationError::DimensionMismatch {
                type_name,
                what: "sqrt_information rows",
                expected: residual_size,
                actual: self.sqrt_information.nrows(),
            });
        }
        if self.sqrt_information.ncols() != residual_size {
            return Err(ValidationError::DimensionMismatch {
                type_name,
                what: "sqrt_information columns",
                expected: residual_size,
                actual: self.sqrt_information.ncols(),
            });
        }
        if self.mean.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite { type_name, what: "mean" });
        }
        if self.sqrt_information.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite {
                type_name,
                what: "sqrt_information",
            });
        }
        if let Some(range) = self.kind.quaternion_mean(&self.variable_types) {
            if is_degenerate_quaternion(&self.mean[range]) {
                return Err(ValidationError::ZeroNorm { type_name });
            }
        }
        let below_diagonal = (1..residual_size).flat_map(|row| (0..row).map(move |col| (row, col)));
        for (row, col) in below_diagonal {
            if self.sqrt_information[(row, col)] != 0.0 {
                return Err(ValidationError::NotUpperTriangular { type_name, row, col });
            }
        }
        if let Some(row) = (0..residual_size).find(|&r| self.sqrt_information.row(r).iter().all(|v| *v == 0.0)) {
            return Err(ValidationError::DegenerateInformation { type_name, row });
        }
        if let Some(loss) = &self.loss {
            if !loss.is_valid() {
                return Err(ValidationError::InvalidLoss { type_name });
            }
        }
        Ok(())
    }

    // --- Evaluation ---

    /// The unwhitened residual at the given variable values (ordered like `variables()`).
    pub fn raw_residual(&self, values: &[&[f64]]) -> DVector<f64> {
        let manifold = self.variable_types[0].manifold();
        match self.kind {
            ConstraintKind::Absolute => residual::absolute(manifold, values[0], &self.mean),
            ConstraintKind::Relative => residual::relative(manifold, values[0], values[1], &self.mean),
            ConstraintKind::AbsolutePose3D => residual::absolute_pose_3d(values[0], values[1], &self.mean),
            ConstraintKind::ConstantVelocity2D { dt } => {
                residual::constant_velocity_2d(values[0], values[1], values[2], values[3], dt, &self.mean)
            }
        }
    }

    /// The whitened residual `S · r`. The loss is not applied.
    pub fn evaluate(&self, values: &[&[f64]]) -> DVector<f64> {
        &self.sqrt_information * self.raw_residual(values)
    }

    /// The whitened residual together with its Jacobian with respect to the tangent space
    /// of each referenced variable.
    pub fn linearize(&self, values: &[&[f64]]) -> (DVector<f64>, Vec<DMatrix<f64>>) {
        let residual = self.evaluate(values);
        let mut jacobians = Vec::with_capacity(values.len());
        let mut perturbed: Vec<Vec<f64>> = values.iter().map(|v| v.to_vec()).collect();

        for (index, variable_type) in self.variable_types.iter().enumerate() {
            let manifold = variable_type.manifold();
            let local_size = variable_type.local_size();
            let mut jacobian = DMatrix::zeros(residual.len(), local_size);
            let mut delta = vec![0.0; local_size];

            for k in 0..local_size {
                delta[k] = NUMERIC_DIFF_STEP;
                perturbed[index] = manifold.plus(values[index], &delta);
                let forward = self.evaluate(&as_slices(&perturbed));

                delta[k] = -NUMERIC_DIFF_STEP;
                perturbed[index] = manifold.plus(values[index], &delta);
                let backward = self.evaluate(&as_slices(&perturbed));

                delta[k] = 0.0;
                jacobian.set_column(k, &((forward - backward) / (2.0 * NUMERIC_DIFF_STEP)));
            }
            perturbed[index] = values[index].to_vec();
            jacobians.push(jacobian);
        }
        (residual, jacobians)
    }

    /// The robust cost `½ ρ(‖S·r‖²)` at the given values.
    pub fn cost(&self, values: &[&[f64]]) -> f64 {
        let squared_norm = self.evaluate(values).norm_squared();
        let rho = self.loss.unwrap_or_default().evaluate(squared_norm)[0];
        0.5 * rho
    }
}

fn as_slices(values: &[Vec<f64>]) -> Vec<&[f64]> {
    values.iter().map(|v| v.as_slice()).collect()
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.type_name())?;
        writeln!(f, "  uuid: {}", self.uuid)?;
        writeln!(f, "  source: {}", self.source)?;
        writeln!(f, "  variables:")?;
        for (uuid, variable_type) in self.variables.iter().zip(&self.variable_types) {
            writeln!(f, "  - {} ({})", uuid, variable_type.type_name())?;
        }
        writeln!(f, "  mean: {:?}", self.mean)?;
        write!(f, "  sqrt_info: {}", self.sqrt_information)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::Stamp;
    use approx::assert_abs_diff_eq;

    fn device() -> Uuid {
        identity::from_name("r2d2")
    }

    fn position(t: f64) -> Variable {
        Variable::position_2d(Stamp::from_secs_f64(t), device())
    }

    #[test]
    fn test_covariance_round_trip() {
        let covariance = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let constraint = Constraint::absolute("gps", &position(1.0), vec![1.0, 2.0], &covariance).unwrap();
        let sqrt_information = constraint.sqrt_information();
        assert_abs_diff_eq!(sqrt_information[(1, 0)], 0.0, epsilon = 1e-12);
        let recovered = constraint.covariance().unwrap();
        for (a, b) in recovered.iter().zip(covariance.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_same_measurement_derives_same_uuid() {
        let covariance = DMatrix::identity(2, 2);
        let a = Constraint::absolute("gps", &position(1.0), vec![1.0, 2.0], &covariance).unwrap();
        let b = Constraint::absolute("gps", &position(1.0), vec![1.0, 2.0], &covariance).unwrap();
        let c = Constraint::absolute("gps", &position(1.0), vec![1.0, 2.5], &covariance).unwrap();
        assert_eq!(a.uuid(), b.uuid());
        assert_ne!(a.uuid(), c.uuid());
    }

    #[test]
    fn test_mean_size_mismatch_is_rejected() {
        let result = Constraint::new(
            "gps",
            ConstraintKind::Absolute,
            &[&position(1.0)],
            vec![1.0, 2.0, 3.0],
            DMatrix::identity(2, 2),
        );
        assert!(matches!(
            result,
            Err(ValidationError::DimensionMismatch { what: "mean", .. })
        ));
    }

    #[test]
    fn test_sqrt_information_row_count_mismatch_is_rejected() {
        let result = Constraint::new(
            "gps",
            ConstraintKind::Absolute,
            &[&position(1.0)],
            vec![1.0, 2.0],
            DMatrix::identity(3, 3),
        );
        assert!(matches!(
            result,
            Err(ValidationError::DimensionMismatch {
                what: "sqrt_information rows",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_information_row_is_rejected() {
        let mut sqrt_information = DMatrix::identity(2, 2);
        sqrt_information[(1, 1)] = 0.0;
        let result = Constraint::new(
            "gps",
            ConstraintKind::Absolute,
            &[&position(1.0)],
            vec![1.0, 2.0],
            sqrt_information,
        );
        assert_eq!(
            result.unwrap_err(),
            ValidationError::DegenerateInformation {
                type_name: "AbsoluteConstraint",
                row: 1
            }
        );
    }

    #[test]
    fn test_relative_requires_matching_types() {
        let orientation = Variable::orientation_2d(Stamp::from_secs_f64(2.0), device());
        let result = Constraint::relative("odom", &position(1.0), &orientation, vec![0.0, 0.0], &DMatrix::identity(2, 2));
        assert!(matches!(result, Err(ValidationError::WrongVariableKind { index: 1, .. })));
    }

    #[test]
    fn test_absolute_pose_3d_checks_variable_order() {
        let stamp = Stamp::from_secs_f64(1.0);
        let p = Variable::position_3d(stamp, device());
        let q = Variable::orientation_3d(stamp, device());
        let mean = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let covariance = DMatrix::identity(6, 6);
        assert!(Constraint::absolute_pose_3d("pose", &p, &q, mean.clone(), &covariance).is_ok());
        assert!(Constraint::absolute_pose_3d("pose", &q, &p, mean, &covariance).is_err());
    }

    #[test]
    fn test_zero_norm_orientation_mean_is_rejected() {
        let q = Variable::orientation_3d(Stamp::from_secs_f64(1.0), device());
        let result = Constraint::absolute("imu", &q, vec![0.0; 4], &DMatrix::identity(3, 3));
        assert_eq!(
            result.unwrap_err(),
            ValidationError::ZeroNorm {
                type_name: "AbsoluteConstraint"
            }
        );
        assert!(Constraint::absolute("imu", &q, vec![0.0, 0.0, 0.0, 3.0], &DMatrix::identity(3, 3)).is_ok());
    }

    #[test]
    fn test_zero_norm_pose_mean_is_rejected() {
        let stamp = Stamp::from_secs_f64(1.0);
        let p = Variable::position_3d(stamp, device());
        let q = Variable::orientation_3d(stamp, device());
        let covariance = DMatrix::identity(6, 6);
        let result = Constraint::absolute_pose_3d("pose", &p, &q, vec![0.0; 7], &covariance);
        assert_eq!(
            result.unwrap_err(),
            ValidationError::ZeroNorm {
                type_name: "AbsolutePose3DConstraint"
            }
        );
        // A zero translation is fine.
        assert!(Constraint::absolute_pose_3d("pose", &p, &q, vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0], &covariance).is_ok());
    }

    #[test]
    fn test_lower_triangular_sqrt_information_is_rejected() {
        let mut sqrt_information = DMatrix::identity(2, 2);
        sqrt_information[(1, 0)] = 0.5;
        let result = Constraint::new(
            "gps",
            ConstraintKind::Absolute,
            &[&position(1.0)],
            vec![1.0, 2.0],
            sqrt_information,
        );
        assert_eq!(
            result.unwrap_err(),
            ValidationError::NotUpperTriangular {
                type_name: "AbsoluteConstraint",
                row: 1,
                col: 0
            }
        );

        let mut sqrt_information = DMatrix::identity(2, 2);
        sqrt_information[(0, 1)] = 0.5;
        assert!(Constraint::new(
            "gps",
            ConstraintKind::Absolute,
            &[&position(1.0)],
            vec![1.0, 2.0],
            sqrt_information,
        )
        .is_ok());
    }

    #[test]
    fn test_correlated_covariance_yields_upper_triangular_factor() {
        let stamp = Stamp::from_secs_f64(1.0);
        let p = Variable::position_3d(stamp, device());
        let q = Variable::orientation_3d(stamp, device());
        let mut covariance = DMatrix::identity(6, 6) * 0.5;
        for i in 0..5 {
            covariance[(i, i + 1)] = 0.1;
            covariance[(i + 1, i)] = 0.1;
        }
        let mean = vec![1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0];
        let constraint = Constraint::absolute_pose_3d("pose", &p, &q, mean, &covariance).unwrap();
        let s = constraint.sqrt_information();
        for row in 1..6 {
            for col in 0..row {
                assert_eq!(s[(row, col)], 0.0);
            }
        }
    }

    #[test]
    fn test_numeric_jacobian_of_linear_constraint() {
        let covariance = DMatrix::from_diagonal(&DVector::from_vec(vec![0.25, 0.25]));
        let a = position(1.0);
        let b = position(2.0);
        let constraint = Constraint::relative("odom", &a, &b, vec![1.0, 0.0], &covariance).unwrap();
        let (residual, jacobians) = constraint.linearize(&[&[0.0, 0.0], &[1.5, 0.5]]);
        assert_abs_diff_eq!(residual[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(residual[1], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(jacobians[0][(0, 0)], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(jacobians[1][(1, 1)], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(jacobians[1][(0, 1)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_jacobian_has_tangent_width() {
        let stamp = Stamp::from_secs_f64(1.0);
        let p = Variable::position_3d(stamp, device());
        let q = Variable::orientation_3d(stamp, device());
        let mean = vec![1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0];
        let constraint = Constraint::absolute_pose_3d("pose", &p, &q, mean, &DMatrix::identity(6, 6)).unwrap();
        let (_, jacobians) = constraint.linearize(&[p.data(), q.data()]);
        assert_eq!(jacobians[0].shape(), (6, 3));
        assert_eq!(jacobians[1].shape(), (6, 3));
        assert_abs_diff_eq!(jacobians[1][(3, 0)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_loss_attenuates_cost_but_not_a_perfect_fit() {
        let a = position(1.0);
        let plain = Constraint::absolute("gps", &a, vec![0.0, 0.0], &DMatrix::identity(2, 2)).unwrap();
        let robust = plain.clone().with_loss(Loss::Cauchy { a: 1.0 }).unwrap();
        assert_abs_diff_eq!(plain.cost(&[&[0.0, 0.0]]), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(robust.cost(&[&[0.0, 0.0]]), 0.0, epsilon = 1e-12);
        assert!(robust.cost(&[&[10.0, 0.0]]) < plain.cost(&[&[10.0, 0.0]]));
        assert!(plain.clone().with_loss(Loss::Huber { a: -1.0 }).is_err());
    }

    #[test]
    fn test_serialization_round_trip_is_bit_exact() {
        let covariance = DMatrix::from_row_slice(2, 2, &[0.3, 0.1, 0.1, 0.7]);
        let expected = Constraint::absolute("gps", &position(1.0), vec![1.0 / 3.0, -2.0e-7], &covariance)
            .unwrap()
            .with_loss(Loss::Huber { a: 0.5 })
            .unwrap();
        let text = serde_json::to_string(&expected).unwrap();
        let actual: Constraint = serde_json::from_str(&text).unwrap();
        assert_eq!(expected.uuid(), actual.uuid());
        assert_eq!(expected.type_name(), actual.type_name());
        assert_eq!(expected.variables(), actual.variables());
        assert_eq!(expected.loss(), actual.loss());
        for (a, b) in expected.mean().iter().zip(actual.mean()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        for (a, b) in expected.sqrt_information().iter().zip(actual.sqrt_information().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
