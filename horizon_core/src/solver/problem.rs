// horizon_core/src/solver/problem.rs

use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use uuid::Uuid;

use crate::constraints::Constraint;
use crate::variables::{Manifold, Variable};

/// One variable as the solver sees it: its values and where its tangent block lives in
/// the stacked tangent vector.
#[derive(Debug, Clone)]
pub struct ParameterBlock {
    pub uuid: Uuid,
    pub manifold: Manifold,
    pub values: Vec<f64>,
    pub local_size: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
struct ResidualBlock<'a> {
    constraint: &'a Constraint,
    blocks: Vec<usize>,
}

/// The normal equations of a problem at some set of values.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    /// `Σ Jᵀ W J`
    pub hessian: DMatrix<f64>,
    /// `Σ Jᵀ W r`
    pub gradient: DVector<f64>,
    pub cost: f64,
}

/// A nonlinear least-squares problem built from a committed graph state.
///
/// Constraints are borrowed; the values are owned so the solver can iterate on them
/// without touching the graph.
#[derive(Debug, Clone)]
pub struct Problem<'a> {
    blocks: Vec<ParameterBlock>,
    index: HashMap<Uuid, usize>,
    residuals: Vec<ResidualBlock<'a>>,
    tangent_size: usize,
}

impl<'a> Problem<'a> {
    /// Every constraint must reference variables present in `variables`; the graph
    /// guarantees this for its committed state.
    pub fn new<V, C>(variables: V, constraints: C) -> Option<Self>
    where
        V: IntoIterator<Item = &'a Variable>,
        C: IntoIterator<Item = &'a Constraint>,
    {
        let mut blocks = Vec::new();
        let mut index = HashMap::new();
        let mut offset = 0;
        for variable in variables {
            index.insert(variable.uuid(), blocks.len());
            blocks.push(ParameterBlock {
                uuid: variable.uuid(),
                manifold: variable.manifold(),
                values: variable.data().to_vec(),
                local_size: variable.local_size(),
                offset,
            });
            offset += variable.local_size();
        }

        let mut residuals = Vec::new();
        for constraint in constraints {
            let block_indices = constraint
                .variables()
                .iter()
                .map(|uuid| index.get(uuid).copied())
                .collect::<Option<Vec<_>>>()?;
            residuals.push(ResidualBlock {
                constraint,
                blocks: block_indices,
            });
        }

        Some(Self {
            blocks,
            index,
            residuals,
            tangent_size: offset,
        })
    }

    pub fn blocks(&self) -> &[ParameterBlock] {
        &self.blocks
    }

    pub fn block_index(&self, uuid: &Uuid) -> Option<usize> {
        self.index.get(uuid).copied()
    }

    pub fn tangent_size(&self) -> usize {
        self.tangent_size
    }

    pub fn residual_count(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn values_of<'v>(&self, residual: &ResidualBlock<'_>, values: &'v [Vec<f64>]) -> Vec<&'v [f64]> {
        residual.blocks.iter().map(|&b| values[b].as_slice()).collect()
    }

    /// The current values of every block, in block order.
    pub fn values(&self) -> Vec<Vec<f64>> {
        self.blocks.iter().map(|b| b.values.clone()).collect()
    }

    pub fn set_values(&mut self, values: Vec<Vec<f64>>) {
        for (block, value) in self.blocks.iter_mut().zip(values) {
            block.values = value;
        }
    }

    /// Total robust cost at the given block values.
    pub fn cost_at(&self, values: &[Vec<f64>]) -> f64 {
        self.residuals
            .iter()
            .map(|r| r.constraint.cost(&self.values_of(r, values)))
            .sum()
    }

    pub fn cost(&self) -> f64 {
        self.cost_at(&self.values())
    }

    /// Applies a stacked tangent step to the given values.
    pub fn retract(&self, values: &[Vec<f64>], step: &DVector<f64>) -> Vec<Vec<f64>> {
        self.blocks
            .iter()
            .zip(values)
            .map(|(block, value)| {
                let delta = &step.as_slice()[block.offset..block.offset + block.local_size];
                block.manifold.plus(value, delta)
            })
            .collect()
    }

    /// Builds the (robustly reweighted) Gauss-Newton normal equations at the given values.
    pub fn normal_equations(&self, values: &[Vec<f64>]) -> NormalEquations {
        let n = self.tangent_size;
        let mut hessian = DMatrix::zeros(n, n);
        let mut gradient = DVector::zeros(n);
        let mut cost = 0.0;

        for residual in &self.residuals {
            let (r, jacobians) = residual.constraint.linearize(&self.values_of(residual, values));
            let squared_norm = r.norm_squared();
            let loss = residual.constraint.loss().copied().unwrap_or_default();
            let rho = loss.evaluate(squared_norm);
            cost += 0.5 * rho[0];
            let weight = rho[1];

            for (a, &block_a) in residual.blocks.iter().enumerate() {
                let pa = &self.blocks[block_a];
                let ja = &jacobians[a];
                let g = ja.transpose() * &r * weight;
                let mut rows = gradient.rows_mut(pa.offset, pa.local_size);
                rows += g;
                for (b, &block_b) in residual.blocks.iter().enumerate() {
                    let pb = &self.blocks[block_b];
                    let h = ja.transpose() * &jacobians[b] * weight;
                    let mut view = hessian.view_mut((pa.offset, pb.offset), (pa.local_size, pb.local_size));
                    view += h;
                }
            }
        }

        NormalEquations { hessian, gradient, cost }
    }
}
