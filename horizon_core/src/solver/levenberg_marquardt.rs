// horizon_core/src/solver/levenberg_marquardt.rs

//! Dense Levenberg-Marquardt over the stacked tangent space of a `Problem`.

use nalgebra::{Cholesky, DMatrix, DVector};
use std::time::{Duration, Instant};

use super::{Problem, Solver, SolverOptions, SolverSummary, TerminationReason};
use crate::error::SolverError;

const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const MAX_LAMBDA: f64 = 1e16;
/// Floor applied to the damped diagonal so gauge directions stay solvable.
const MIN_DIAGONAL: f64 = 1e-6;
const GRADIENT_TOLERANCE: f64 = 1e-10;
/// Smallest ratio of extreme singular values for which the Hessian is treated as invertible.
const RANK_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt;

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self
    }
}

fn damped_step(hessian: &DMatrix<f64>, gradient: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = hessian.clone();
    for i in 0..damped.nrows() {
        damped[(i, i)] += lambda * hessian[(i, i)].max(MIN_DIAGONAL);
    }
    let cholesky = Cholesky::new(damped)?;
    Some(-cholesky.solve(gradient))
}

fn flat_norm(values: &[Vec<f64>]) -> f64 {
    values.iter().flatten().map(|v| v * v).sum::<f64>().sqrt()
}

impl Solver for LevenbergMarquardt {
    fn solve(&self, problem: &mut Problem<'_>, options: &SolverOptions) -> Result<SolverSummary, SolverError> {
        let start = Instant::now();
        let max_time = Duration::from_secs_f64(options.max_time.max(0.0));
        let mut values = problem.values();
        let initial_cost = problem.cost_at(&values);
        if !initial_cost.is_finite() {
            return Err(SolverError::NonFiniteCost);
        }
        if problem.is_empty() || problem.residual_count() == 0 {
            return Ok(SolverSummary {
                iterations: 0,
                initial_cost,
                final_cost: initial_cost,
                termination: TerminationReason::Converged,
                elapsed: start.elapsed(),
            });
        }

        let mut cost = initial_cost;
        let mut lambda = options.initial_lambda;
        let mut iterations = 0;
        let mut termination = TerminationReason::MaxIterations;

        'outer: while iterations < options.max_iterations {
            if start.elapsed() > max_time {
                termination = TerminationReason::MaxTime;
                break;
            }
            iterations += 1;
            let equations = problem.normal_equations(&values);
            if equations.gradient.amax() <= GRADIENT_TOLERANCE {
                termination = TerminationReason::Converged;
                break;
            }

            loop {
                if lambda > MAX_LAMBDA {
                    termination = TerminationReason::NoFurtherProgress;
                    break 'outer;
                }
                let Some(step) = damped_step(&equations.hessian, &equations.gradient, lambda) else {
                    lambda *= LAMBDA_UP;
                    continue;
                };
                let candidate = problem.retract(&values, &step);
                let candidate_cost = problem.cost_at(&candidate);
                if !candidate_cost.is_finite() || candidate_cost >= cost {
                    lambda *= LAMBDA_UP;
                    continue;
                }

                let decrease = cost - candidate_cost;
                let step_small =
                    step.norm() <= options.parameter_tolerance * (flat_norm(&values) + options.parameter_tolerance);
                values = candidate;
                cost = candidate_cost;
                lambda = (lambda * LAMBDA_DOWN).max(f64::MIN_POSITIVE);
                tracing::trace!(iteration = iterations, cost, lambda, "accepted step");

                if decrease <= options.function_tolerance * cost || step_small {
                    termination = TerminationReason::Converged;
                    break 'outer;
                }
                break;
            }
        }

        problem.set_values(values);
        Ok(SolverSummary {
            iterations,
            initial_cost,
            final_cost: cost,
            termination,
            elapsed: start.elapsed(),
        })
    }

    fn covariance(&self, problem: &Problem<'_>, pairs: &[(usize, usize)]) -> Result<Vec<DMatrix<f64>>, SolverError> {
        let blocks = problem.blocks();
        if pairs.iter().any(|&(a, b)| a >= blocks.len() || b >= blocks.len()) {
            return Err(SolverError::InvalidPair);
        }
        let equations = problem.normal_equations(&problem.values());
        let hessian = (&equations.hessian + equations.hessian.transpose()) * 0.5;
        let singular_values = hessian.singular_values();
        let largest = singular_values.max();
        if largest <= 0.0 || singular_values.min() / largest < RANK_TOLERANCE {
            return Err(SolverError::SingularHessian);
        }
        let inverse = Cholesky::new(hessian)
            .ok_or(SolverError::SingularHessian)?
            .inverse();
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::SingularHessian);
        }
        Ok(pairs
            .iter()
            .map(|&(a, b)| {
                let (pa, pb) = (&blocks[a], &blocks[b]);
                inverse
                    .view((pa.offset, pb.offset), (pa.local_size, pb.local_size))
                    .into_owned()
            })
            .collect())
    }
}
