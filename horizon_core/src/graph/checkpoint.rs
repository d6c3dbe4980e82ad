// horizon_core/src/graph/checkpoint.rs

use serde::{Deserialize, Serialize};

use super::Graph;
use crate::constraints::Constraint;
use crate::error::GraphError;
use crate::solver::Solver;
use crate::stamp::Stamp;
use crate::transaction::Transaction;
use crate::variables::Variable;

/// A serializable copy of a graph's variables and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCheckpoint {
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl GraphCheckpoint {
    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string(self).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::Serialization(e.to_string()))
    }
}

impl Graph {
    pub fn checkpoint(&self) -> GraphCheckpoint {
        GraphCheckpoint {
            variables: self.variables.values().cloned().collect(),
            constraints: self.constraints.values().cloned().collect(),
        }
    }

    /// Rebuilds a graph from a checkpoint. Every element is validated and every reference
    /// checked, exactly as if the checkpoint were applied as one transaction.
    pub fn restore(checkpoint: GraphCheckpoint, solver: Box<dyn Solver>) -> Result<Self, GraphError> {
        let mut transaction = Transaction::new(Stamp::ZERO);
        for variable in checkpoint.variables {
            transaction.add_variable(variable);
        }
        for constraint in checkpoint.constraints {
            transaction.add_constraint(constraint);
        }
        let mut graph = Graph::new(solver);
        graph.apply(&transaction)?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        self.checkpoint().to_json()
    }

    pub fn from_json(json: &str, solver: Box<dyn Solver>) -> Result<Self, GraphError> {
        Self::restore(GraphCheckpoint::from_json(json)?, solver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsistencyError;
    use crate::identity;
    use crate::loss::Loss;
    use crate::solver::LevenbergMarquardt;
    use nalgebra::DMatrix;

    fn solver() -> Box<dyn Solver> {
        Box::new(LevenbergMarquardt::new())
    }

    #[test]
    fn test_json_round_trip_is_bit_exact() {
        let device = identity::from_name("checkpoint");
        let a = Variable::position_2d(Stamp::from_secs_f64(1.0), device)
            .with_data(vec![0.1 + 0.2, std::f64::consts::PI])
            .unwrap();
        let q = Variable::orientation_3d(Stamp::from_secs_f64(1.0), device)
            .with_data(vec![0.9, 0.1, -0.3, 0.2])
            .unwrap();
        let landmark = Variable::point_3d_landmark(11).with_data(vec![1e-300, -7.25, 1.0 / 7.0]).unwrap();
        let mut graph = Graph::new(solver());
        graph.add_variable(a.clone()).unwrap();
        graph.add_variable(q.clone()).unwrap();
        graph.add_variable(landmark).unwrap();
        let prior = Constraint::absolute("prior", &a, vec![1.0 / 3.0, 2.0], &DMatrix::identity(2, 2))
            .unwrap()
            .with_loss(Loss::Huber { a: 0.7 })
            .unwrap();
        graph.add_constraint(prior).unwrap();

        let json = graph.to_json().unwrap();
        let restored = Graph::from_json(&json, solver()).unwrap();
        assert_eq!(restored.checkpoint(), graph.checkpoint());
        for (x, y) in graph.variables().zip(restored.variables()) {
            assert_eq!(x.kind(), y.kind());
            let bits_x: Vec<u64> = x.data().iter().map(|v| v.to_bits()).collect();
            let bits_y: Vec<u64> = y.data().iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_x, bits_y);
        }
        assert_eq!(restored.to_json().unwrap(), json);
    }

    #[test]
    fn test_restore_rejects_dangling_references() {
        let device = identity::from_name("checkpoint");
        let a = Variable::position_2d(Stamp::from_secs_f64(1.0), device);
        let prior = Constraint::absolute("prior", &a, vec![0.0, 0.0], &DMatrix::identity(2, 2)).unwrap();
        let checkpoint = GraphCheckpoint {
            variables: vec![],
            constraints: vec![prior],
        };
        let result = Graph::restore(checkpoint, solver());
        assert!(matches!(
            result,
            Err(GraphError::Consistency(ConsistencyError::UnknownVariable { .. }))
        ));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        assert!(matches!(
            Graph::from_json("{not json", solver()),
            Err(GraphError::Serialization(_))
        ));
    }
}
