// horizon_sim/src/simulation/error.rs

use horizon_core::error::{GraphError, SubmitError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("scenario file not found: {}", .0.display())]
    ScenarioNotFound(PathBuf),

    #[error("failed to load scenario: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("failed to build a measurement: {0}")]
    Measurement(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("producer thread '{0}' panicked")]
    ProducerPanicked(String),

    #[error("smoother thread panicked")]
    SmootherPanicked,
}

impl From<figment::Error> for SimError {
    fn from(error: figment::Error) -> Self {
        SimError::Config(Box::new(error))
    }
}
