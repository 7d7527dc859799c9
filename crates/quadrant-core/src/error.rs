//! Errors raised while setting up a simulation.
//!
//! Runtime navigation and clock failures are reported as `bool` or absence
//! of effect, never through this type.

use quadrant_logic::config::ConfigError;
use quadrant_logic::graph::GraphError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("malformed level data: {0}")]
    Configuration(#[from] GraphError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
