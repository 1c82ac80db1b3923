//! Error types of the simulation core.

use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// Degenerate aggregation (a single replication or zero variance) is not an
/// error; it is flagged on [`crate::runner::AggregatedResults`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Malformed or internally inconsistent scenario configuration.
    /// Raised before any simulated event is processed.
    #[error("invalid scenario configuration: {reason}")]
    Configuration { reason: String },

    /// Unexpected failure inside one Monte Carlo replication.
    /// Aborts the whole batch; replications are never retried.
    #[error("replication {run} failed: {reason}")]
    Replication { run: usize, reason: String },
}

impl SimulationError {
    pub fn config<S: Into<String>>(reason: S) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
