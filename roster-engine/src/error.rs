use thiserror::Error;

use crate::validate::ValidationReport;

/// Failures surfaced by the solve pipeline.
///
/// Everything here is a data or capacity problem to be reported to the
/// caller; the engine never panics on malformed input.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed with {} error(s)", report.errors.len())]
    Validation { report: ValidationReport },

    #[error("invalid input: {0}")]
    Input(String),

    #[error("problem too large: {0}")]
    Capacity(String),

    #[error("solver error: {0}")]
    Solver(String),
}

impl EngineError {
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation { report } => Some(report),
            _ => None,
        }
    }
}
