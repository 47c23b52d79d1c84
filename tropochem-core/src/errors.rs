use crate::timeseries::Time;
use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChemError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Integration failed at t={t:e} s: {reason}")]
    IntegrationFailure { t: Time, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChemError {
    pub(crate) fn integration(t: Time, reason: impl Into<String>) -> Self {
        ChemError::IntegrationFailure {
            t,
            reason: reason.into(),
        }
    }
}

/// Convenience type for `Result<T, ChemError>`.
pub type ChemResult<T> = Result<T, ChemError>;
