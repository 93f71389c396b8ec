//! Error types for the integration kernel.

use thiserror::Error;

/// Why an adaptive solver gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvergenceFailure {
    /// Accepted plus rejected steps reached the configured limit.
    #[error("step limit of {steps} exceeded")]
    StepLimitExceeded { steps: usize },

    /// Step size shrank below what the current time can resolve.
    #[error("step size {h:e} underflowed")]
    StepSizeUnderflow { h: f64 },
}

/// Errors that can occur while setting up, integrating or exporting a run.
#[derive(Debug, Error)]
pub enum SimError {
    /// State vector length does not match 4N for the system being integrated.
    #[error("dimension mismatch: expected state of length {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The derivative function produced a non-finite component.
    #[error("non-finite derivative at t = {t} (component {index})")]
    NonFinite { t: f64, index: usize },

    /// Two bodies came closer than the configured collision epsilon.
    #[error("collision between bodies {i} and {j} at t = {t} (separation {distance:e})")]
    Collision { t: f64, i: usize, j: usize, distance: f64 },

    /// The solver could not meet its tolerances within its limits.
    #[error("integration failed at t = {t}: {reason}")]
    IntegrationFailed { t: f64, reason: ConvergenceFailure },

    /// Time grid is too short, unordered or non-finite.
    #[error("invalid time grid: {0}")]
    InvalidTimeGrid(String),

    /// Scenario or parameter values are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SimError {
    /// True for failures of the solver's step-size control.
    pub fn is_integration_failure(&self) -> bool {
        matches!(self, SimError::IntegrationFailed { .. })
    }

    /// True for failures caused by a singular (or near-singular) separation.
    pub fn is_singularity(&self) -> bool {
        matches!(self, SimError::NonFinite { .. } | SimError::Collision { .. })
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = std::result::Result<T, SimError>;
