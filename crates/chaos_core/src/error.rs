use thiserror::Error;

/// Failures reported by the integration engine and its dense output.
///
/// `InvalidSpan`, `EvalTimeOutsideSpan`, `EvalTimesNotAscending`,
/// `DimensionMismatch` and `InvalidSettings` are raised before any stepping.
/// `StepSizeUnderflow`, `NonFiniteState` and `StepLimitExceeded` end a run
/// that has already made progress; see [`crate::integrate::Termination`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("Invalid time span [{start}, {end}]: bounds must be finite and strictly increasing.")]
    InvalidSpan { start: f64, end: f64 },

    #[error("Evaluation time {time} lies outside the span [{start}, {end}].")]
    EvalTimeOutsideSpan { time: f64, start: f64, end: f64 },

    #[error("Evaluation times must be ascending ({previous} is followed by {next}).")]
    EvalTimesNotAscending { previous: f64, next: f64 },

    #[error("Initial state dimension mismatch. Expected {expected}, got {found}.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid integrator settings: {0}")]
    InvalidSettings(String),

    #[error("Step size underflow at t = {t} (h = {step}); the problem may be stiff or ill-posed.")]
    StepSizeUnderflow { t: f64, step: f64 },

    #[error("Non-finite state or derivative encountered after t = {t}.")]
    NonFiniteState { t: f64 },

    #[error("Step limit of {limit} attempts exceeded at t = {t}.")]
    StepLimitExceeded { limit: usize, t: f64 },

    #[error("Query time {time} lies outside the covered span [{start}, {end}].")]
    OutOfRange { time: f64, start: f64, end: f64 },
}

impl IntegrationError {
    /// Fatal errors abort a run that already produced a partial solution.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IntegrationError::StepSizeUnderflow { .. }
                | IntegrationError::NonFiniteState { .. }
                | IntegrationError::StepLimitExceeded { .. }
        )
    }
}
