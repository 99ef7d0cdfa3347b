use thiserror::Error;

/// Errors raised by the mechanical core.
#[derive(Debug, Error)]
pub enum MechError {
    /// The iterative solver did not reach the requested residual. The caller
    /// may reduce the time step and retry the step.
    #[error("implicit solver did not converge within {iterations} iterations (residual {residual:.3e})")]
    SolverNonConvergence { iterations: usize, residual: f64 },

    /// A non-finite number appeared in the mechanical state. Not recoverable.
    #[error("non-finite value detected in {0}")]
    InvalidState(String),

    /// The constraint projection of a fiber could not be factorized,
    /// which happens when the chain geometry degenerates.
    #[error("could not factorize the constrained-dynamics projection")]
    ProjectionFailure,

    /// A geometric argument is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
