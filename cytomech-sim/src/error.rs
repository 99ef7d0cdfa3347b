use thiserror::Error;

use cytomech_mech::MechError;

/// Errors surfaced by the simulation layer.
#[derive(Debug, Error)]
pub enum SimError {
    /// A class parameter is missing, out of range, or inconsistent with
    /// another one. Raised while preparing a step; recoverable by fixing
    /// the property and retrying.
    #[error("invalid parameter `{property}`: {what}")]
    Configuration { property: String, what: String },

    /// Failure in the mechanical core; convergence failures are
    /// recoverable by reducing the time step, non-finite states are not.
    #[error(transparent)]
    Mech(#[from] MechError),

    /// A trajectory file is truncated, carries an unknown record tag, or
    /// references an undefined property. Recoverable by skipping the frame.
    #[error("trajectory input: {0}")]
    Input(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn conf(property: &str, what: impl Into<String>) -> SimError {
        SimError::Configuration { property: property.to_string(), what: what.into() }
    }
}
