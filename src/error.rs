//! Errors raised by the engine.
//!
//! Precondition violations surface as [`Error`]. Numerical terminations of the
//! iterative methods (an exhausted iteration budget, an iterate that leaves a
//! domain) are never errors: they are reported through
//! [`ConvergenceFlag`](crate::roots::ConvergenceFlag) on the returned value.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Incompatible dimensions, or a non-square operand where one is required.
    #[error("{0}")]
    Shape(String),

    #[error("{0}")]
    Arithmetic(String),

    /// Division by an exact zero, such as inverting a singular matrix.
    #[error("{0}")]
    ZeroDivision(String),

    /// Malformed function text or entity name.
    #[error("{0}")]
    Parse(String),

    /// A point lies outside the domain of a function, or membership could not be decided.
    #[error("{0}")]
    Domain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}
