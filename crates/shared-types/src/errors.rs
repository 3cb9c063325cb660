use thiserror::Error;

/// Errors from parsing or validating primitive value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Hex string must start with 0x")]
    MissingHexPrefix,

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Interpreter params do not match outcome type {outcome_type}")]
    InterpreterParamsMismatch { outcome_type: String },
}
