use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupereegError {
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Cannot add an unstable model: {0}")]
    Instability(String),

    #[error("Subtraction would leave a negative observation count at cell ({row}, {col})")]
    NegativeWeight { row: usize, col: usize },

    #[error("Subtraction would leave a negative subject count ({left} - {right})")]
    NegativeSubjectCount { left: usize, right: usize },

    #[error("Cannot align locations: {0}")]
    Alignment(String),

    #[error("Index {index} out of bounds for axis of length {len}")]
    Index { index: usize, len: usize },

    #[error("Nothing to aggregate: {0}")]
    EmptyInput(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SupereegError {
    /// True for the error raised when an unstable model is used in an addition.
    pub fn is_instability(&self) -> bool {
        matches!(self, SupereegError::Instability(_))
    }
}

pub type Result<T> = std::result::Result<T, SupereegError>;
