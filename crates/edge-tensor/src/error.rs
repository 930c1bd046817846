use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("{op}: expected {expected} elements, got {got}")]
    LengthMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("failed to build compute thread pool: {0}")]
    ThreadPool(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
