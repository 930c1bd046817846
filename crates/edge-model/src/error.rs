use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid GGUF magic: expected 'GGUF', got {0:?}")]
    InvalidMagic([u8; 4]),
    #[error("unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),
    #[error("missing metadata key: {0}")]
    MissingKey(String),
    #[error("type mismatch for key '{key}': expected {expected}, got {got}")]
    TypeMismatch {
        key: String,
        expected: String,
        got: String,
    },
    #[error("invalid UTF-8 in GGUF string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("unsupported GGUF type ID: {0}")]
    UnsupportedGgufType(u32),
    #[error("metadata arrays nested deeper than {0} levels")]
    ArrayTooDeep(usize),
    #[error("tensor not found: {0}")]
    TensorNotFound(String),
    #[error("tensor '{0}' extends past the end of the file")]
    TensorOutOfBounds(String),
    #[error("tensor '{name}' has {got} elements, expected {expected}")]
    TensorShape {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("tokenization needs {needed} tokens but capacity is {capacity}")]
    TokenCapacity { needed: usize, capacity: usize },
    #[error("token piece needs {needed} bytes but the limit is {max}")]
    PieceTooLong { needed: usize, max: usize },
    #[error("batch is full ({capacity} entries)")]
    BatchFull { capacity: usize },
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("position {pos} is outside the context window of {n_ctx} tokens")]
    ContextFull { pos: usize, n_ctx: usize },
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },
    #[error("tensor error: {0}")]
    Tensor(#[from] edge_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
