pub mod architecture;
pub mod batch;
pub mod error;
pub mod gguf;
pub mod llama;
pub mod tokenizer;

pub use architecture::ModelArchitecture;
pub use batch::{Batch, BatchEntry};
pub use error::{ModelError, Result};
pub use gguf::GgufFile;
pub use llama::{KvCache, LlamaConfig, LlamaModel};
pub use tokenizer::{BpeTokenizer, TokenType, Vocab};
