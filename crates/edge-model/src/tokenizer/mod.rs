pub mod bpe;
pub mod vocab;

pub use bpe::BpeTokenizer;
pub use vocab::{TokenType, Vocab};
