use std::path::{Path, PathBuf};
use std::sync::Arc;

use edge_model::{BpeTokenizer, GgufFile, LlamaModel, ModelArchitecture, ModelError};

use crate::generate::Vocabulary;

/// Loaded weights and tokenizer of one model file.
#[derive(Debug)]
pub struct Model {
    path: PathBuf,
    gpu_layers: u32,
    arch: Arc<LlamaModel>,
    tokenizer: BpeTokenizer,
}

impl Model {
    /// Read a GGUF file and build the model and tokenizer from it.
    pub fn load(path: &Path, gpu_layers: u32) -> Result<Model, ModelError> {
        let gguf = GgufFile::open(path)?;
        let tokenizer = BpeTokenizer::from_gguf(&gguf.metadata)?;
        let arch = LlamaModel::from_gguf(&gguf)?;
        if tokenizer.n_vocab() != arch.config.n_vocab {
            return Err(ModelError::InvalidHyperparameters(format!(
                "tokenizer has {} tokens but the model has {} embeddings",
                tokenizer.n_vocab(),
                arch.config.n_vocab
            )));
        }
        Ok(Model {
            path: path.to_path_buf(),
            gpu_layers,
            arch: Arc::new(arch),
            tokenizer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gpu_layers(&self) -> u32 {
        self.gpu_layers
    }

    pub fn tokenizer(&self) -> &BpeTokenizer {
        &self.tokenizer
    }

    pub fn n_vocab(&self) -> usize {
        self.arch.config.n_vocab
    }

    pub fn context_length(&self) -> usize {
        self.arch.config.context_length
    }

    /// Shared handle to the weights for building a `Context`.
    pub fn architecture(&self) -> Arc<dyn ModelArchitecture> {
        self.arch.clone()
    }
}

impl Vocabulary for Model {
    fn tokenize(
        &self,
        text: &str,
        capacity: usize,
        add_special: bool,
        parse_special: bool,
    ) -> edge_model::Result<Vec<u32>> {
        self.tokenizer.tokenize(text, capacity, add_special, parse_special)
    }

    fn token_to_piece(&self, token: u32, max_len: usize, render_special: bool) -> edge_model::Result<Vec<u8>> {
        self.tokenizer.token_to_piece(token, max_len, render_special)
    }

    fn is_eog(&self, token: u32) -> bool {
        self.tokenizer.is_eog(token)
    }
}
