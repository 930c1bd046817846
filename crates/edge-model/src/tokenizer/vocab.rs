use std::collections::HashMap;

use crate::error::{ModelError, Result};
use crate::gguf::metadata::GgufMetadata;

/// Per-token attribute from `tokenizer.ggml.token_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Undefined,
    Normal,
    Unknown,
    /// Markers such as BOS/EOS, hidden unless rendering specials.
    Control,
    /// Added tokens matched verbatim in input text.
    UserDefined,
    Unused,
    /// `<0xHH>` byte fallback token.
    Byte,
}

impl TokenType {
    pub fn from_gguf(value: i32) -> TokenType {
        match value {
            1 => TokenType::Normal,
            2 => TokenType::Unknown,
            3 => TokenType::Control,
            4 => TokenType::UserDefined,
            5 => TokenType::Unused,
            6 => TokenType::Byte,
            _ => TokenType::Undefined,
        }
    }

    /// Tokens that special-token parsing matches in raw text.
    pub fn is_special(self) -> bool {
        matches!(self, TokenType::Control | TokenType::UserDefined)
    }
}

/// Parse a `<0xHH>` byte token.
pub(crate) fn parse_byte_token(text: &str) -> Option<u8> {
    let hex = text.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Token vocabulary loaded from GGUF metadata.
#[derive(Debug, Clone)]
pub struct Vocab {
    pub tokens: Vec<String>,
    /// Merge scores for SentencePiece vocabularies, zero when absent.
    pub scores: Vec<f32>,
    pub token_types: Vec<TokenType>,
    pub token_to_id: HashMap<String, u32>,
    /// Tokenizer family, `tokenizer.ggml.model` ("llama" or "gpt2").
    pub model: String,
    pub bos_id: u32,
    pub eos_id: u32,
    pub unk_id: Option<u32>,
    /// End-of-turn marker of chat models.
    pub eot_id: Option<u32>,
    /// End-of-message marker.
    pub eom_id: Option<u32>,
    pub add_bos: bool,
    pub add_eos: bool,
    pub add_space_prefix: bool,
}

fn optional<T>(value: Result<T>) -> Result<Option<T>> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(ModelError::MissingKey(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl Vocab {
    /// Build a vocabulary from `tokenizer.ggml.*` metadata.
    ///
    /// Only `tokenizer.ggml.tokens` is required. Special token ids fall back
    /// to the SentencePiece convention (unk 0, bos 1, eos 2), and end-of-turn
    /// markers are looked up by their usual text when no id is given.
    pub fn from_gguf(metadata: &GgufMetadata) -> Result<Vocab> {
        let tokens = metadata.get_string_array("tokenizer.ggml.tokens")?;
        let n_vocab = tokens.len();
        if n_vocab == 0 {
            return Err(ModelError::Tokenizer("vocabulary is empty".to_string()));
        }

        let model = optional(metadata.get_string("tokenizer.ggml.model"))?
            .unwrap_or("llama")
            .to_string();

        let scores = optional(metadata.get_f32_array("tokenizer.ggml.scores"))?
            .unwrap_or_else(|| vec![0.0; n_vocab]);
        if scores.len() != n_vocab {
            return Err(ModelError::Tokenizer(format!(
                "{} scores for {} tokens",
                scores.len(),
                n_vocab
            )));
        }

        let token_types = match optional(metadata.get_i32_array("tokenizer.ggml.token_type"))? {
            Some(types) if types.len() != n_vocab => {
                return Err(ModelError::Tokenizer(format!(
                    "{} token types for {} tokens",
                    types.len(),
                    n_vocab
                )))
            }
            Some(types) => types.into_iter().map(TokenType::from_gguf).collect(),
            None => tokens
                .iter()
                .map(|t| match parse_byte_token(t) {
                    Some(_) => TokenType::Byte,
                    None => TokenType::Normal,
                })
                .collect(),
        };

        let mut token_to_id = HashMap::with_capacity(n_vocab);
        for (id, tok) in tokens.iter().enumerate() {
            // First occurrence wins for duplicated strings.
            token_to_id.entry(tok.clone()).or_insert(id as u32);
        }

        let id_key = |name: &str| -> Result<Option<u32>> {
            let key = format!("tokenizer.ggml.{}_token_id", name);
            match optional(metadata.get_uint(&key))? {
                Some(id) if id as usize >= n_vocab => Err(ModelError::Tokenizer(format!(
                    "{} = {} is outside the vocabulary of {} tokens",
                    key, id, n_vocab
                ))),
                other => Ok(other.map(|id| id as u32)),
            }
        };
        let by_text = |candidates: &[&str]| candidates.iter().find_map(|t| token_to_id.get(*t).copied());

        let bos_id = id_key("bos")?.unwrap_or(1);
        let eos_id = id_key("eos")?.unwrap_or(2);
        let unk_id = id_key("unknown")?.or_else(|| by_text(&["<unk>"]));
        let eot_id = id_key("eot")?.or_else(|| by_text(&["<end_of_turn>", "<|eot_id|>", "<|im_end|>"]));
        let eom_id = id_key("eom")?.or_else(|| by_text(&["<|eom_id|>"]));
        if bos_id as usize >= n_vocab || eos_id as usize >= n_vocab {
            return Err(ModelError::Tokenizer(format!(
                "default bos/eos ids {}/{} do not fit a vocabulary of {} tokens",
                bos_id, eos_id, n_vocab
            )));
        }

        let add_bos = optional(metadata.get_bool("tokenizer.ggml.add_bos_token"))?.unwrap_or(true);
        let add_eos = optional(metadata.get_bool("tokenizer.ggml.add_eos_token"))?.unwrap_or(false);
        let add_space_prefix = optional(metadata.get_bool("tokenizer.ggml.add_space_prefix"))?
            .unwrap_or(model == "llama");

        Ok(Vocab {
            tokens,
            scores,
            token_types,
            token_to_id,
            model,
            bos_id,
            eos_id,
            unk_id,
            eot_id,
            eom_id,
            add_bos,
            add_eos,
            add_space_prefix,
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_type(&self, id: u32) -> TokenType {
        self.token_types
            .get(id as usize)
            .copied()
            .unwrap_or(TokenType::Undefined)
    }

    /// True for tokens that end generation: EOS, EOT and EOM.
    pub fn is_eog(&self, id: u32) -> bool {
        id == self.eos_id || Some(id) == self.eot_id || Some(id) == self.eom_id
    }
}
