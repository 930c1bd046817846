use crate::error::{ModelError, Result};
use crate::gguf::metadata::GgufMetadata;

/// The only value of `general.architecture` this crate can run.
pub const LLAMA_ARCH: &str = "llama";

/// Hyperparameters of a LLaMA model, parsed from GGUF metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LlamaConfig {
    pub n_vocab: usize,
    /// Embedding dimension / hidden size.
    pub n_embd: usize,
    pub n_heads: usize,
    /// Key/value heads; fewer than `n_heads` means grouped-query attention.
    pub n_kv_heads: usize,
    pub n_layers: usize,
    /// Feed-forward intermediate dimension.
    pub n_ff: usize,
    pub norm_eps: f32,
    /// Context length the model was trained with.
    pub context_length: usize,
    pub rope_theta: f32,
    /// `n_embd / n_heads`.
    pub head_dim: usize,
}

impl LlamaConfig {
    /// Parse and validate hyperparameters.
    ///
    /// Keys are namespaced by `general.architecture`, e.g.
    /// `llama.embedding_length`. `attention.head_count_kv` defaults to the
    /// query head count, `rope.freq_base` to 10000 and the RMS epsilon to
    /// 1e-5. The vocabulary size comes from `{arch}.vocab_size` when present,
    /// otherwise from the length of `tokenizer.ggml.tokens`.
    pub fn from_gguf(metadata: &GgufMetadata) -> Result<LlamaConfig> {
        let arch = metadata.get_string("general.architecture")?;
        if arch != LLAMA_ARCH {
            return Err(ModelError::UnsupportedArchitecture(arch.to_string()));
        }
        let key = |name: &str| format!("{}.{}", arch, name);
        let get = |name: &str| -> Result<usize> { Ok(metadata.get_uint(&key(name))? as usize) };

        let n_embd = get("embedding_length")?;
        let n_heads = get("attention.head_count")?;
        let n_kv_heads = match get("attention.head_count_kv") {
            Err(ModelError::MissingKey(_)) => n_heads,
            other => other?,
        };
        let n_layers = get("block_count")?;
        let n_ff = get("feed_forward_length")?;
        let context_length = get("context_length")?;
        let norm_eps = match metadata.get_f32(&key("attention.layer_norm_rms_epsilon")) {
            Err(ModelError::MissingKey(_)) => 1e-5,
            other => other?,
        };
        let rope_theta = match metadata.get_f32(&key("rope.freq_base")) {
            Err(ModelError::MissingKey(_)) => 10000.0,
            other => other?,
        };
        let n_vocab = match get("vocab_size") {
            Err(ModelError::MissingKey(_)) => metadata.get_string_array("tokenizer.ggml.tokens")?.len(),
            other => other?,
        };

        let config = LlamaConfig {
            n_vocab,
            n_embd,
            n_heads,
            n_kv_heads,
            n_layers,
            n_ff,
            norm_eps,
            context_length,
            rope_theta,
            head_dim: if n_heads == 0 { 0 } else { n_embd / n_heads },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ModelError::InvalidHyperparameters(msg)) };

        for (name, value) in [
            ("n_vocab", self.n_vocab),
            ("n_embd", self.n_embd),
            ("n_heads", self.n_heads),
            ("n_kv_heads", self.n_kv_heads),
            ("n_layers", self.n_layers),
            ("n_ff", self.n_ff),
            ("context_length", self.context_length),
        ] {
            if value == 0 {
                return invalid(format!("{} must be non-zero", name));
            }
        }
        if self.n_embd % self.n_heads != 0 {
            return invalid(format!(
                "n_embd {} is not divisible by n_heads {}",
                self.n_embd, self.n_heads
            ));
        }
        if self.n_heads % self.n_kv_heads != 0 {
            return invalid(format!(
                "n_heads {} is not a multiple of n_kv_heads {}",
                self.n_heads, self.n_kv_heads
            ));
        }
        if self.head_dim % 2 != 0 {
            return invalid(format!("head_dim {} must be even for RoPE", self.head_dim));
        }
        if self.norm_eps.is_nan() || self.norm_eps <= 0.0 || self.rope_theta.is_nan() || self.rope_theta <= 0.0 {
            return invalid("norm_eps and rope_theta must be positive".to_string());
        }
        Ok(())
    }

    /// Width of one key or value row in the cache.
    pub fn kv_dim(&self) -> usize {
        self.n_kv_heads * self.head_dim
    }

    pub fn q_dim(&self) -> usize {
        self.n_heads * self.head_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gguf::GgufMetadataValue;

    fn metadata(arch: &str) -> GgufMetadata {
        let mut md = GgufMetadata::default();
        let mut set = |k: &str, v: GgufMetadataValue| {
            md.entries.insert(k.to_string(), v);
        };
        set("general.architecture", GgufMetadataValue::String(arch.to_string()));
        set("llama.embedding_length", GgufMetadataValue::U32(64));
        set("llama.attention.head_count", GgufMetadataValue::U32(8));
        set("llama.block_count", GgufMetadataValue::U32(2));
        set("llama.feed_forward_length", GgufMetadataValue::U32(128));
        set("llama.context_length", GgufMetadataValue::U64(512));
        set(
            "tokenizer.ggml.tokens",
            GgufMetadataValue::Array(vec![GgufMetadataValue::String("a".into()); 10]),
        );
        md
    }

    #[test]
    fn test_defaults() {
        let config = LlamaConfig::from_gguf(&metadata("llama")).unwrap();
        assert_eq!(config.n_kv_heads, 8);
        assert_eq!(config.head_dim, 8);
        assert_eq!(config.n_vocab, 10);
        assert_eq!(config.context_length, 512);
        assert_eq!(config.rope_theta, 10000.0);
        assert_eq!(config.norm_eps, 1e-5);
    }

    #[test]
    fn test_gqa_and_rope_base() {
        let mut md = metadata("llama");
        md.entries.insert("llama.attention.head_count_kv".into(), GgufMetadataValue::U32(2));
        md.entries.insert("llama.rope.freq_base".into(), GgufMetadataValue::F32(500000.0));
        let config = LlamaConfig::from_gguf(&md).unwrap();
        assert_eq!(config.kv_dim(), 16);
        assert_eq!(config.q_dim(), 64);
        assert_eq!(config.rope_theta, 500000.0);
    }

    #[test]
    fn test_other_architecture_rejected() {
        let err = LlamaConfig::from_gguf(&metadata("gemma3")).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedArchitecture(a) if a == "gemma3"));
    }

    #[test]
    fn test_indivisible_heads_rejected() {
        let mut md = metadata("llama");
        md.entries.insert("llama.attention.head_count_kv".into(), GgufMetadataValue::U32(3));
        assert!(matches!(
            LlamaConfig::from_gguf(&md),
            Err(ModelError::InvalidHyperparameters(_))
        ));
    }

    #[test]
    fn test_missing_required_key() {
        let mut md = metadata("llama");
        md.entries.remove("llama.block_count");
        assert!(matches!(
            LlamaConfig::from_gguf(&md),
            Err(ModelError::MissingKey(k)) if k == "llama.block_count"
        ));
    }
}
