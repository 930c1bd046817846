use super::config::LlamaConfig;
use crate::error::{ModelError, Result};
use crate::gguf::reader::GgufFile;

/// Weight tensors for a single LLaMA transformer layer.
///
/// Matrices are flat f32 in row-major `[out_dim, in_dim]` order, which is how
/// GGUF lays out a tensor with `ne = [in_dim, out_dim]`.
#[derive(Debug, Clone)]
pub struct LlamaLayer {
    pub attn_norm: Vec<f32>,
    /// `[q_dim, n_embd]`
    pub wq: Vec<f32>,
    /// `[kv_dim, n_embd]`
    pub wk: Vec<f32>,
    /// `[kv_dim, n_embd]`
    pub wv: Vec<f32>,
    /// `[n_embd, q_dim]`
    pub wo: Vec<f32>,
    pub ffn_norm: Vec<f32>,
    /// `[n_ff, n_embd]`
    pub ffn_gate: Vec<f32>,
    /// `[n_ff, n_embd]`
    pub ffn_up: Vec<f32>,
    /// `[n_embd, n_ff]`
    pub ffn_down: Vec<f32>,
}

/// All weight tensors for a LLaMA model.
#[derive(Debug, Clone)]
pub struct LlamaWeights {
    /// `[n_vocab, n_embd]`
    pub token_embd: Vec<f32>,
    pub output_norm: Vec<f32>,
    /// `[n_vocab, n_embd]`
    pub output: Vec<f32>,
    pub layers: Vec<LlamaLayer>,
}

/// Load a tensor and check it holds exactly `expected` elements.
fn load(gguf: &GgufFile, name: &str, expected: usize) -> Result<Vec<f32>> {
    let data = gguf.get_tensor_f32(name)?.into_data();
    if data.len() != expected {
        return Err(ModelError::TensorShape {
            name: name.to_string(),
            expected,
            got: data.len(),
        });
    }
    Ok(data)
}

impl LlamaWeights {
    /// Load and dequantize every weight tensor.
    ///
    /// Tensor names follow the llama.cpp convention (`token_embd.weight`,
    /// `blk.{i}.attn_q.weight`, ...). A missing `output.weight` means the
    /// model ties its output projection to the token embeddings.
    pub fn from_gguf(gguf: &GgufFile, config: &LlamaConfig) -> Result<LlamaWeights> {
        let n_embd = config.n_embd;
        let q_dim = config.q_dim();
        let kv_dim = config.kv_dim();
        let n_ff = config.n_ff;

        let token_embd = load(gguf, "token_embd.weight", config.n_vocab * n_embd)?;
        let output_norm = load(gguf, "output_norm.weight", n_embd)?;
        let output = match load(gguf, "output.weight", config.n_vocab * n_embd) {
            Err(ModelError::TensorNotFound(_)) => {
                log::debug!("output.weight absent, using tied token embeddings");
                token_embd.clone()
            }
            other => other?,
        };

        let mut layers = Vec::with_capacity(config.n_layers);
        for i in 0..config.n_layers {
            let blk = |name: &str, numel: usize| load(gguf, &format!("blk.{}.{}.weight", i, name), numel);
            layers.push(LlamaLayer {
                attn_norm: blk("attn_norm", n_embd)?,
                wq: blk("attn_q", q_dim * n_embd)?,
                wk: blk("attn_k", kv_dim * n_embd)?,
                wv: blk("attn_v", kv_dim * n_embd)?,
                wo: blk("attn_output", n_embd * q_dim)?,
                ffn_norm: blk("ffn_norm", n_embd)?,
                ffn_gate: blk("ffn_gate", n_ff * n_embd)?,
                ffn_up: blk("ffn_up", n_ff * n_embd)?,
                ffn_down: blk("ffn_down", n_embd * n_ff)?,
            });
        }

        Ok(LlamaWeights {
            token_embd,
            output_norm,
            output,
            layers,
        })
    }
}
