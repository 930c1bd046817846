pub mod config;
pub mod kv_cache;
pub mod layers;

pub use config::{LlamaConfig, LLAMA_ARCH};
pub use kv_cache::KvCache;
pub use layers::{LlamaLayer, LlamaWeights};

use edge_tensor::ComputeBackend;

use crate::architecture::ModelArchitecture;
use crate::batch::Batch;
use crate::error::{ModelError, Result};
use crate::gguf::reader::GgufFile;

/// A LLaMA transformer loaded from a GGUF file, weights dequantized to f32.
#[derive(Debug, Clone)]
pub struct LlamaModel {
    pub config: LlamaConfig,
    pub weights: LlamaWeights,
}

impl LlamaModel {
    pub fn from_gguf(gguf: &GgufFile) -> Result<LlamaModel> {
        let config = LlamaConfig::from_gguf(&gguf.metadata)?;
        let weights = LlamaWeights::from_gguf(gguf, &config)?;
        log::info!(
            "loaded llama model: {} layers, n_embd {}, {} heads ({} kv), vocab {}, trained context {}",
            config.n_layers,
            config.n_embd,
            config.n_heads,
            config.n_kv_heads,
            config.n_vocab,
            config.context_length
        );
        Ok(LlamaModel { config, weights })
    }

    pub fn config(&self) -> &LlamaConfig {
        &self.config
    }

    /// Run one token through every layer, caching its keys and values at
    /// `pos`. Returns the final hidden state before the output norm.
    fn forward_token(
        &self,
        token: u32,
        pos: usize,
        cache: &mut KvCache,
        backend: &dyn ComputeBackend,
    ) -> Result<Vec<f32>> {
        let cfg = &self.config;
        let n_embd = cfg.n_embd;
        let head_dim = cfg.head_dim;
        let q_dim = cfg.q_dim();
        let kv_dim = cfg.kv_dim();
        let heads_per_kv = cfg.n_heads / cfg.n_kv_heads;

        if token as usize >= cfg.n_vocab {
            return Err(ModelError::InvalidBatch(format!(
                "token id {} exceeds vocab size {}",
                token, cfg.n_vocab
            )));
        }
        cache.claim(pos)?;

        let embd_offset = token as usize * n_embd;
        let mut hidden = self.weights.token_embd[embd_offset..embd_offset + n_embd].to_vec();
        let scale = 1.0 / (head_dim as f32).sqrt();

        for (layer_idx, layer) in self.weights.layers.iter().enumerate() {
            let normed = backend.rms_norm(&hidden, &layer.attn_norm, cfg.norm_eps, n_embd)?;

            let q = backend.matmul(&layer.wq, &normed, q_dim, n_embd, 1)?;
            let k = backend.matmul(&layer.wk, &normed, kv_dim, n_embd, 1)?;
            let v = backend.matmul(&layer.wv, &normed, kv_dim, n_embd, 1)?;
            let (q, k) = backend.rope(&q, &k, head_dim, pos, cfg.n_heads, cfg.n_kv_heads, cfg.rope_theta)?;

            cache.store(layer_idx, pos, &k, &v)?;

            // The cache ends at `pos`, so attending to all of it is causal.
            let cached_k = cache.keys(layer_idx);
            let cached_v = cache.values(layer_idx);
            let seq_len = cache.len();

            let mut attn_out = vec![0.0f32; q_dim];
            for h in 0..cfg.n_heads {
                let kv_h = h / heads_per_kv;
                let q_head = &q[h * head_dim..(h + 1) * head_dim];

                let scores: Vec<f32> = (0..seq_len)
                    .map(|s| {
                        let k_head = &cached_k[s * kv_dim + kv_h * head_dim..][..head_dim];
                        q_head.iter().zip(k_head).map(|(a, b)| a * b).sum::<f32>() * scale
                    })
                    .collect();
                let probs = backend.softmax(&scores, seq_len)?;

                let out = &mut attn_out[h * head_dim..(h + 1) * head_dim];
                for (s, &p) in probs.iter().enumerate() {
                    let v_head = &cached_v[s * kv_dim + kv_h * head_dim..][..head_dim];
                    for (o, &val) in out.iter_mut().zip(v_head) {
                        *o += p * val;
                    }
                }
            }

            let attn_proj = backend.matmul(&layer.wo, &attn_out, n_embd, q_dim, 1)?;
            hidden = backend.add(&hidden, &attn_proj)?;

            // SwiGLU: down(silu(gate(x)) * up(x))
            let ffn_in = backend.rms_norm(&hidden, &layer.ffn_norm, cfg.norm_eps, n_embd)?;
            let gate = backend.matmul(&layer.ffn_gate, &ffn_in, cfg.n_ff, n_embd, 1)?;
            let up = backend.matmul(&layer.ffn_up, &ffn_in, cfg.n_ff, n_embd, 1)?;
            let gate_up = backend.mul(&backend.silu(&gate)?, &up)?;
            let ffn_out = backend.matmul(&layer.ffn_down, &gate_up, n_embd, cfg.n_ff, 1)?;
            hidden = backend.add(&hidden, &ffn_out)?;
        }

        Ok(hidden)
    }
}

impl ModelArchitecture for LlamaModel {
    /// Tokens are processed one after another; logits are only computed for
    /// flagged entries.
    fn forward(
        &self,
        batch: &Batch,
        cache: &mut KvCache,
        backend: &dyn ComputeBackend,
    ) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Err(ModelError::InvalidBatch("empty batch".to_string()));
        }
        if let Some(entry) = batch.entries().iter().find(|e| e.seq_id != 0) {
            return Err(ModelError::InvalidBatch(format!(
                "sequence id {} is not supported, only sequence 0",
                entry.seq_id
            )));
        }

        let cfg = &self.config;
        let mut rows = Vec::with_capacity(batch.n_outputs());
        for entry in batch.entries() {
            let hidden = self.forward_token(entry.token, entry.pos, cache, backend)?;
            if entry.logits {
                let normed = backend.rms_norm(&hidden, &self.weights.output_norm, cfg.norm_eps, cfg.n_embd)?;
                rows.push(backend.matmul(&self.weights.output, &normed, cfg.n_vocab, cfg.n_embd, 1)?);
            }
        }
        Ok(rows)
    }

    fn vocab_size(&self) -> usize {
        self.config.n_vocab
    }

    fn context_length(&self) -> usize {
        self.config.context_length
    }

    fn new_cache(&self, n_ctx: usize) -> Result<KvCache> {
        if n_ctx == 0 {
            return Err(ModelError::InvalidHyperparameters(
                "context size must be non-zero".to_string(),
            ));
        }
        KvCache::new(self.config.n_layers, self.config.kv_dim(), n_ctx)
    }
}
