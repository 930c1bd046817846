//! Tiny llama GGUF fixtures.
//!
//! Attention and feed-forward outputs are zero, so the hidden state is the
//! token embedding and the logits depend only on the output matrix. One
//! vocabulary row is made dominant, which makes every sampled token that one
//! regardless of sampler settings.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use edge_model::gguf::{GgufMetadataValue, GgufWriter};

pub const BOS: u32 = 1;
pub const EOS: u32 = 2;
pub const END_OF_TURN: u32 = 3;
pub const HELLO: u32 = 16;

const TOKENS: &[&str] = &[
    "<unk>", "<s>", "</s>", "<end_of_turn>", "\u{2581}", "H", "e", "l", "o", "w", "r", "d", "ll",
    "llo", "\u{2581}H", "\u{2581}He", "\u{2581}Hello", "or", "ld", "\u{2581}w", "\u{2581}wor",
    "\u{2581}world", "<0x0A>", "<0xC3>", "<0xA9>",
];

const N_EMBD: u64 = 8;
const N_HEADS: u32 = 2;
const N_KV_HEADS: u32 = 1;
const N_FF: u64 = 16;
const CONTEXT_LENGTH: u32 = 64;

pub struct Fixture {
    pub arch: &'static str,
    /// Token every decode step predicts.
    pub dominant: u32,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            arch: "llama",
            dominant: HELLO,
        }
    }
}

fn strings(items: &[&str]) -> GgufMetadataValue {
    GgufMetadataValue::Array(
        items
            .iter()
            .map(|s| GgufMetadataValue::String(s.to_string()))
            .collect(),
    )
}

impl Fixture {
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let n_vocab = TOKENS.len() as u64;
        let head_dim = N_EMBD / N_HEADS as u64;
        let kv_dim = head_dim * N_KV_HEADS as u64;
        let arch = self.arch;

        let mut types = vec![1i32; TOKENS.len()];
        types[0] = 2;
        types[1..4].fill(3);
        types[22..25].fill(6);

        let mut w = GgufWriter::new();
        w.add_metadata("general.architecture", GgufMetadataValue::String(arch.into()))
            .add_metadata("general.name", GgufMetadataValue::String("tiny-fixture".into()))
            .add_metadata(&format!("{arch}.context_length"), GgufMetadataValue::U32(CONTEXT_LENGTH))
            .add_metadata(&format!("{arch}.embedding_length"), GgufMetadataValue::U32(N_EMBD as u32))
            .add_metadata(&format!("{arch}.block_count"), GgufMetadataValue::U32(1))
            .add_metadata(&format!("{arch}.feed_forward_length"), GgufMetadataValue::U32(N_FF as u32))
            .add_metadata(&format!("{arch}.attention.head_count"), GgufMetadataValue::U32(N_HEADS))
            .add_metadata(&format!("{arch}.attention.head_count_kv"), GgufMetadataValue::U32(N_KV_HEADS))
            .add_metadata(
                &format!("{arch}.attention.layer_norm_rms_epsilon"),
                GgufMetadataValue::F32(1e-5),
            )
            .add_metadata("tokenizer.ggml.model", GgufMetadataValue::String("llama".into()))
            .add_metadata("tokenizer.ggml.tokens", strings(TOKENS))
            .add_metadata(
                "tokenizer.ggml.scores",
                GgufMetadataValue::Array((0..TOKENS.len()).map(|i| GgufMetadataValue::F32(i as f32)).collect()),
            )
            .add_metadata(
                "tokenizer.ggml.token_type",
                GgufMetadataValue::Array(types.into_iter().map(GgufMetadataValue::I32).collect()),
            )
            .add_metadata("tokenizer.ggml.bos_token_id", GgufMetadataValue::U32(BOS))
            .add_metadata("tokenizer.ggml.eos_token_id", GgufMetadataValue::U32(EOS))
            .add_metadata("tokenizer.ggml.eot_token_id", GgufMetadataValue::U32(END_OF_TURN));

        let zeros = |n: u64| vec![0.0f32; n as usize];
        let mut output = zeros(n_vocab * N_EMBD);
        let row = self.dominant as usize * N_EMBD as usize;
        output[row..row + N_EMBD as usize].fill(10.0);

        w.add_tensor_f32("token_embd.weight", &[N_EMBD, n_vocab], vec![1.0; (n_vocab * N_EMBD) as usize])
            .unwrap();
        w.add_tensor_f32("output_norm.weight", &[N_EMBD], vec![1.0; N_EMBD as usize]).unwrap();
        w.add_tensor_f32("output.weight", &[N_EMBD, n_vocab], output).unwrap();
        w.add_tensor_f32("blk.0.attn_norm.weight", &[N_EMBD], vec![1.0; N_EMBD as usize]).unwrap();
        w.add_tensor_f32("blk.0.attn_q.weight", &[N_EMBD, N_EMBD], zeros(N_EMBD * N_EMBD)).unwrap();
        w.add_tensor_f32("blk.0.attn_k.weight", &[N_EMBD, kv_dim], zeros(N_EMBD * kv_dim)).unwrap();
        w.add_tensor_f32("blk.0.attn_v.weight", &[N_EMBD, kv_dim], zeros(N_EMBD * kv_dim)).unwrap();
        w.add_tensor_f32("blk.0.attn_output.weight", &[N_EMBD, N_EMBD], zeros(N_EMBD * N_EMBD)).unwrap();
        w.add_tensor_f32("blk.0.ffn_norm.weight", &[N_EMBD], vec![1.0; N_EMBD as usize]).unwrap();
        w.add_tensor_f32("blk.0.ffn_gate.weight", &[N_EMBD, N_FF], zeros(N_EMBD * N_FF)).unwrap();
        w.add_tensor_f32("blk.0.ffn_up.weight", &[N_EMBD, N_FF], zeros(N_EMBD * N_FF)).unwrap();
        w.add_tensor_f32("blk.0.ffn_down.weight", &[N_FF, N_EMBD], zeros(N_FF * N_EMBD)).unwrap();

        let path = dir.join(name);
        w.write_file(&path).unwrap();
        path
    }
}
