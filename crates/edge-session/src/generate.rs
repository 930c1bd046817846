//! The completion loop: prompt tokenization, batched prompt decode and
//! autoregressive sampling.
//!
//! Written against the `Decoder` and `Vocabulary` seams so it runs the same
//! over a real `Context` and `Model` as over test doubles.

use edge_model::Batch;
use edge_sampler::SamplerChain;

use crate::completion::{Completion, StopReason};
use crate::error::{Result, SessionError};
use crate::params::GenerateOptions;

/// Extra token capacity allowed beyond the prompt's byte length.
pub const TOKENIZE_HEADROOM: usize = 128;

/// Longest piece a single generated token may render to.
pub const MAX_PIECE_BYTES: usize = 128;

/// Text to token conversion.
pub trait Vocabulary {
    fn tokenize(
        &self,
        text: &str,
        capacity: usize,
        add_special: bool,
        parse_special: bool,
    ) -> edge_model::Result<Vec<u32>>;

    fn token_to_piece(&self, token: u32, max_len: usize, render_special: bool) -> edge_model::Result<Vec<u8>>;

    fn is_eog(&self, token: u32) -> bool;
}

/// Runs batches through a model, keeping the KV cache between calls.
pub trait Decoder {
    /// Most entries one `decode` call accepts.
    fn batch_capacity(&self) -> usize;

    /// Drop every cached position.
    fn clear_memory(&mut self);

    fn decode(&mut self, batch: &Batch) -> edge_model::Result<()>;

    /// Logits of the last flagged entry of the last successful decode.
    fn logits(&self) -> Option<&[f32]>;
}

/// Generate a completion of `prompt`.
///
/// The decoder's memory is cleared first, so nothing carries over between
/// calls. Failures before the first sampled token are errors; a decode
/// failure after that ends generation with `StopReason::DecodeFailed` and
/// keeps the text produced so far.
pub fn run_completion<D, V>(
    decoder: &mut D,
    vocab: &V,
    sampler: &mut SamplerChain,
    prompt: &str,
    options: &GenerateOptions,
) -> Result<Completion>
where
    D: Decoder + ?Sized,
    V: Vocabulary + ?Sized,
{
    if options.max_tokens == 0 {
        return Ok(Completion::empty(0, StopReason::MaxTokens));
    }

    let tokens = vocab
        .tokenize(prompt, prompt.len() + TOKENIZE_HEADROOM, true, true)
        .map_err(|e| {
            log::error!("failed to tokenize prompt: {}", e);
            SessionError::Tokenization(e.to_string())
        })?;
    if tokens.is_empty() {
        log::error!("prompt produced no tokens");
        return Err(SessionError::Tokenization("prompt produced no tokens".to_string()));
    }
    let n_prompt = tokens.len();
    log::debug!("prompt: {} bytes, {} tokens", prompt.len(), n_prompt);

    decoder.clear_memory();
    sampler.reset();

    decode_prompt(decoder, &tokens)?;

    let mut text = Vec::new();
    let mut generated = 0;
    let mut stop = StopReason::MaxTokens;
    let mut batch = Batch::with_capacity(1);

    while generated < options.max_tokens {
        if options.is_cancelled() {
            log::info!("generation cancelled after {} tokens", generated);
            stop = StopReason::Cancelled;
            break;
        }

        let Some(logits) = decoder.logits() else {
            log::error!("no logits available after decode");
            stop = StopReason::DecodeFailed;
            break;
        };
        let token = sampler.sample(logits);
        sampler.accept(token);

        if vocab.is_eog(token) {
            log::debug!("end of generation token {}", token);
            stop = StopReason::EndOfGeneration;
            break;
        }

        match vocab.token_to_piece(token, MAX_PIECE_BYTES, true) {
            Ok(piece) => text.extend_from_slice(&piece),
            Err(e) => log::warn!("skipping piece of token {}: {}", token, e),
        }

        let pos = n_prompt + generated;
        generated += 1;
        log::debug!("token {} at position {}", token, pos);

        batch.clear();
        let fed = batch
            .add(token, pos, 0, true)
            .and_then(|()| decoder.decode(&batch));
        if let Err(e) = fed {
            log::error!("decode failed at position {}, returning partial text: {}", pos, e);
            stop = StopReason::DecodeFailed;
            break;
        }
    }

    log::info!(
        "generation finished: {} prompt tokens, {} generated, stop: {}",
        n_prompt,
        generated,
        stop
    );

    Ok(Completion {
        text: String::from_utf8_lossy(&text).into_owned(),
        prompt_tokens: n_prompt,
        generated_tokens: generated,
        stop,
    })
}

/// Feed the prompt in batches of at most `batch_capacity` tokens at
/// positions `0..n`. Only the last prompt token requests logits.
fn decode_prompt<D: Decoder + ?Sized>(decoder: &mut D, tokens: &[u32]) -> Result<()> {
    let n_batch = decoder.batch_capacity().max(1);
    let last = tokens.len() - 1;
    let mut batch = Batch::with_capacity(n_batch);

    for (i, chunk) in tokens.chunks(n_batch).enumerate() {
        let start = i * n_batch;
        batch.clear();
        let result = chunk
            .iter()
            .enumerate()
            .try_for_each(|(j, &token)| batch.add(token, start + j, 0, start + j == last))
            .and_then(|()| decoder.decode(&batch));
        if let Err(source) = result {
            log::error!("prompt decode failed in batch at position {}: {}", start, source);
            return Err(SessionError::PromptDecode {
                position: start,
                source,
            });
        }
    }
    Ok(())
}
