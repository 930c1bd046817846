use std::fmt;

/// Why a generation call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model sampled an end-of-generation token.
    EndOfGeneration,
    /// `max_tokens` tokens were generated.
    MaxTokens,
    /// Decoding a generated token failed; the text so far is kept.
    DecodeFailed,
    /// The cancel token was set.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EndOfGeneration => "end of generation",
            StopReason::MaxTokens => "max tokens",
            StopReason::DecodeFailed => "decode failed",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Prompt length in tokens, including BOS.
    pub prompt_tokens: usize,
    /// Tokens sampled and fed back to the model. The end-of-generation token
    /// is not counted.
    pub generated_tokens: usize,
    pub stop: StopReason,
}

impl Completion {
    pub(crate) fn empty(prompt_tokens: usize, stop: StopReason) -> Self {
        Completion {
            text: String::new(),
            prompt_tokens,
            generated_tokens: 0,
            stop,
        }
    }

    /// True when generation ran to a natural end or the token budget.
    pub fn is_complete(&self) -> bool {
        matches!(self.stop, StopReason::EndOfGeneration | StopReason::MaxTokens)
    }
}
