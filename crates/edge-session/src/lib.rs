//! `edge-session` - Inference session lifecycle for edge-runtime.
//!
//! A [`Backend`] is initialized once per process and routes `log` records to
//! the host. A [`Session`] owns at most one loaded model together with its
//! execution [`Context`] and sampler chain, and turns prompts into
//! [`Completion`]s.

pub mod backend;
pub mod cancel;
pub mod completion;
pub mod context;
pub mod error;
pub mod generate;
pub mod logging;
pub mod model;
pub mod params;
pub mod session;

pub use backend::{Backend, BackendConfig};
pub use cancel::CancelToken;
pub use completion::{Completion, StopReason};
pub use context::Context;
pub use error::{Result, SessionError};
pub use generate::{Decoder, Vocabulary, MAX_PIECE_BYTES, TOKENIZE_HEADROOM};
pub use logging::{HostLog, StderrLog};
pub use model::Model;
pub use params::{GenerateOptions, LoadParams};
pub use session::Session;

pub use edge_sampler::SamplerParams;
