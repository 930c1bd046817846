use std::path::Path;

use edge_sampler::SamplerChain;

use crate::backend::Backend;
use crate::completion::Completion;
use crate::context::Context;
use crate::error::{Result, SessionError};
use crate::generate;
use crate::model::Model;
use crate::params::{GenerateOptions, LoadParams};

/// A loaded model with the state built on top of it.
///
/// Fields drop in declaration order: sampler, context, then model.
struct Loaded {
    sampler: SamplerChain,
    context: Context,
    model: Model,
}

/// One inference session: at most one loaded model at a time.
///
/// All operations take `&mut self`, so a session is used by one thread at a
/// time. Share it across threads behind a mutex.
pub struct Session {
    backend: Backend,
    loaded: Option<Loaded>,
}

impl Session {
    pub fn new(backend: &Backend) -> Session {
        Session {
            backend: backend.clone(),
            loaded: None,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.backend.is_ready() {
            Ok(())
        } else {
            log::error!("backend is not initialized");
            Err(SessionError::BackendNotReady)
        }
    }

    /// Load a model and build its context and sampler chain.
    ///
    /// A model that is already loaded is released first. On failure the
    /// session is left empty and anything created along the way is released.
    pub fn load(&mut self, path: impl AsRef<Path>, params: &LoadParams) -> Result<()> {
        self.ensure_ready()?;
        if self.loaded.is_some() {
            log::info!("releasing the loaded model before loading another");
            self.unload();
        }

        let path = path.as_ref();
        log::info!(
            "loading model from {} (n_ctx {}, threads {}, gpu layers {})",
            path.display(),
            params.context_size,
            params.threads,
            params.gpu_layers
        );

        let model = Model::load(path, params.gpu_layers).map_err(|source| {
            log::error!("failed to load model from {}: {}", path.display(), source);
            SessionError::ModelLoad {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if params.gpu_layers > 0 {
            log::info!(
                "{} GPU layers requested but offload is unavailable, running all layers on the CPU",
                params.gpu_layers
            );
        }

        let threads = match params.threads {
            0 => self.backend.max_threads(),
            n => n,
        };
        // On error `model` is dropped here, before returning.
        let context = Context::new(model.architecture(), params.context_size, threads)
            .inspect_err(|e| log::error!("{}, releasing model", e))?;

        let sampler = SamplerChain::from_params(&params.sampler);
        log::info!("sampler chain: {:?}", sampler.names());

        self.loaded = Some(Loaded {
            sampler,
            context,
            model,
        });
        Ok(())
    }

    /// Generate up to `max_tokens` tokens continuing `prompt`.
    pub fn generate(&mut self, prompt: &str, max_tokens: usize) -> Result<Completion> {
        self.generate_with(prompt, &GenerateOptions::new(max_tokens))
    }

    pub fn generate_with(&mut self, prompt: &str, options: &GenerateOptions) -> Result<Completion> {
        let Some(loaded) = self.loaded.as_mut() else {
            log::error!("generate called with no model loaded");
            return Err(SessionError::InvalidState);
        };
        if !self.backend.is_ready() {
            log::error!("backend is not initialized");
            return Err(SessionError::BackendNotReady);
        }
        generate::run_completion(
            &mut loaded.context,
            &loaded.model,
            &mut loaded.sampler,
            prompt,
            options,
        )
    }

    /// Release the sampler chain, context and model, in that order.
    /// Does nothing when no model is loaded.
    pub fn unload(&mut self) {
        if let Some(Loaded {
            sampler,
            context,
            model,
        }) = self.loaded.take()
        {
            drop(sampler);
            drop(context);
            log::info!("released model {}", model.path().display());
            drop(model);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn model(&self) -> Option<&Model> {
        self.loaded.as_ref().map(|l| &l.model)
    }

    pub fn context(&self) -> Option<&Context> {
        self.loaded.as_ref().map(|l| &l.context)
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unload();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend_ready", &self.backend.is_ready())
            .field("model", &self.model().map(Model::path))
            .field("context", &self.context())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;

    #[test]
    fn test_generate_before_load() {
        let backend = Backend::init(BackendConfig::default());
        let mut session = Session::new(&backend);
        assert!(matches!(session.generate("hi", 4), Err(SessionError::InvalidState)));
        // A zero budget does not bypass the state check.
        assert!(matches!(session.generate("hi", 0), Err(SessionError::InvalidState)));
    }

    #[test]
    fn test_load_missing_file() {
        let backend = Backend::init(BackendConfig::default());
        let mut session = Session::new(&backend);
        let err = session
            .load("/nonexistent/model.gguf", &LoadParams::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::ModelLoad { .. }));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_load_after_shutdown() {
        let backend = Backend::init(BackendConfig::default());
        let mut session = Session::new(&backend);
        backend.shutdown();
        assert!(matches!(
            session.load("model.gguf", &LoadParams::default()),
            Err(SessionError::BackendNotReady)
        ));
    }

    #[test]
    fn test_unload_is_idempotent() {
        let backend = Backend::init(BackendConfig::default());
        let mut session = Session::new(&backend);
        session.unload();
        session.unload();
        assert!(!session.is_loaded());
    }
}
