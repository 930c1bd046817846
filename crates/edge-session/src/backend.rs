use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::LevelFilter;

use crate::logging::{self, HostLog, StderrLog};

/// Settings for `Backend::init`.
#[derive(Clone)]
pub struct BackendConfig {
    pub log_level: LevelFilter,
    /// Where log records go. `None` writes to stderr.
    pub sink: Option<Arc<dyn HostLog>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            log_level: LevelFilter::Info,
            sink: None,
        }
    }
}

impl BackendConfig {
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn HostLog>) -> Self {
        self.sink = Some(sink);
        self
    }
}

#[derive(Debug)]
struct BackendState {
    ready: AtomicBool,
    max_threads: usize,
}

/// Handle to the process-wide compute backend.
///
/// Clones share readiness: once any clone calls `shutdown`, sessions bound
/// to the backend refuse to load or generate.
#[derive(Debug, Clone)]
pub struct Backend {
    state: Arc<BackendState>,
}

impl Backend {
    /// Install log routing and detect available parallelism.
    pub fn init(config: BackendConfig) -> Backend {
        let sink = config.sink.unwrap_or_else(|| Arc::new(StderrLog));
        logging::install(sink, config.log_level);

        let max_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        log::info!("backend initialized: cpu, {} threads available", max_threads);

        Backend {
            state: Arc::new(BackendState {
                ready: AtomicBool::new(true),
                max_threads,
            }),
        }
    }

    /// Mark the backend unusable. Calling it again only logs.
    pub fn shutdown(&self) {
        if self.state.ready.swap(false, Ordering::SeqCst) {
            log::info!("backend shut down");
        } else {
            log::info!("backend already shut down");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    pub fn max_threads(&self) -> usize {
        self.state.max_threads
    }
}
