use std::sync::{Arc, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::RwLock;

/// The host's logging facility: an informational and an error channel.
pub trait HostLog: Send + Sync {
    fn info(&self, target: &str, message: &str);
    fn error(&self, target: &str, message: &str);
}

/// Writes both channels to stderr.
#[derive(Debug, Default)]
pub struct StderrLog;

impl HostLog for StderrLog {
    fn info(&self, target: &str, message: &str) {
        eprintln!("[I] {}: {}", target, message);
    }

    fn error(&self, target: &str, message: &str) {
        eprintln!("[E] {}: {}", target, message);
    }
}

/// `log` implementation forwarding records to a swappable `HostLog` by
/// severity: `Error` to the error channel, everything else to info.
pub(crate) struct SeverityRouter {
    sink: RwLock<Arc<dyn HostLog>>,
}

impl SeverityRouter {
    pub(crate) fn new(sink: Arc<dyn HostLog>) -> Self {
        SeverityRouter {
            sink: RwLock::new(sink),
        }
    }

    pub(crate) fn set_sink(&self, sink: Arc<dyn HostLog>) {
        *self.sink.write() = sink;
    }
}

impl Log for SeverityRouter {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        let sink = self.sink.read();
        match record.level() {
            Level::Error => sink.error(record.target(), &message),
            _ => sink.info(record.target(), &message),
        }
    }

    fn flush(&self) {}
}

static ROUTER: OnceLock<SeverityRouter> = OnceLock::new();

/// Route `log` records to `sink` at `level` and below.
///
/// The router is registered with `log` once per process; later calls swap
/// the sink. If the host registered its own logger first, that logger keeps
/// receiving records and `sink` is unused.
pub fn install(sink: Arc<dyn HostLog>, level: LevelFilter) {
    let mut fresh = false;
    let router = ROUTER.get_or_init(|| {
        fresh = true;
        SeverityRouter::new(sink.clone())
    });
    if fresh {
        if log::set_logger(router).is_err() {
            eprintln!("edge-session: a logger is already installed, keeping it");
        }
    } else {
        router.set_sink(sink);
    }
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(&'static str, String)>>,
    }

    impl HostLog for Capture {
        fn info(&self, _target: &str, message: &str) {
            self.lines.lock().push(("info", message.to_string()));
        }

        fn error(&self, _target: &str, message: &str) {
            self.lines.lock().push(("error", message.to_string()));
        }
    }

    fn emit(router: &SeverityRouter, level: Level, message: &str) {
        router.log(
            &Record::builder()
                .level(level)
                .target("test")
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn test_routes_by_severity() {
        log::set_max_level(LevelFilter::Trace);
        let capture = Arc::new(Capture::default());
        let router = SeverityRouter::new(capture.clone());

        emit(&router, Level::Error, "boom");
        emit(&router, Level::Warn, "careful");
        emit(&router, Level::Info, "hello");

        let lines = capture.lines.lock().clone();
        assert_eq!(
            lines,
            vec![
                ("error", "boom".to_string()),
                ("info", "careful".to_string()),
                ("info", "hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_sink_swap() {
        log::set_max_level(LevelFilter::Trace);
        let first = Arc::new(Capture::default());
        let second = Arc::new(Capture::default());
        let router = SeverityRouter::new(first.clone());

        emit(&router, Level::Info, "one");
        router.set_sink(second.clone());
        emit(&router, Level::Info, "two");

        assert_eq!(first.lines.lock().len(), 1);
        assert_eq!(second.lines.lock()[0].1, "two");
    }
}
