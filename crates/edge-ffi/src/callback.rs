use std::ffi::CString;
use std::os::raw::c_char;

use edge_session::HostLog;

use crate::types::EdgeLogLevel;

/// Forwards log records to a host-supplied C callback.
pub struct CallbackLog {
    callback: extern "C" fn(level: EdgeLogLevel, message: *const c_char),
}

impl CallbackLog {
    pub fn new(callback: extern "C" fn(level: EdgeLogLevel, message: *const c_char)) -> Self {
        CallbackLog { callback }
    }

    fn emit(&self, level: EdgeLogLevel, target: &str, message: &str) {
        let line = format!("{}: {}", target, message).replace('\0', " ");
        if let Ok(c_str) = CString::new(line) {
            (self.callback)(level, c_str.as_ptr());
        }
    }
}

impl HostLog for CallbackLog {
    fn info(&self, target: &str, message: &str) {
        self.emit(EdgeLogLevel::Info, target, message);
    }

    fn error(&self, target: &str, message: &str) {
        self.emit(EdgeLogLevel::Error, target, message);
    }
}
