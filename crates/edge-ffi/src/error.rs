use std::cell::{Cell, RefCell};
use std::ffi::CString;

use crate::types::{EdgeStatus, EdgeStopReason};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static LAST_STATUS: Cell<EdgeStatus> = const { Cell::new(EdgeStatus::Ok) };
    static LAST_STOP: Cell<EdgeStopReason> = const { Cell::new(EdgeStopReason::None) };
}

/// Store an error message for later retrieval via `edge_last_error`.
pub fn set_last_error(msg: impl Into<String>) {
    let msg = msg.into().replace('\0', " ");
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

pub fn set_status(status: EdgeStatus) {
    LAST_STATUS.with(|s| s.set(status));
}

pub fn last_status() -> EdgeStatus {
    LAST_STATUS.with(Cell::get)
}

pub fn set_stop_reason(stop: EdgeStopReason) {
    LAST_STOP.with(|s| s.set(stop));
}

pub fn last_stop_reason() -> EdgeStopReason {
    LAST_STOP.with(Cell::get)
}

/// Record `status` and, when it is an error, `msg` as the last error.
pub fn fail(status: EdgeStatus, msg: impl Into<String>) -> EdgeStatus {
    set_last_error(msg);
    set_status(status);
    status
}
