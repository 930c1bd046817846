//! Drives the C boundary end to end against a tiny generated llama model.

#[path = "../../edge-session/tests/common/mod.rs"]
mod common;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use edge_ffi::*;
use parking_lot::Mutex;

use common::{Fixture, EOS};

static SERIAL: Mutex<()> = parking_lot::const_mutex(());
static LOG_LINES: Mutex<Vec<(EdgeLogLevel, String)>> = parking_lot::const_mutex(Vec::new());

extern "C" fn capture(level: EdgeLogLevel, message: *const c_char) {
    let text = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
    LOG_LINES.lock().push((level, text));
}

fn take_string(s: *mut c_char) -> String {
    assert!(!s.is_null());
    let text = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
    unsafe { edge_free_string(s) };
    text
}

fn generate(prompt: &str, max_tokens: i32) -> String {
    let prompt = CString::new(prompt).unwrap();
    take_string(unsafe { edge_generate_completion(prompt.as_ptr(), max_tokens) })
}

fn load(path: &std::path::Path, n_ctx: i32) -> bool {
    let path = CString::new(path.to_str().unwrap()).unwrap();
    unsafe { edge_load_model(path.as_ptr(), n_ctx, 2, 0) }
}

#[test]
fn test_full_lifecycle() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let path = Fixture::default().write(dir.path(), "tiny.gguf");

    assert_eq!(edge_backend_init(), EdgeStatus::Ok);
    assert!(load(&path, 2048));
    assert!(edge_is_loaded());

    assert_eq!(generate("Hello", 5), " Hello Hello Hello Hello Hello");
    assert_eq!(edge_last_status(), EdgeStatus::Ok);
    assert_eq!(edge_last_stop_reason(), EdgeStopReason::MaxTokens);

    assert_eq!(generate("Hello", 0), "");
    assert_eq!(edge_last_status(), EdgeStatus::Ok);
    assert_eq!(generate("Hello", -3), "");

    edge_unload();
    assert!(!edge_is_loaded());
    assert_eq!(generate("Hello", 5), "");
    assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidState);

    edge_backend_free();
    edge_backend_free();
}

#[test]
fn test_end_of_generation_stop() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let path = Fixture {
        dominant: EOS,
        ..Fixture::default()
    }
    .write(dir.path(), "eos.gguf");

    assert_eq!(edge_backend_init(), EdgeStatus::Ok);
    assert!(load(&path, 0));
    assert_eq!(generate("Hello", 16), "");
    assert_eq!(edge_last_status(), EdgeStatus::Ok);
    assert_eq!(edge_last_stop_reason(), EdgeStopReason::EndOfGeneration);
    edge_backend_free();
}

#[test]
fn test_failed_load_keeps_session_empty() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let good = Fixture::default().write(dir.path(), "tiny.gguf");

    assert_eq!(edge_backend_init(), EdgeStatus::Ok);
    assert!(load(&good, 2048));
    assert!(!load(&dir.path().join("missing.gguf"), 2048));
    assert_eq!(edge_last_status(), EdgeStatus::ErrorModelLoad);
    let message = take_string(edge_last_error());
    assert!(message.contains("missing.gguf"), "{}", message);
    assert!(!edge_is_loaded());

    assert_eq!(generate("Hello", 2), "");
    assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidState);
    edge_backend_free();
}

#[test]
fn test_decode_failure_returns_partial_text() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let path = Fixture::default().write(dir.path(), "tiny.gguf");

    assert_eq!(edge_backend_init(), EdgeStatus::Ok);
    assert!(load(&path, 4));
    assert_eq!(generate("Hello", 10), " Hello Hello Hello");
    assert_eq!(edge_last_status(), EdgeStatus::Ok);
    assert_eq!(edge_last_stop_reason(), EdgeStopReason::DecodeFailed);
    edge_backend_free();
}

#[test]
fn test_stale_cancel_does_not_affect_next_generation() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let path = Fixture::default().write(dir.path(), "tiny.gguf");

    assert_eq!(edge_backend_init(), EdgeStatus::Ok);
    assert!(load(&path, 2048));
    edge_cancel_generation();
    assert_eq!(generate("Hello", 2), " Hello Hello");
    assert_eq!(edge_last_stop_reason(), EdgeStopReason::MaxTokens);
    edge_backend_free();
}

#[test]
fn test_log_callback_receives_error_channel() {
    let _guard = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(edge_backend_init_with_log(Some(capture)), EdgeStatus::Ok);
    assert!(!load(&dir.path().join("absent.gguf"), 2048));

    let lines = LOG_LINES.lock().clone();
    assert!(
        lines
            .iter()
            .any(|(level, text)| *level == EdgeLogLevel::Error && text.contains("absent.gguf")),
        "{:?}",
        lines
    );
    assert!(lines.iter().any(|(level, _)| *level == EdgeLogLevel::Info), "{:?}", lines);
    edge_backend_free();
}
