//! `edge-ffi` - C boundary for edge-runtime.
//!
//! One backend and one session per process. Every export is safe to call from
//! any thread; calls that touch the session are serialized. Status, stop
//! reason and error message of the latest call are kept per calling thread.

mod callback;
mod error;
mod runtime;
mod types;

pub use types::*;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use edge_session::{BackendConfig, GenerateOptions, HostLog, LoadParams};
use log::LevelFilter;

use callback::CallbackLog;
use error::{fail, set_status, set_stop_reason};

/// Run `f`, converting a panic into `EdgeStatus::ErrorInternal` and `fallback`.
fn catch_panic<T, F: FnOnce() -> T>(fallback: impl FnOnce() -> T, f: F) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            fail(EdgeStatus::ErrorInternal, "internal panic");
            fallback()
        }
    }
}

fn empty_string() -> *mut c_char {
    CString::default().into_raw()
}

fn init_backend(sink: Option<Arc<dyn HostLog>>) -> EdgeStatus {
    let mut rt = runtime::lock();
    if let Some(backend) = rt.backend.as_ref().filter(|b| b.is_ready()) {
        if let Some(sink) = sink {
            edge_session::logging::install(sink, LevelFilter::Info);
        }
        log::info!("backend already initialized ({} threads)", backend.max_threads());
        set_status(EdgeStatus::Ok);
        return EdgeStatus::Ok;
    }

    let mut config = BackendConfig::default();
    if let Some(sink) = sink {
        config = config.with_sink(sink);
    }
    rt.release_session();
    rt.backend = Some(edge_session::Backend::init(config));
    set_status(EdgeStatus::Ok);
    EdgeStatus::Ok
}

/// Initialize the backend, logging to stderr. Calling it again while the
/// backend is up keeps the current state.
#[no_mangle]
pub extern "C" fn edge_backend_init() -> EdgeStatus {
    catch_panic(|| EdgeStatus::ErrorInternal, || init_backend(None))
}

/// Initialize the backend, sending log lines to `callback`. Error records
/// arrive with `EdgeLogLevel::Error`, all others with `EdgeLogLevel::Info`.
/// A null callback logs to stderr. On an initialized backend this only
/// replaces the log destination.
#[no_mangle]
pub extern "C" fn edge_backend_init_with_log(callback: EdgeLogCallback) -> EdgeStatus {
    catch_panic(
        || EdgeStatus::ErrorInternal,
        || {
            let sink = callback.map(|cb| Arc::new(CallbackLog::new(cb)) as Arc<dyn HostLog>);
            init_backend(sink)
        },
    )
}

/// Release any loaded model, then shut the backend down. Safe to call more
/// than once.
#[no_mangle]
pub extern "C" fn edge_backend_free() {
    catch_panic(
        || (),
        || {
            let mut rt = runtime::lock();
            rt.release_session();
            if let Some(backend) = rt.backend.take() {
                backend.shutdown();
            }
            set_status(EdgeStatus::Ok);
        },
    )
}

/// Load a GGUF model and create its context and sampler.
///
/// `n_ctx == 0` uses the model's trained context length and `n_threads == 0`
/// uses every core. A negative `n_gpu_layers` requests all layers. A model
/// that is already loaded is released first. Returns `false` on failure; see
/// `edge_last_status` and `edge_last_error`.
///
/// # Safety
/// `model_path` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn edge_load_model(
    model_path: *const c_char,
    n_ctx: i32,
    n_threads: i32,
    n_gpu_layers: i32,
) -> bool {
    catch_panic(
        || false,
        || {
            if model_path.is_null() {
                fail(EdgeStatus::ErrorInvalidArgument, "model path is null");
                return false;
            }
            let path = match unsafe { CStr::from_ptr(model_path) }.to_str() {
                Ok(s) => s,
                Err(e) => {
                    fail(EdgeStatus::ErrorInvalidArgument, format!("invalid path: {}", e));
                    return false;
                }
            };
            let (Ok(n_ctx), Ok(n_threads)) = (usize::try_from(n_ctx), usize::try_from(n_threads))
            else {
                fail(
                    EdgeStatus::ErrorInvalidArgument,
                    format!("negative context size {} or thread count {}", n_ctx, n_threads),
                );
                return false;
            };
            let gpu_layers = u32::try_from(n_gpu_layers).unwrap_or(u32::MAX);

            let params = LoadParams::default()
                .with_context_size(n_ctx)
                .with_threads(n_threads)
                .with_gpu_layers(gpu_layers);

            let mut rt = runtime::lock();
            let Some(session) = rt.session_mut() else {
                fail(EdgeStatus::ErrorBackendNotReady, "backend is not initialized");
                return false;
            };
            match session.load(path, &params) {
                Ok(()) => {
                    set_status(EdgeStatus::Ok);
                    true
                }
                Err(e) => {
                    fail(EdgeStatus::from(&e), e.to_string());
                    false
                }
            }
        },
    )
}

/// Generate up to `max_tokens` tokens continuing `prompt`.
///
/// Always returns a string owned by the caller, to be freed with
/// `edge_free_string`. On failure the string is empty and `edge_last_status`
/// says why. Text generated before a mid-generation decode failure or a
/// cancel is returned; `edge_last_stop_reason` tells the cases apart.
/// `max_tokens <= 0` returns an empty string.
///
/// # Safety
/// `prompt` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn edge_generate_completion(
    prompt: *const c_char,
    max_tokens: i32,
) -> *mut c_char {
    catch_panic(empty_string, || {
        set_stop_reason(EdgeStopReason::None);
        if prompt.is_null() {
            fail(EdgeStatus::ErrorInvalidArgument, "prompt is null");
            return empty_string();
        }
        let prompt = match unsafe { CStr::from_ptr(prompt) }.to_str() {
            Ok(s) => s,
            Err(e) => {
                fail(EdgeStatus::ErrorInvalidArgument, format!("invalid prompt: {}", e));
                return empty_string();
            }
        };
        let max_tokens = usize::try_from(max_tokens).unwrap_or(0);

        let mut rt = runtime::lock();
        let Some(session) = rt.session.as_mut() else {
            fail(EdgeStatus::ErrorInvalidState, "no model is loaded");
            return empty_string();
        };

        let cancel = runtime::cancel_token();
        cancel.reset();
        let options = GenerateOptions::new(max_tokens).with_cancel(cancel.clone());
        match session.generate_with(prompt, &options) {
            Ok(completion) => {
                set_status(EdgeStatus::Ok);
                set_stop_reason(completion.stop.into());
                let text = completion.text.replace('\0', "");
                CString::new(text).map_or_else(|_| empty_string(), CString::into_raw)
            }
            Err(e) => {
                fail(EdgeStatus::from(&e), e.to_string());
                empty_string()
            }
        }
    })
}

/// Release the loaded model, its context and sampler. No-op when nothing
/// is loaded.
#[no_mangle]
pub extern "C" fn edge_unload() {
    catch_panic(
        || (),
        || {
            let mut rt = runtime::lock();
            if let Some(session) = rt.session.as_mut() {
                session.unload();
            }
            set_status(EdgeStatus::Ok);
        },
    )
}

/// True when a model is loaded.
#[no_mangle]
pub extern "C" fn edge_is_loaded() -> bool {
    catch_panic(
        || false,
        || runtime::lock().session.as_ref().is_some_and(|s| s.is_loaded()),
    )
}

/// Ask the running generation to stop after its current token. Returns
/// immediately; it never waits for the generation to finish. Has no effect
/// on generations started afterwards.
#[no_mangle]
pub extern "C" fn edge_cancel_generation() {
    runtime::cancel_token().cancel();
}

/// Status of the latest call made on this thread.
#[no_mangle]
pub extern "C" fn edge_last_status() -> EdgeStatus {
    error::last_status()
}

/// Stop reason of the latest `edge_generate_completion` on this thread.
#[no_mangle]
pub extern "C" fn edge_last_stop_reason() -> EdgeStopReason {
    error::last_stop_reason()
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if there is none. The caller must free the returned string with
/// `edge_free_string`.
#[no_mangle]
pub extern "C" fn edge_last_error() -> *mut c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null_mut(),
    }
}

/// Free a string returned by `edge_generate_completion` or `edge_last_error`.
///
/// # Safety
/// `s` must be null or a pointer obtained from this library and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn edge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    static SERIAL: Mutex<()> = parking_lot::const_mutex(());

    fn take_string(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let text = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
        unsafe { edge_free_string(s) };
        text
    }

    #[test]
    fn test_catch_panic_reports_internal() {
        let value = catch_panic(|| 7, || -> i32 { panic!("boom") });
        assert_eq!(value, 7);
        assert_eq!(edge_last_status(), EdgeStatus::ErrorInternal);
        assert_eq!(take_string(edge_last_error()), "internal panic");
    }

    #[test]
    fn test_generate_without_model() {
        let _guard = SERIAL.lock();
        edge_backend_free();
        let prompt = CString::new("hi").unwrap();
        let out = unsafe { edge_generate_completion(prompt.as_ptr(), 8) };
        assert_eq!(take_string(out), "");
        assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidState);
        assert_eq!(edge_last_stop_reason(), EdgeStopReason::None);
    }

    #[test]
    fn test_load_requires_backend() {
        let _guard = SERIAL.lock();
        edge_backend_free();
        let path = CString::new("/nonexistent/model.gguf").unwrap();
        assert!(!unsafe { edge_load_model(path.as_ptr(), 2048, 4, 0) });
        assert_eq!(edge_last_status(), EdgeStatus::ErrorBackendNotReady);
    }

    #[test]
    fn test_null_arguments() {
        let _guard = SERIAL.lock();
        assert!(!unsafe { edge_load_model(std::ptr::null(), 2048, 4, 0) });
        assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidArgument);
        let out = unsafe { edge_generate_completion(std::ptr::null(), 8) };
        assert_eq!(take_string(out), "");
        assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidArgument);
        unsafe { edge_free_string(std::ptr::null_mut()) };
    }

    #[test]
    fn test_negative_sizes_rejected() {
        let _guard = SERIAL.lock();
        assert_eq!(edge_backend_init(), EdgeStatus::Ok);
        let path = CString::new("/nonexistent/model.gguf").unwrap();
        assert!(!unsafe { edge_load_model(path.as_ptr(), -1, 4, 0) });
        assert_eq!(edge_last_status(), EdgeStatus::ErrorInvalidArgument);
        assert!(!unsafe { edge_load_model(path.as_ptr(), 2048, 4, 0) });
        assert_eq!(edge_last_status(), EdgeStatus::ErrorModelLoad);
        assert!(!edge_is_loaded());
        edge_backend_free();
        edge_backend_free();
    }
}
