use std::sync::OnceLock;

use edge_session::{Backend, CancelToken, Session};
use parking_lot::{Mutex, MutexGuard};

/// Process-wide state behind the C boundary: the backend and the single
/// session bound to it.
pub struct Runtime {
    pub backend: Option<Backend>,
    pub session: Option<Session>,
}

impl Runtime {
    /// Drop the session, which releases any loaded model.
    pub fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.unload();
        }
    }

    /// The session, created on first use. `None` until a backend is initialized.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        let backend = self.backend.as_ref()?;
        Some(self.session.get_or_insert_with(|| Session::new(backend)))
    }
}

static RUNTIME: Mutex<Runtime> = parking_lot::const_mutex(Runtime {
    backend: None,
    session: None,
});

/// Held for the whole of every call that touches the session, so loads,
/// unloads and generations never overlap.
pub fn lock() -> MutexGuard<'static, Runtime> {
    RUNTIME.lock()
}

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

/// Shared cancel flag. Lives outside the runtime lock so a cancel request
/// never waits behind the generation it targets.
pub fn cancel_token() -> &'static CancelToken {
    CANCEL.get_or_init(CancelToken::new)
}
