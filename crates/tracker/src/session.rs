//! Session lifecycle management.
//!
//! Guarantees at most one active scan or poll loop per key: a new key
//! tears down the previous session (by flag, synchronously) before a
//! fresh token is handed out. In-flight calls belonging to a torn-down
//! session become no-ops on completion.

use crate::cancel::CancelToken;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Single-slot registry of the active session.
#[derive(Debug, Default)]
pub struct SessionRegistry<K> {
    current: Mutex<Option<(K, CancelToken)>>,
}

impl<K: PartialEq> SessionRegistry<K> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Cancel the current session, if any, and begin a new one for
    /// `key`. Teardown-then-restart, never accumulation.
    pub fn begin(&self, key: K) -> CancelToken {
        let mut current = self.current.lock();
        if let Some((_, token)) = current.take() {
            token.cancel();
        }
        let token = CancelToken::new();
        *current = Some((key, token.clone()));
        token
    }

    /// Cancel the current session without starting another.
    pub fn clear(&self) {
        if let Some((_, token)) = self.current.lock().take() {
            token.cancel();
        }
    }

    /// Key of the active session, if one is running.
    pub fn active_key(&self) -> Option<K>
    where
        K: Clone,
    {
        self.current.lock().as_ref().map(|(key, _)| key.clone())
    }
}

/// Handle to a running background service.
///
/// `shutdown` is synchronous: it only sets the cancellation flag.
/// `stop` additionally waits for the service's loops to observe the
/// flag, exit, and release whatever they hold.
#[derive(Debug)]
pub struct ServiceHandle {
    token: CancelToken,
    cleanup: JoinHandle<()>,
}

impl ServiceHandle {
    pub fn new(token: CancelToken, cleanup: JoinHandle<()>) -> Self {
        Self { token, cleanup }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Signal the service to stop. In-flight network calls are not
    /// aborted; their results are discarded on completion.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Shut down and wait for teardown to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.cleanup.await;
    }
}
