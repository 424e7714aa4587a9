//! Session store trait and connectivity signalling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::session::SessionData;

/// Shared connect/disconnect flag a store exposes to the middleware.
///
/// Starts ready. A connectivity-aware store flips it on `disconnect` and
/// back on `connect`; while not ready the middleware skips session
/// handling entirely instead of failing requests.
#[derive(Clone, Debug)]
pub struct StoreReadiness {
    ready: Arc<AtomicBool>,
}

impl StoreReadiness {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Signal the backend is reachable again
    pub fn connect(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Signal the backend went away
    pub fn disconnect(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for StoreReadiness {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for session storage backends.
///
/// Records persist as JSON in the express-session shape, keyed by session
/// id. Expiry is implicit in the record: entries whose `cookie.expires`
/// has passed must be treated as absent by `get` and enumeration. A `get`
/// failure of [`SessionError::NotFound`] is a miss, not an error.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by id, `None` when absent or expired
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError>;

    /// Create or replace a session record
    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError>;

    /// Delete a session record
    async fn destroy(&self, sid: &str) -> Result<(), SessionError>;

    /// Refresh a session's expiry without rewriting its content.
    ///
    /// Only called when [`supports_touch`](SessionStore::supports_touch)
    /// reports true; the record's cookie carries the refreshed expiry.
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError>;

    /// Whether this backend implements `touch`. Probed once at middleware
    /// construction; when false only the save path is used.
    fn supports_touch(&self) -> bool {
        true
    }

    /// Connectivity flag observed by the middleware. The default handle is
    /// permanently ready; connectivity-aware stores return their own.
    fn readiness(&self) -> StoreReadiness {
        StoreReadiness::new()
    }

    /// Delete all sessions (diagnostics, optional)
    async fn clear(&self) -> Result<(), SessionError> {
        Err(SessionError::Unsupported("clear"))
    }

    /// Count of live sessions (diagnostics, optional)
    async fn length(&self) -> Result<usize, SessionError> {
        Err(SessionError::Unsupported("length"))
    }

    /// Ids of live sessions (diagnostics, optional)
    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        Err(SessionError::Unsupported("ids"))
    }

    /// All live session records (diagnostics, optional)
    async fn all(&self) -> Result<Vec<SessionData>, SessionError> {
        Err(SessionError::Unsupported("all"))
    }
}
