//! Session record and per-request tracking state
//!
//! `SessionData` is the persisted record, shaped like an express-session
//! record: the cookie descriptor under the reserved `cookie` key and all
//! application data flattened beside it. `Session` is the cheap-clone
//! handle given to request handlers; the dirty-tracking state it carries
//! (original/saved hashes, unset flag) belongs to the request's lifecycle
//! coordinator, which reads it at finalization time.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::IdGenerator;
use crate::cookie::SessionCookie;
use crate::error::SessionError;
use crate::store::SessionStore;

/// Reserved top-level key holding the cookie descriptor.
///
/// An application data key literally named `"cookie"` collides with the
/// descriptor when the record is persisted and is excluded from the dirty
/// hash. This matches upstream express-session behavior and is left
/// unresolved on purpose.
pub const COOKIE_KEY: &str = "cookie";

/// Persisted session record, connect-redis compatible on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Cookie descriptor
    pub cookie: SessionCookie,

    /// Application data, flattened at the same level as `cookie`
    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            cookie: SessionCookie::default(),
            data: HashMap::new(),
        }
    }
}

impl SessionData {
    /// Create an empty record carrying the given cookie descriptor
    pub fn with_cookie(cookie: SessionCookie) -> Self {
        Self {
            cookie,
            data: HashMap::new(),
        }
    }

    /// Get a value from session data
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in session data
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), v);
        }
    }

    /// Remove a value from session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Clear all session data (except cookie)
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Check if session data is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Content fingerprint of a record's application data.
///
/// The reserved `cookie` key is excluded, so cookie mutations (including
/// `touch`) never register as data modification. Keys are hashed in sorted
/// order, making the fingerprint independent of insertion order.
pub fn data_hash(data: &SessionData) -> String {
    let canonical: BTreeMap<&str, &Value> = data
        .data
        .iter()
        .filter(|(k, _)| k.as_str() != COOKIE_KEY)
        .map(|(k, v)| (k.as_str(), v))
        .collect();

    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

pub(crate) struct SessionState {
    pub(crate) id: String,
    pub(crate) data: SessionData,
    /// Id as resolved or generated at request start
    pub(crate) original_id: String,
    /// Data hash captured at load/generate time
    pub(crate) original_hash: String,
    /// Data hash recorded by the last explicit or implicit save
    pub(crate) saved_hash: Option<String>,
    /// Handler cleared the session reference
    pub(crate) unset: bool,
    /// Coordinator already refreshed the cookie this request
    pub(crate) touched: bool,
}

struct SessionInner {
    store: Arc<dyn SessionStore>,
    genid: IdGenerator,
    /// Cookie attributes for records created mid-request (regenerate),
    /// with the secure flag already resolved for this request
    cookie_template: SessionCookie,
    state: RwLock<SessionState>,
    finalized: AtomicBool,
}

/// Decision inputs sampled by the coordinator at finalization
pub(crate) struct FinalizeView {
    pub(crate) id: String,
    pub(crate) unset: bool,
    pub(crate) modified: bool,
    pub(crate) saved: bool,
    pub(crate) cookie: SessionCookie,
    pub(crate) data: SessionData,
}

/// Per-request session handle.
///
/// Clones share state; exactly one request owns a given handle's
/// lifecycle. All mutation routes through the coordinator's dirty
/// tracking, so explicit `save` calls and end-of-request persistence
/// never double-write the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a fresh session with a newly generated id
    pub(crate) fn generate(
        store: Arc<dyn SessionStore>,
        genid: IdGenerator,
        cookie_template: SessionCookie,
    ) -> Self {
        let id = (genid)();
        let data = SessionData::with_cookie(cookie_template.clone());
        let original_hash = data_hash(&data);
        Self {
            inner: Arc::new(SessionInner {
                store,
                genid,
                cookie_template,
                state: RwLock::new(SessionState {
                    original_id: id.clone(),
                    id,
                    data,
                    original_hash,
                    saved_hash: None,
                    unset: false,
                    touched: false,
                }),
                finalized: AtomicBool::new(false),
            }),
        }
    }

    /// Materialize a session loaded from the store.
    ///
    /// With `resave` disabled the loaded state counts as already saved, so
    /// an unmodified session produces no store write at finalization.
    pub(crate) fn inflate(
        store: Arc<dyn SessionStore>,
        genid: IdGenerator,
        cookie_template: SessionCookie,
        id: String,
        data: SessionData,
        resave: bool,
    ) -> Self {
        let original_hash = data_hash(&data);
        let saved_hash = if resave {
            None
        } else {
            Some(original_hash.clone())
        };
        Self {
            inner: Arc::new(SessionInner {
                store,
                genid,
                cookie_template,
                state: RwLock::new(SessionState {
                    original_id: id.clone(),
                    id,
                    data,
                    original_hash,
                    saved_hash,
                    unset: false,
                    touched: false,
                }),
                finalized: AtomicBool::new(false),
            }),
        }
    }

    /// The current session id
    pub fn id(&self) -> String {
        self.inner.state.read().id.clone()
    }

    /// Get a value from the session
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.inner.state.read().data.get(key)
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&self, key: &str, value: T) {
        self.inner.state.write().data.set(key, value);
    }

    /// Remove a value from the session
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.state.write().data.remove(key)
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: &str) -> bool {
        self.inner.state.read().data.contains(key)
    }

    /// Clear all session data, leaving the cookie descriptor alone
    pub fn clear(&self) {
        self.inner.state.write().data.clear();
    }

    /// Whether the session carries no application data
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().data.is_empty()
    }

    /// Snapshot of the session record
    pub fn data(&self) -> SessionData {
        self.inner.state.read().data.clone()
    }

    /// Snapshot of the cookie descriptor
    pub fn cookie(&self) -> SessionCookie {
        self.inner.state.read().data.cookie.clone()
    }

    /// Mutate the cookie descriptor in place
    pub fn with_cookie_mut<R>(&self, f: impl FnOnce(&mut SessionCookie) -> R) -> R {
        f(&mut self.inner.state.write().data.cookie)
    }

    /// Refresh the cookie expiry from its original max age.
    /// Pure mutation; does not count as data modification.
    pub fn touch(&self) {
        self.inner.state.write().data.cookie.touch();
    }

    /// Persist the current state to the store.
    ///
    /// The saved hash is recorded before the store call is awaited, so
    /// end-of-request finalization sees this exact state as already
    /// persisted even while the write is still in flight.
    pub async fn save(&self) -> Result<(), SessionError> {
        let (id, data) = {
            let mut st = self.inner.state.write();
            st.saved_hash = Some(data_hash(&st.data));
            (st.id.clone(), st.data.clone())
        };
        tracing::debug!(id = %id, "saving session");
        self.inner.store.set(&id, &data).await
    }

    /// Re-fetch the record from the store, replacing data and cookie.
    ///
    /// Fails with [`SessionError::ReloadFailed`] when the id is no longer
    /// present. The original and saved hashes are untouched: modification
    /// is still judged against the state at request start.
    pub async fn reload(&self) -> Result<(), SessionError> {
        let id = self.id();
        match self.inner.store.get(&id).await {
            Ok(Some(data)) => {
                self.inner.state.write().data = data;
                Ok(())
            }
            Ok(None) => Err(SessionError::ReloadFailed),
            Err(e) if e.is_not_found() => Err(SessionError::ReloadFailed),
            Err(e) => Err(e),
        }
    }

    /// Destroy the stored record and clear the session reference.
    /// End-of-request logic treats the session as unset afterwards.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        let id = {
            let mut st = self.inner.state.write();
            st.unset = true;
            st.id.clone()
        };
        tracing::debug!(id = %id, "destroying session");
        self.inner.store.destroy(&id).await
    }

    /// Clear the session reference without store I/O.
    ///
    /// What happens to the stored record is decided at finalization by the
    /// configured unset policy.
    pub fn unset(&self) {
        self.inner.state.write().unset = true;
    }

    /// Destroy the current record and start a fresh one under a new id,
    /// reusing the configured cookie attributes. Returns the new id.
    ///
    /// The request-start tracking is deliberately not reset, so the
    /// regenerated session reads as modified and is persisted.
    pub async fn regenerate(&self) -> Result<String, SessionError> {
        let old_id = self.id();
        self.inner.store.destroy(&old_id).await?;

        let new_id = (self.inner.genid)();
        let mut st = self.inner.state.write();
        st.id = new_id.clone();
        st.data = SessionData::with_cookie(self.inner.cookie_template.clone());
        st.unset = false;
        tracing::debug!(old = %old_id, new = %new_id, "regenerated session");
        Ok(new_id)
    }

    // --- coordinator-side accessors ---

    /// First call wins; later finalization triggers are no-ops
    pub(crate) fn begin_finalize(&self) -> bool {
        !self.inner.finalized.swap(true, Ordering::SeqCst)
    }

    /// Refresh the cookie at most once per request
    pub(crate) fn touch_once(&self) {
        let mut st = self.inner.state.write();
        if !st.touched {
            st.data.cookie.touch();
            st.touched = true;
        }
    }

    pub(crate) fn finalize_view(&self) -> FinalizeView {
        let st = self.inner.state.read();
        let current_hash = data_hash(&st.data);
        FinalizeView {
            id: st.id.clone(),
            unset: st.unset,
            modified: st.original_id != st.id || st.original_hash != current_hash,
            saved: st.original_id == st.id
                && st.saved_hash.as_deref() == Some(current_hash.as_str()),
            cookie: st.data.cookie.clone(),
            data: st.data.clone(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.read();
        f.debug_struct("Session")
            .field("id", &st.id)
            .field("data", &st.data)
            .field("unset", &st.unset)
            .finish()
    }
}
