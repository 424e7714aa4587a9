//! In-memory session store
//!
//! Reference implementation of the store contract, primarily for
//! development and testing. Expiry is lazy: records are compared against
//! their own `cookie.expires` on access and enumeration, no background
//! sweep runs.
//!
//! Warning: not suitable for production use. Sessions are lost on restart
//! and not shared across server instances.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::SessionStore;
use crate::error::SessionError;
use crate::session::SessionData;

/// In-memory session store
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop records whose cookie expiry has passed
    fn prune_expired(&self) {
        self.sessions
            .write()
            .retain(|_, record| !record.cookie.is_expired());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError> {
        {
            let sessions = self.sessions.read();
            match sessions.get(sid) {
                Some(record) if record.cookie.is_expired() => {}
                Some(record) => return Ok(Some(record.clone())),
                None => return Ok(None),
            }
        }
        // stale entry: drop it and report absent
        self.sessions.write().remove(sid);
        Ok(None)
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        self.sessions
            .write()
            .insert(sid.to_string(), session.clone());
        Ok(())
    }

    async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        self.sessions.write().remove(sid);
        Ok(())
    }

    async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write();
        if let Some(record) = sessions.get_mut(sid) {
            record.cookie = session.cookie.clone();
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.sessions.write().clear();
        Ok(())
    }

    async fn length(&self) -> Result<usize, SessionError> {
        self.prune_expired();
        Ok(self.sessions.read().len())
    }

    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        self.prune_expired();
        Ok(self.sessions.read().keys().cloned().collect())
    }

    async fn all(&self) -> Result<Vec<SessionData>, SessionError> {
        self.prune_expired();
        Ok(self.sessions.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::SessionCookie;

    #[tokio::test]
    async fn basic_lifecycle() {
        let store = MemoryStore::new();

        let mut data = SessionData::with_cookie(SessionCookie::new(3_600_000));
        data.set("user", "alice");

        store.set("test-id", &data).await.unwrap();

        let retrieved = store.get("test-id").await.unwrap().unwrap();
        assert_eq!(retrieved.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(store.length().await.unwrap(), 1);

        store.destroy("test-id").await.unwrap();
        assert!(store.get("test-id").await.unwrap().is_none());
        assert_eq!(store.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_record_reads_as_absent() {
        let store = MemoryStore::new();

        let mut data = SessionData::with_cookie(SessionCookie::new(3_600_000));
        data.cookie.set_max_age(Some(-1_000));
        store.set("stale", &data).await.unwrap();

        assert!(store.get("stale").await.unwrap().is_none());
        assert_eq!(store.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn browser_session_records_do_not_expire() {
        let store = MemoryStore::new();
        let data = SessionData::with_cookie(SessionCookie::browser_session());
        store.set("sticky", &data).await.unwrap();

        assert!(store.get("sticky").await.unwrap().is_some());
        assert_eq!(store.ids().await.unwrap(), vec!["sticky".to_string()]);
    }

    #[tokio::test]
    async fn touch_refreshes_only_the_cookie() {
        let store = MemoryStore::new();

        let mut data = SessionData::with_cookie(SessionCookie::new(1_000));
        data.set("user", "alice");
        store.set("test-id", &data).await.unwrap();

        let mut touched = data.clone();
        touched.cookie.set_max_age(Some(3_600_000));
        touched.set("user", "ignored");
        store.touch("test-id", &touched).await.unwrap();

        let record = store.get("test-id").await.unwrap().unwrap();
        assert_eq!(record.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(record.cookie.expires, touched.cookie.expires);
    }
}
