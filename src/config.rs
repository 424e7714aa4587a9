//! Session middleware configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::cookie::SessionCookie;
use crate::error::SessionError;

/// Pluggable session id generator
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// SameSite cookie attribute
#[derive(Clone, Debug, PartialEq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

impl SameSite {
    /// The value persisted inside session records
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "strict",
            SameSite::Lax => "lax",
            SameSite::None => "none",
        }
    }
}

/// Secure flag policy for the session cookie
#[derive(Clone, Debug, PartialEq)]
pub enum SecurePolicy {
    /// Never mark the cookie Secure
    Disabled,
    /// Always mark the cookie Secure; it is withheld on requests that are
    /// not verified secure
    Enabled,
    /// Resolve per request: Secure iff the request arrived over a secure
    /// transport (honoring the `proxy` trust setting)
    Auto,
}

/// What to do at end of request when the handler cleared the session
#[derive(Clone, Debug, PartialEq)]
pub enum UnsetPolicy {
    /// Leave the stored record alone
    Keep,
    /// Destroy the stored record
    Destroy,
}

/// Configuration for the session middleware
#[derive(Clone)]
pub struct SessionConfig {
    /// Secret key(s) for signing cookies.
    /// The first secret signs new cookies; all are tried when verifying,
    /// oldest last, so the signing secret can rotate.
    pub secrets: Vec<String>,

    /// Name of the session cookie (default: "connect.sid")
    pub cookie_name: String,

    /// Cookie path (default: "/"). Requests whose path does not start with
    /// this prefix bypass session handling entirely.
    pub cookie_path: String,

    /// Cookie domain (default: None - current domain only)
    pub cookie_domain: Option<String>,

    /// HttpOnly flag for cookie (default: true)
    pub cookie_http_only: bool,

    /// Secure flag policy for cookie (default: Disabled)
    pub cookie_secure: SecurePolicy,

    /// SameSite attribute for cookie (default: Lax)
    pub cookie_same_site: Option<SameSite>,

    /// Max age in seconds (default: None = browser-session cookie)
    pub max_age: Option<u64>,

    /// Session id generator (default: 24 bytes of OS entropy, base64
    /// url-safe without padding)
    pub genid: IdGenerator,

    /// Proxy trust for the secure-request check (default: None).
    /// `Some(true)` trusts `X-Forwarded-Proto`; `Some(false)` and `None`
    /// never do — only the transport scheme counts.
    pub proxy: Option<bool>,

    /// Whether to save unmodified sessions back to the store (default: false)
    pub resave: bool,

    /// Whether to refresh the cookie on every response (default: false)
    pub rolling: bool,

    /// Whether to save new, never-modified sessions (default: false)
    pub save_uninitialized: bool,

    /// Policy applied when the handler clears the session (default: Keep)
    pub unset: UnsetPolicy,
}

/// Default id generator: the semantics of Node's uid-safe(24)
fn generate_session_id() -> String {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secrets: Vec::new(),
            cookie_name: "connect.sid".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_http_only: true,
            cookie_secure: SecurePolicy::Disabled,
            cookie_same_site: Some(SameSite::Lax),
            max_age: None,
            genid: Arc::new(generate_session_id),
            proxy: None,
            resave: false,
            rolling: false,
            save_uninitialized: false,
            unset: UnsetPolicy::Keep,
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with the given secret
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secrets: vec![secret.into()],
            ..Default::default()
        }
    }

    /// Create a new session configuration with multiple secrets for rotation
    pub fn with_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secrets: secrets.into_iter().map(|s| s.into()).collect(),
            ..Default::default()
        }
    }

    /// Set the cookie name (default: "connect.sid")
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set the Secure flag policy (default: Disabled)
    pub fn with_secure(mut self, secure: SecurePolicy) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: impl Into<Option<SameSite>>) -> Self {
        self.cookie_same_site = same_site.into();
        self
    }

    /// Set max age in seconds.
    /// Pass None for a browser-session cookie.
    pub fn with_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        self.max_age = max_age.into();
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(mut self, duration: impl Into<Option<Duration>>) -> Self {
        self.max_age = duration.into().map(|d| d.as_secs());
        self
    }

    /// Set the session id generator
    pub fn with_genid<F>(mut self, genid: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.genid = Arc::new(genid);
        self
    }

    /// Set proxy trust for the secure-request check (default: None)
    pub fn with_proxy(mut self, proxy: impl Into<Option<bool>>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// Set whether to force save on every request (default: false)
    pub fn with_resave(mut self, resave: bool) -> Self {
        self.resave = resave;
        self
    }

    /// Set whether to reset cookie expiry on every request (default: false)
    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    /// Set whether to save uninitialized sessions (default: false)
    pub fn with_save_uninitialized(mut self, save: bool) -> Self {
        self.save_uninitialized = save;
        self
    }

    /// Set the unset policy (default: Keep)
    pub fn with_unset(mut self, unset: UnsetPolicy) -> Self {
        self.unset = unset;
        self
    }

    /// Validate the configuration; called once at handler construction,
    /// before any request is served
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.secrets.is_empty() || self.secrets.iter().any(|s| s.is_empty()) {
            return Err(SessionError::Config(
                "secret option must contain one or more non-empty strings".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a fresh cookie descriptor from the configured attributes.
    /// `secure` is the already-resolved flag (Auto is decided per request).
    pub fn fresh_cookie(&self, secure: bool) -> SessionCookie {
        let mut cookie = match self.max_age {
            Some(secs) => SessionCookie::new((secs as i64).saturating_mul(1000)),
            None => SessionCookie::browser_session(),
        };
        cookie.path = self.cookie_path.clone();
        cookie.domain = self.cookie_domain.clone();
        cookie.http_only = self.cookie_http_only;
        cookie.secure = secure;
        cookie.same_site = self.cookie_same_site.as_ref().map(|s| s.as_str().to_string());
        cookie
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("max_age", &self.max_age)
            .field("proxy", &self.proxy)
            .field("resave", &self.resave)
            .field("rolling", &self.rolling)
            .field("save_uninitialized", &self.save_uninitialized)
            .field("unset", &self.unset)
            .field("secrets", &format_args!("[{} redacted]", self.secrets.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn empty_secret_list_is_rejected() {
        let config = SessionConfig::default();
        assert!(config.validate().is_err());

        let config = SessionConfig::new("keyboard cat");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_genid_is_url_safe_and_unique() {
        let config = SessionConfig::new("secret");
        let ids: HashSet<String> = (0..64).map(|_| (config.genid)()).collect();
        assert_eq!(ids.len(), 64);
        for id in &ids {
            // 24 bytes -> 32 chars of unpadded base64url
            assert_eq!(id.len(), 32);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn fresh_cookie_reflects_attributes() {
        let config = SessionConfig::new("secret")
            .with_cookie_path("/app")
            .with_cookie_domain("example.com")
            .with_max_age(3600u64)
            .with_same_site(SameSite::Strict);

        let cookie = config.fresh_cookie(true);
        assert_eq!(cookie.path, "/app");
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.original_max_age(), Some(3_600_000));
        assert!(cookie.secure);
        assert_eq!(cookie.same_site.as_deref(), Some("strict"));
    }

    #[test]
    fn fresh_cookie_without_max_age_is_browser_session() {
        let config = SessionConfig::new("secret");
        let cookie = config.fresh_cookie(false);
        assert_eq!(cookie.expires, None);
        assert_eq!(cookie.original_max_age(), None);
    }
}
