//! Session cookie descriptor compatible with express-session
//!
//! The persisted JSON shape (camelCase keys, `originalMaxAge` in
//! milliseconds, RFC 3339 `expires`) matches what express-session and
//! connect-redis write, so records are interchangeable between the two.

use chrono::{DateTime, Duration, Utc};
use salvo_core::http::cookie::time::OffsetDateTime;
use salvo_core::http::cookie::{Cookie, SameSite as WireSameSite};
use serde::{Deserialize, Serialize};

/// Cookie attribute bag carried inside every session record
///
/// Exactly one expiry source is authoritative when serializing: an
/// `expires` timestamp (usually derived from a max-age at creation or
/// `touch` time), or none at all for a browser-session cookie. The wire
/// form always emits `Expires` rather than `Max-Age`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    /// Max age in milliseconds as set when the cookie was created or
    /// loaded. Immutable snapshot; `touch` uses it to refresh `expires`.
    original_max_age: Option<i64>,

    /// Expiration time; `None` means browser-session cookie
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    /// Secure flag
    #[serde(default)]
    pub secure: bool,

    /// HttpOnly flag
    #[serde(default = "default_http_only")]
    pub http_only: bool,

    /// Cookie path
    #[serde(default = "default_path")]
    pub path: String,

    /// Cookie domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// SameSite attribute ("strict", "lax" or "none")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_http_only() -> bool {
    true
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            original_max_age: None,
            expires: None,
            secure: false,
            http_only: true,
            path: "/".to_string(),
            domain: None,
            same_site: None,
        }
    }
}

impl SessionCookie {
    /// Create a cookie expiring `max_age_ms` milliseconds from now
    pub fn new(max_age_ms: i64) -> Self {
        let mut cookie = Self {
            original_max_age: Some(max_age_ms),
            ..Default::default()
        };
        cookie.set_max_age(Some(max_age_ms));
        cookie
    }

    /// Create a browser-session cookie: no expiry, never considered expired
    pub fn browser_session() -> Self {
        Self::default()
    }

    /// The max age recorded when this cookie was created or loaded, in ms
    pub fn original_max_age(&self) -> Option<i64> {
        self.original_max_age
    }

    /// Remaining lifetime in milliseconds, computed from `expires`
    pub fn max_age(&self) -> Option<i64> {
        self.expires.map(|exp| (exp - Utc::now()).num_milliseconds())
    }

    /// Set the max age, recomputing `expires` relative to now.
    ///
    /// `None` turns this into a browser-session cookie. Values past
    /// chrono's representable range clamp to the maximum timestamp.
    pub fn set_max_age(&mut self, max_age_ms: Option<i64>) {
        self.expires = max_age_ms.map(|ms| {
            Duration::try_milliseconds(ms)
                .and_then(|d| Utc::now().checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
    }

    /// Set the expiration directly. Does not recompute or record a max age.
    pub fn set_expires(&mut self, expires: Option<DateTime<Utc>>) {
        self.expires = expires;
    }

    /// Refresh `expires` from the original max age. Pure mutation, no I/O;
    /// no-op for browser-session cookies.
    pub fn touch(&mut self) {
        if let Some(ms) = self.original_max_age {
            self.set_max_age(Some(ms));
        }
    }

    /// Whether this cookie's expiry has passed
    pub fn is_expired(&self) -> bool {
        match self.expires {
            Some(exp) => exp < Utc::now(),
            None => false,
        }
    }

    /// Serialize into a wire cookie carrying the signed session id.
    ///
    /// The caller appends this to the response; existing Set-Cookie
    /// headers are never replaced.
    pub fn to_wire_cookie(&self, name: &str, value: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        if let Some(expires) = self.expires {
            if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
                builder = builder.expires(at);
            }
        }

        builder = match self.same_site.as_deref() {
            Some("strict") => builder.same_site(WireSameSite::Strict),
            Some("none") => builder.same_site(WireSameSite::None),
            Some(_) => builder.same_site(WireSameSite::Lax),
            None => builder,
        };

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_recomputes_expires() {
        let mut cookie = SessionCookie::new(60_000);
        let first = cookie.expires.unwrap();

        cookie.set_max_age(Some(3_600_000));
        let second = cookie.expires.unwrap();
        assert!(second > first);
        // snapshot is immutable
        assert_eq!(cookie.original_max_age(), Some(60_000));
    }

    #[test]
    fn set_expires_does_not_touch_max_age() {
        let mut cookie = SessionCookie::new(60_000);
        let at = Utc::now() + Duration::days(7);
        cookie.set_expires(Some(at));

        assert_eq!(cookie.expires, Some(at));
        assert_eq!(cookie.original_max_age(), Some(60_000));
    }

    #[test]
    fn touch_refreshes_from_original_max_age() {
        let mut cookie = SessionCookie::new(1_000);
        cookie.set_expires(Some(Utc::now() - Duration::seconds(10)));
        assert!(cookie.is_expired());

        cookie.touch();
        assert!(!cookie.is_expired());
    }

    #[test]
    fn browser_session_never_expires() {
        let mut cookie = SessionCookie::browser_session();
        assert!(!cookie.is_expired());
        assert_eq!(cookie.max_age(), None);

        // touch on a browser-session cookie stays a no-op
        cookie.touch();
        assert_eq!(cookie.expires, None);
    }

    #[test]
    fn huge_max_age_clamps() {
        let mut cookie = SessionCookie::new(1_000);
        cookie.set_max_age(Some(i64::MAX));
        assert_eq!(cookie.expires, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!cookie.is_expired());
    }

    #[test]
    fn persisted_form_uses_express_keys() {
        let cookie = SessionCookie::new(60_000);
        let json = serde_json::to_value(&cookie).unwrap();

        assert_eq!(json["originalMaxAge"], serde_json::json!(60_000));
        assert!(json.get("httpOnly").is_some());
        assert!(json.get("expires").is_some());
    }

    #[test]
    fn wire_cookie_carries_attributes() {
        let mut cookie = SessionCookie::new(60_000);
        cookie.domain = Some("example.com".to_string());
        cookie.same_site = Some("strict".to_string());

        let wire = cookie.to_wire_cookie("connect.sid", "s:abc.def");
        assert_eq!(wire.name(), "connect.sid");
        assert_eq!(wire.value(), "s:abc.def");
        assert_eq!(wire.path(), Some("/"));
        assert_eq!(wire.domain(), Some("example.com"));
        assert_eq!(wire.http_only(), Some(true));
        assert!(wire.expires().is_some());
    }
}
