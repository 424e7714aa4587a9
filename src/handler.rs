//! Session lifecycle middleware for Salvo
//!
//! One activation per request: resolve the signed id from the cookie,
//! load or generate the record, hand it to the route chain through the
//! depot, then run the persistence decision exactly once while the
//! response is still unflushed. Store I/O triggered by finalization is
//! awaited to completion before the middleware returns, so the refreshed
//! Set-Cookie header and the persisted record are always in place before
//! the first body byte leaves the server.

use std::sync::Arc;

use salvo_core::http::header::COOKIE;
use salvo_core::http::uri::Scheme;
use salvo_core::http::StatusError;
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};

use crate::config::{SecurePolicy, SessionConfig, UnsetPolicy};
use crate::cookie_signature::{sign, unsign_with_secrets};
use crate::error::SessionError;
use crate::session::Session;
use crate::store::{SessionStore, StoreReadiness};

pub(crate) const SESSION_KEY: &str = "salvo.connect.session";

/// Express-style session middleware.
///
/// Install with `Router::hoop`; downstream handlers reach the session via
/// [`SessionDepotExt`](crate::SessionDepotExt).
pub struct SessionHandler<S: SessionStore> {
    store: Arc<S>,
    config: SessionConfig,
    /// Probed once at construction; stores without touch only ever see
    /// the save path
    store_supports_touch: bool,
    readiness: StoreReadiness,
}

impl<S: SessionStore> SessionHandler<S> {
    /// Create the middleware, validating the configuration.
    ///
    /// Configuration errors (such as an empty secret list) are fatal here,
    /// before any request is served.
    pub fn new(store: S, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let store = Arc::new(store);
        let store_supports_touch = store.supports_touch();
        let readiness = store.readiness();
        Ok(Self {
            store,
            config,
            store_supports_touch,
            readiness,
        })
    }

    /// Resolve the session id from the request's cookie.
    ///
    /// The raw `Cookie` header is the canonical input; a value without the
    /// signed marker or failing verification against every candidate
    /// secret is an absent id, never an error. When the raw header is
    /// missing entirely we fall back to the framework's parsed cookie jar,
    /// a deprecated compatibility path.
    fn resolve_session_id(&self, req: &Request) -> Option<String> {
        // HTTP/2 clients may split cookies across several header lines
        let mut header_present = false;
        for raw in req.headers().get_all(COOKIE) {
            let Ok(raw) = raw.to_str() else {
                continue;
            };
            header_present = true;
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                if name.trim() != self.config.cookie_name {
                    continue;
                }
                return self.unsign_value(value.trim());
            }
        }
        if header_present {
            return None;
        }

        let cookie = req.cookie(&self.config.cookie_name)?;
        tracing::warn!(
            "session cookie read from the parsed cookie jar; \
             the raw Cookie header should be available"
        );
        self.unsign_value(cookie.value())
    }

    fn unsign_value(&self, value: &str) -> Option<String> {
        let decoded = match urlencoding::decode(value) {
            Ok(d) => d.to_string(),
            Err(_) => value.to_string(),
        };
        let id = unsign_with_secrets(&decoded, &self.config.secrets);
        if id.is_none() {
            tracing::debug!("session cookie unsigned or signature invalid");
        }
        id
    }

    /// Whether this request arrived over a verified-secure transport.
    ///
    /// Direct TLS is judged by the connection scheme the listener recorded,
    /// not the request URI — origin-form request targets carry no scheme.
    /// A forwarded-protocol header is honored only under explicit proxy
    /// trust.
    fn is_secure(&self, req: &Request) -> bool {
        if req.scheme() == &Scheme::HTTPS {
            return true;
        }
        match self.config.proxy {
            Some(true) => {
                let header = req
                    .headers()
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                let proto = header.split(',').next().unwrap_or("").trim();
                proto.eq_ignore_ascii_case("https")
            }
            Some(false) | None => false,
        }
    }

    /// Resolve the configured secure policy against this request
    fn resolved_secure(&self, secure_request: bool) -> bool {
        match self.config.cookie_secure {
            SecurePolicy::Enabled => true,
            SecurePolicy::Disabled => false,
            SecurePolicy::Auto => secure_request,
        }
    }

    fn generate_session(&self, secure_request: bool) -> Session {
        Session::generate(
            self.store.clone(),
            self.config.genid.clone(),
            self.config.fresh_cookie(self.resolved_secure(secure_request)),
        )
    }

    /// The four-way persistence decision: save, touch, destroy or nothing,
    /// plus the independent Set-Cookie decision. Runs at most once per
    /// request; store failures are reported through the error channel and
    /// never block the response.
    async fn finalize(
        &self,
        session: &Session,
        cookie_id: Option<&str>,
        secure_request: bool,
        res: &mut Response,
    ) {
        if !session.begin_finalize() {
            return;
        }

        let view = session.finalize_view();
        if view.unset {
            // handler cleared the session; the unset policy decides the
            // stored record's fate, and no cookie is emitted either way
            if self.config.unset == UnsetPolicy::Destroy && !view.id.is_empty() {
                tracing::debug!(id = %view.id, "destroying cleared session");
                if let Err(e) = self.store.destroy(&view.id).await {
                    tracing::error!(error = %e, "failed to destroy session");
                }
            }
            return;
        }

        session.touch_once();
        let view = session.finalize_view();
        let same_id = cookie_id == Some(view.id.as_str());

        let should_save = if !self.config.save_uninitialized && !same_id {
            view.modified
        } else {
            !view.saved
        };
        let should_touch = same_id && !should_save;

        if should_save {
            if let Err(e) = session.save().await {
                tracing::error!(error = %e, "failed to save session");
            }
        } else if self.store_supports_touch && should_touch {
            tracing::debug!(id = %view.id, "touching session");
            if let Err(e) = self.store.touch(&view.id, &view.data).await {
                tracing::error!(error = %e, "failed to touch session");
            }
        }

        let should_set_cookie = if !same_id {
            self.config.save_uninitialized || view.modified
        } else {
            self.config.rolling || (view.cookie.expires.is_some() && view.modified)
        };
        if !should_set_cookie {
            return;
        }

        // only send secure cookies via verified-secure requests
        if view.cookie.secure && !secure_request {
            tracing::debug!("withholding secure session cookie on insecure request");
            return;
        }

        let signed = sign(&view.id, &self.config.secrets[0]);
        res.add_cookie(view.cookie.to_wire_cookie(&self.config.cookie_name, &signed));
    }
}

impl<S: SessionStore> Clone for SessionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            store_supports_touch: self.store_supports_touch,
            readiness: self.readiness.clone(),
        }
    }
}

#[async_trait::async_trait]
impl<S: SessionStore> Handler for SessionHandler<S> {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        // requests outside the cookie's path scope carry no session at all
        if !req.uri().path().starts_with(&self.config.cookie_path) {
            ctrl.call_next(req, depot, res).await;
            return;
        }

        // handle the request as session-less while the store is away
        if !self.readiness.is_ready() {
            tracing::debug!("session store is disconnected");
            ctrl.call_next(req, depot, res).await;
            return;
        }

        let secure_request = self.is_secure(req);
        let cookie_id = self.resolve_session_id(req);

        let session = match &cookie_id {
            Some(sid) => {
                tracing::debug!(id = %sid, "fetching session");
                match self.store.get(sid).await {
                    Ok(Some(data)) => Session::inflate(
                        self.store.clone(),
                        self.config.genid.clone(),
                        self.config
                            .fresh_cookie(self.resolved_secure(secure_request)),
                        sid.clone(),
                        data,
                        self.config.resave,
                    ),
                    Ok(None) => {
                        tracing::debug!("no session found, generating");
                        self.generate_session(secure_request)
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("store reported not found, generating");
                        self.generate_session(secure_request)
                    }
                    Err(e) => {
                        // a real store failure aborts session resolution
                        // for this request without invoking the handler
                        tracing::error!(error = %e, "failed to load session");
                        res.render(StatusError::internal_server_error());
                        ctrl.skip_rest();
                        return;
                    }
                }
            }
            None => self.generate_session(secure_request),
        };

        depot.insert(SESSION_KEY, session.clone());

        ctrl.call_next(req, depot, res).await;

        self.finalize(&session, cookie_id.as_deref(), secure_request, res)
            .await;
    }
}
